//! Native ICMP echo probe.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use tokio::time::timeout;

use super::traits::{DEFAULT_TIMEOUT, ProbeError, ProbeMethod, ProbeOutcome, Prober};

/// Echo payload size, matching the default of the Unix `ping` command.
const PAYLOAD_SIZE: usize = 56;

/// Resolve hostname to IP address.
pub(crate) async fn resolve_host(host: &str) -> Result<IpAddr, ProbeError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let addrs = tokio::net::lookup_host(format!("{host}:0"))
        .await
        .map_err(|_| ProbeError::Resolve(host.to_string()))?;
    addrs
        .into_iter()
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| ProbeError::Resolve(host.to_string()))
}

/// ICMP echo prober built on `surge-ping`.
#[derive(Debug, Clone)]
pub struct IcmpProber {
    timeout: Duration,
}

impl Default for IcmpProber {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl IcmpProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run(&self, address: &str) -> Result<ProbeOutcome, ProbeError> {
        let ip = resolve_host(address).await?;

        let client = match ip {
            IpAddr::V4(_) => Client::new(&Config::default()),
            IpAddr::V6(_) => Client::new(&Config::builder().kind(ICMP::V6).build()),
        }?;

        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(self.timeout);

        let payload = [0u8; PAYLOAD_SIZE];
        match timeout(self.timeout, pinger.ping(PingSequence(0), &payload)).await {
            Ok(Ok((_, rtt))) => {
                let ms = rtt.as_secs_f64() * 1000.0;
                let reply = format!("Reply from {ip}: bytes={PAYLOAD_SIZE} time={ms:.1}ms");
                Ok(ProbeOutcome::success(Some(ms), reply))
            }
            Ok(Err(e)) => Err(ProbeError::Icmp(e.to_string())),
            Err(_) => Err(ProbeError::Timeout(self.timeout)),
        }
    }
}

#[async_trait::async_trait]
impl Prober for IcmpProber {
    fn method(&self) -> ProbeMethod {
        ProbeMethod::Icmp
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self, address: &str) -> ProbeOutcome {
        let start = Instant::now();
        match self.run(address).await {
            Ok(outcome) => {
                tracing::debug!(
                    address = %address,
                    latency_ms = ?outcome.latency_ms,
                    "ICMP probe successful"
                );
                outcome
            }
            Err(e) => {
                tracing::debug!(
                    address = %address,
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis(),
                    "ICMP probe failed"
                );
                e.into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_host_ipv4() {
        let ip = resolve_host("127.0.0.1").await.unwrap();
        assert_eq!(ip, IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)));
    }

    #[tokio::test]
    async fn test_resolve_host_ipv6() {
        let ip = resolve_host("::1").await.unwrap();
        assert_eq!(ip, IpAddr::V6(std::net::Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn test_icmp_prober_defaults() {
        let prober = IcmpProber::default();
        assert_eq!(prober.method(), ProbeMethod::Icmp);
        assert_eq!(Prober::timeout(&prober), DEFAULT_TIMEOUT);
    }
}
