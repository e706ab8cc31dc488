//! Core probe traits and types.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Default probe timeout (2 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors raised while running a single probe.
///
/// These never escape a [`Prober`]: they are folded into a failed
/// [`ProbeOutcome`] whose reply carries the error text.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Process spawn or socket I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Probe did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Hostname could not be resolved.
    #[error("failed to resolve '{0}'")]
    Resolve(String),

    /// ICMP socket or echo error.
    #[error("icmp error: {0}")]
    Icmp(String),

    /// Address rejected before probing.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Result of one probe attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Whether the target answered.
    pub success: bool,
    /// Round-trip time, when reported.
    pub latency_ms: Option<f64>,
    /// Human-readable reply line.
    pub reply: String,
}

impl ProbeOutcome {
    /// A successful probe.
    pub fn success(latency_ms: Option<f64>, reply: impl Into<String>) -> Self {
        Self {
            success: true,
            latency_ms,
            reply: reply.into(),
        }
    }

    /// A failed probe.
    pub fn failure(reply: impl Into<String>) -> Self {
        Self {
            success: false,
            latency_ms: None,
            reply: reply.into(),
        }
    }
}

impl From<ProbeError> for ProbeOutcome {
    fn from(err: ProbeError) -> Self {
        Self::failure(err.to_string())
    }
}

/// Probe implementation selector.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProbeMethod {
    /// The platform `ping` command.
    #[default]
    Command,
    /// Native ICMP echo (needs raw/datagram ICMP socket permission).
    Icmp,
}

/// A liveness check against a single address.
///
/// Probe failures of every kind (unreachable host, DNS failure, spawn
/// failure, timeout) are valid observations and are returned as a failed
/// [`ProbeOutcome`], never as an error.
#[async_trait::async_trait]
pub trait Prober: Send + Sync + 'static {
    /// Which implementation this is.
    fn method(&self) -> ProbeMethod;

    /// Upper bound for a single probe.
    fn timeout(&self) -> Duration;

    /// Issue one probe to `address`.
    async fn probe(&self, address: &str) -> ProbeOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_outcome_from_error_is_failure() {
        let outcome = ProbeOutcome::from(ProbeError::Timeout(Duration::from_secs(2)));
        assert!(!outcome.success);
        assert_eq!(outcome.latency_ms, None);
        assert!(outcome.reply.contains("timed out"));
    }

    #[test]
    fn test_probe_method_parse() {
        assert_eq!(ProbeMethod::from_str("ICMP").unwrap(), ProbeMethod::Icmp);
        assert_eq!(ProbeMethod::from_str("command").unwrap(), ProbeMethod::Command);
        assert!(ProbeMethod::from_str("carrier-pigeon").is_err());
        assert_eq!(ProbeMethod::default(), ProbeMethod::Command);
    }
}
