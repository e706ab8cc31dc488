//! Probe backed by the platform `ping` command.

use std::process::Stdio;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::Regex;
use tokio::process::Command;
use tokio::time::timeout;

use super::traits::{DEFAULT_TIMEOUT, ProbeError, ProbeMethod, ProbeOutcome, Prober};

/// Extra time granted to the child process beyond the ping timeout itself.
const SPAWN_GRACE: Duration = Duration::from_millis(500);

/// Reply text recorded when the command exits non-zero.
const TIMED_OUT_REPLY: &str = "Request timed out.";

/// Reply text recorded when the command succeeds without a recognisable reply line.
const GENERIC_REPLY: &str = "Reply received";

fn latency_regex() -> &'static Regex {
    static LATENCY_RE: OnceLock<Regex> = OnceLock::new();
    LATENCY_RE.get_or_init(|| {
        Regex::new(r"(?i)time\s*[=<]\s*([0-9]+(?:[.,][0-9]+)?)\s*ms")
            .expect("failed to compile latency regex")
    })
}

fn is_reply_line(line: &str) -> bool {
    line.contains("bytes from") || line.contains("Reply from") || line.contains("bytes=")
}

/// Extract the round-trip time from a ping reply line.
///
/// Handles `time=12.3 ms`, `time=0,42 ms` and the Windows `time<1ms` form.
pub fn parse_latency(line: &str) -> Option<f64> {
    let caps = latency_regex().captures(line)?;
    caps[1].replace(',', ".").parse().ok()
}

/// Turn the exit status and stdout of one ping run into an outcome.
pub fn parse_reply(exit_ok: bool, stdout: &str) -> ProbeOutcome {
    if !exit_ok {
        return ProbeOutcome::failure(TIMED_OUT_REPLY);
    }

    match stdout.lines().map(str::trim).find(|l| is_reply_line(l)) {
        // Windows exits 0 when a gateway answers "Destination host unreachable".
        Some(line) if line.to_ascii_lowercase().contains("unreachable") => {
            ProbeOutcome::failure(line)
        }
        Some(line) => ProbeOutcome::success(parse_latency(line), line),
        None => ProbeOutcome::success(None, GENERIC_REPLY),
    }
}

/// Command-line arguments for a single echo request.
fn ping_args(address: &str, probe_timeout: Duration) -> Vec<String> {
    if cfg!(windows) {
        vec![
            "-n".into(),
            "1".into(),
            "-w".into(),
            probe_timeout.as_millis().max(1).to_string(),
            address.into(),
        ]
    } else if cfg!(target_os = "macos") {
        vec![
            "-c".into(),
            "1".into(),
            "-W".into(),
            probe_timeout.as_millis().max(1).to_string(),
            address.into(),
        ]
    } else {
        let secs = probe_timeout.as_secs_f64().ceil().max(1.0) as u64;
        vec![
            "-c".into(),
            "1".into(),
            "-W".into(),
            secs.to_string(),
            address.into(),
        ]
    }
}

/// Probe that shells out to `ping` once per tick.
#[derive(Debug, Clone)]
pub struct CommandProber {
    program: String,
    timeout: Duration,
}

impl Default for CommandProber {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl CommandProber {
    /// Create a prober using the `ping` found on `PATH`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "ping".to_string(),
            timeout,
        }
    }

    /// Use a different ping executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    async fn run(&self, address: &str) -> Result<ProbeOutcome, ProbeError> {
        if address.starts_with('-') {
            return Err(ProbeError::InvalidAddress(address.to_string()));
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(ping_args(address, self.timeout))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let output = timeout(self.timeout + SPAWN_GRACE, cmd.output())
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_reply(output.status.success(), &stdout))
    }
}

#[async_trait::async_trait]
impl Prober for CommandProber {
    fn method(&self) -> ProbeMethod {
        ProbeMethod::Command
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
                    success = outcome.success,
                    latency_ms = ?outcome.latency_ms,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Ping command finished"
                );
                outcome
            }
            Err(e) => {
                tracing::debug!(address = %address, error = %e, "Ping command failed");
                e.into()
            }
        }
    }
}
