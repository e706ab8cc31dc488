//! Probe Layer
//!
//! A [`Prober`] issues one liveness check to an address and reports the
//! outcome. Every kind of failure is folded into a failed [`ProbeOutcome`].
//!
//! - [`CommandProber`]: runs the platform `ping` command (default)
//! - [`IcmpProber`]: native ICMP echo via `surge-ping`

mod command;
mod icmp;
mod traits;

use std::sync::Arc;
use std::time::Duration;

pub use command::{CommandProber, parse_latency, parse_reply};
pub use icmp::IcmpProber;
pub use traits::{DEFAULT_TIMEOUT, ProbeError, ProbeMethod, ProbeOutcome, Prober};

/// Build the prober selected by `method`.
pub fn build_prober(method: ProbeMethod, timeout: Duration) -> Arc<dyn Prober> {
    match method {
        ProbeMethod::Command => Arc::new(CommandProber::new(timeout)),
        ProbeMethod::Icmp => Arc::new(IcmpProber::new(timeout)),
    }
}
