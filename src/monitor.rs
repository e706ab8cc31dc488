//! Monitor Layer
//!
//! One [`TargetMonitor`] per address, each running its own scheduled probe
//! job, collected in a [`MonitorRegistry`].
//!
//! # Architecture
//!
//! - [`OutcomeWindow`] / [`classify`]: bounded outcome history and the
//!   UP / DOWN / FLAPPING / UNKNOWN classification derived from it
//! - [`TargetMonitor`]: start/stop of one probe loop, per-target state
//! - [`MonitorRegistry`]: bulk control and [`SnapshotRow`] aggregation
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pingops::monitor::{MonitorRegistry, MonitorSettings};
//! use pingops::probe::CommandProber;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = MonitorRegistry::new(
//!     MonitorSettings::default(),
//!     Arc::new(CommandProber::default()),
//! )
//! .await?;
//! registry
//!     .create_from_input(&["8.8.8.8", "1.1.1.1"], &["google", "cloudflare"])
//!     .await;
//! registry.start_all().await?;
//! let rows = registry.snapshot().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod registry;
mod snapshot;
mod status;
mod target;

pub use error::MonitorError;
pub use registry::{CreateResult, DEFAULT_SHUTDOWN_TIMEOUT, MonitorRegistry};
pub use snapshot::{SnapshotRow, render_table};
pub use status::{
    ClassifyPolicy, DEFAULT_MIN_SAMPLES, DEFAULT_WINDOW_SIZE, OutcomeWindow, Status, classify,
};
pub use target::{
    DEFAULT_INTERVAL, MIN_INTERVAL, MonitorSettings, Target, TargetId, TargetMonitor,
    clamp_interval,
};
