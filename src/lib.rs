//! PingOps - Multi-Target Ping Monitor
//!
//! This crate provides the core functionality of PingOps: one independent
//! ping monitor per address, UP / DOWN / FLAPPING classification over a
//! window of recent probes, and spreadsheet export of the results. It can be
//! used as a library, or run as the `pingops` executable.
//!
//! # Architecture
//!
//! - **Probe**: single liveness checks via the platform `ping` command or ICMP
//! - **Monitor**: per-target probe loops and the registry aggregating them
//! - **Input**: pairing of the address and name lists entered by the operator
//! - **Export**: snapshot to `.xlsx` / `.csv`
//! - **Server**: JSON API for display clients and operator actions
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pingops::{MonitorRegistry, MonitorSettings, CommandProber, export_snapshot};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry =
//!         MonitorRegistry::new(MonitorSettings::default(), Arc::new(CommandProber::default()))
//!             .await?;
//!     registry.create_from_input(&["192.168.1.1"], &["gateway"]).await;
//!     registry.start_all().await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!     export_snapshot(&registry.snapshot().await, "Ping_Results.xlsx")?;
//!
//!     registry.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod export;
pub mod input;
pub mod monitor;
pub mod probe;
pub mod server;

pub use config::{AppConfig, ConfigError};
pub use export::{ExportError, ExportFormat, export_snapshot};
pub use input::{ParsedInput, RejectedLine, parse_text_lists};
pub use monitor::{
    MonitorError, MonitorRegistry, MonitorSettings, SnapshotRow, Status, Target, TargetId,
};
pub use probe::{CommandProber, IcmpProber, ProbeMethod, ProbeOutcome, Prober};
