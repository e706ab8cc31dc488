//! Monitor and registry errors.

use thiserror::Error;

use super::target::TargetId;

/// Errors raised by target monitors and the registry.
///
/// Probe failures are not errors; they only show up in the classified status.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Job scheduler rejected an operation.
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// No target with this id in the registry.
    #[error("target {0} not found")]
    NotFound(TargetId),
}
