//! Configuration module for PingOps.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Monitor settings (probe interval, outcome window, classification threshold)
//! - Probe settings (method, timeout)
//! - HTTP API, export and terminal display settings
//! - Targets created at startup

mod app;
mod validation;

pub use app::{
    AppConfig, DisplayConfig, ExportConfig, MonitorConfig, ProbeConfig, ServerConfig,
    TargetConfig,
};
pub use validation::{ConfigError, expand_env_vars, parse_duration};

// Re-export constants
pub use app::{DEFAULT_PORT, DEFAULT_REFRESH};
