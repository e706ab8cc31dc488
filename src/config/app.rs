//! Application configuration structures.

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::export::DEFAULT_EXPORT_PATH;
use crate::input::validate_address;
use crate::monitor::{
    ClassifyPolicy, DEFAULT_INTERVAL, DEFAULT_MIN_SAMPLES, DEFAULT_WINDOW_SIZE, MonitorSettings,
    Target, clamp_interval,
};
use crate::probe::{DEFAULT_TIMEOUT, ProbeMethod};

use super::validation::{ConfigError, expand_env_vars};

// =============================================================================
// Constants
// =============================================================================

/// Default terminal refresh interval (2 seconds).
pub const DEFAULT_REFRESH: Duration = Duration::from_secs(2);

/// Default API server port.
pub const DEFAULT_PORT: u16 = 8080;

fn default_interval() -> Duration {
    DEFAULT_INTERVAL
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

fn default_min_samples() -> usize {
    DEFAULT_MIN_SAMPLES
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_refresh() -> Duration {
    DEFAULT_REFRESH
}

// =============================================================================
// Monitor Configuration
// =============================================================================

/// Probe loop and classification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Time between probes (default: 1s, minimum: 1s).
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Number of recent outcomes kept per target (default: 5).
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Outcomes needed before a status is reported (default: 1).
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Probe once as soon as a target starts (default: true).
    #[serde(default = "default_true")]
    pub probe_on_start: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            window_size: DEFAULT_WINDOW_SIZE,
            min_samples: DEFAULT_MIN_SAMPLES,
            probe_on_start: true,
        }
    }
}

impl MonitorConfig {
    /// Runtime settings, with the interval clamped to the minimum.
    pub fn settings(&self) -> MonitorSettings {
        MonitorSettings {
            interval: clamp_interval(self.interval),
            policy: ClassifyPolicy {
                window_size: self.window_size,
                min_samples: self.min_samples,
            },
            probe_on_start: self.probe_on_start,
        }
    }
}

// =============================================================================
// Probe Configuration
// =============================================================================

/// Probe implementation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// `command` (platform ping) or `icmp` (default: command).
    #[serde(default)]
    pub method: ProbeMethod,

    /// Per-probe timeout (default: 2s).
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            method: ProbeMethod::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

// =============================================================================
// Server Configuration
// =============================================================================

/// HTTP API configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Serve the HTTP API (default: false).
    pub enabled: bool,

    /// Bind address (default: "127.0.0.1").
    pub bind: String,

    /// Port (default: 8080).
    pub port: u16,

    /// Browser origins allowed to call the API cross-origin, e.g.
    /// `http://localhost:3000`. Empty means same-origin only.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            allowed_origins: Vec::new(),
        }
    }
}

// =============================================================================
// Export / Display Configuration
// =============================================================================

/// Export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Spreadsheet written on exit, if set.
    pub path: Option<String>,

    /// Path used by the API when a request names none.
    pub default_path: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: None,
            default_path: DEFAULT_EXPORT_PATH.to_string(),
        }
    }
}

/// Terminal display settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Table refresh interval (default: 2s).
    #[serde(default = "default_refresh", with = "humantime_serde")]
    pub refresh: Duration,

    /// Print the status table (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh: DEFAULT_REFRESH,
            enabled: true,
        }
    }
}

/// A target listed in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Host name or IP address.
    pub address: String,

    /// Display name (default: the address).
    #[serde(default)]
    pub name: Option<String>,
}

impl From<&TargetConfig> for Target {
    fn from(cfg: &TargetConfig) -> Self {
        Target::new(cfg.address.trim(), cfg.name.as_deref().unwrap_or(""))
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    /// Targets created at startup.
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` and `${VAR:-default}` references are expanded before parsing.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(&expand_env_vars(content))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.monitor.window_size == 0 {
            return invalid("monitor window_size must be positive".to_string());
        }
        if self.monitor.min_samples == 0 || self.monitor.min_samples > self.monitor.window_size {
            return invalid(format!(
                "monitor min_samples must be between 1 and window_size ({}), got {}",
                self.monitor.window_size, self.monitor.min_samples
            ));
        }
        if self.monitor.interval.is_zero() {
            return invalid("monitor interval must be non-zero".to_string());
        }

        if self.probe.timeout.is_zero() {
            return invalid("probe timeout must be non-zero".to_string());
        }

        self.server.bind.parse::<IpAddr>().map_err(|_| {
            ConfigError::Invalid(format!(
                "invalid server bind address: '{}'",
                self.server.bind
            ))
        })?;
        if self.server.port == 0 {
            return invalid("server port must be non-zero".to_string());
        }
        for origin in &self.server.allowed_origins {
            let well_formed = (origin.starts_with("http://") || origin.starts_with("https://"))
                && origin.parse::<axum::http::HeaderValue>().is_ok();
            if !well_formed {
                return invalid(format!("invalid server allowed origin: '{origin}'"));
            }
        }

        if self.display.refresh.is_zero() {
            return invalid("display refresh must be non-zero".to_string());
        }

        for (idx, target) in self.targets.iter().enumerate() {
            validate_address(target.address.trim()).map_err(|e| {
                ConfigError::Invalid(format!(
                    "target #{} '{}': {}",
                    idx + 1,
                    target.address,
                    e
                ))
            })?;
        }

        Ok(())
    }

    /// Targets listed in the file, in order.
    pub fn targets(&self) -> Vec<Target> {
        self.targets.iter().map(Target::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::MIN_INTERVAL;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.monitor.interval, DEFAULT_INTERVAL);
        assert_eq!(config.monitor.window_size, DEFAULT_WINDOW_SIZE);
        assert_eq!(config.monitor.min_samples, DEFAULT_MIN_SAMPLES);
        assert_eq!(config.probe.method, ProbeMethod::Command);
        assert_eq!(config.probe.timeout, DEFAULT_TIMEOUT);
        assert!(!config.server.enabled);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.export.default_path, DEFAULT_EXPORT_PATH);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = AppConfig::from_yaml("{}").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
monitor:
  interval: 2s
  window_size: 10
  min_samples: 3
probe:
  method: icmp
  timeout: 500ms
server:
  enabled: true
  bind: 0.0.0.0
  port: 9090
export:
  path: results.csv
display:
  refresh: 5s
targets:
  - address: 8.8.8.8
    name: google-dns
  - address: 1.1.1.1
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.monitor.interval, Duration::from_secs(2));
        assert_eq!(config.monitor.window_size, 10);
        assert_eq!(config.probe.method, ProbeMethod::Icmp);
        assert_eq!(config.probe.timeout, Duration::from_millis(500));
        assert!(config.server.enabled);
        assert_eq!(config.export.path.as_deref(), Some("results.csv"));
        assert_eq!(config.display.refresh, Duration::from_secs(5));

        let targets = config.targets();
        assert_eq!(targets[0], Target::new("8.8.8.8", "google-dns"));
        assert_eq!(targets[1].display_name, "1.1.1.1");

        let settings = config.monitor.settings();
        assert_eq!(settings.policy.window_size, 10);
        assert_eq!(settings.policy.min_samples, 3);
    }

    #[test]
    fn test_settings_clamp_interval() {
        let config = AppConfig::from_yaml("monitor:\n  interval: 200ms\n").unwrap();
        assert_eq!(config.monitor.settings().interval, MIN_INTERVAL);
    }

    #[test]
    fn test_validation_min_samples_exceeds_window() {
        let result = AppConfig::from_yaml("monitor:\n  window_size: 3\n  min_samples: 4\n");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("min_samples"));
    }

    #[test]
    fn test_validation_zero_window() {
        assert!(AppConfig::from_yaml("monitor:\n  window_size: 0\n").is_err());
    }

    #[test]
    fn test_validation_invalid_bind_address() {
        let result = AppConfig::from_yaml("server:\n  bind: not-an-ip\n");
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("invalid server bind address")
        );
    }

    #[test]
    fn test_validation_bad_target() {
        let result = AppConfig::from_yaml("targets:\n  - address: \"bad host\"\n");
        assert!(result.unwrap_err().to_string().contains("target #1"));
    }

    #[test]
    fn test_unknown_probe_method_is_parse_error() {
        let result = AppConfig::from_yaml("probe:\n  method: telnet\n");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pingops.yaml");
        std::fs::write(&path, "targets:\n  - address: 10.0.0.1\n    name: gw\n").unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.targets().len(), 1);
    }

    #[test]
    fn test_example_config_parses() {
        let config = AppConfig::from_yaml(include_str!("../../pingops.example.yaml")).unwrap();
        assert_eq!(config.monitor.window_size, 5);
        assert_eq!(config.probe.method, ProbeMethod::Command);
        assert!(config.export.path.is_some());
        let targets = config.targets();
        assert_eq!(targets.len(), 3);
        assert_eq!(targets[0].display_name, "google-dns");
        assert_eq!(targets[2].display_name, "192.168.1.1");
    }

    #[test]
    fn test_allowed_origins() {
        let config =
            AppConfig::from_yaml("server:\n  allowed_origins: [\"http://localhost:3000\"]\n")
                .unwrap();
        assert_eq!(config.server.allowed_origins, vec!["http://localhost:3000"]);
        assert!(AppConfig::default().server.allowed_origins.is_empty());

        let result = AppConfig::from_yaml("server:\n  allowed_origins: [\"*\"]\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
