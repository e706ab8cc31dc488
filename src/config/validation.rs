//! Config errors and the small parsers shared by the file and the CLI.

use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use thiserror::Error;

/// Errors raised while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid YAML in config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// `${NAME}` or `${NAME:-fallback}`.
static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("env reference pattern is valid")
});

/// Parse a human-readable duration such as `500ms`, `2s` or `1m30s`.
///
/// ```
/// use pingops::config::parse_duration;
///
/// assert_eq!(parse_duration("2s").unwrap().as_secs(), 2);
/// assert_eq!(parse_duration("1m30s").unwrap().as_secs(), 90);
/// ```
pub fn parse_duration(text: &str) -> Result<Duration, String> {
    match text.trim() {
        "" => Err("empty duration".to_string()),
        trimmed => humantime::parse_duration(trimmed).map_err(|e| format!("'{trimmed}': {e}")),
    }
}

/// Substitute `${NAME}` and `${NAME:-fallback}` references with values from
/// the process environment. Unset variables without a fallback become empty.
pub fn expand_env_vars(input: &str) -> String {
    ENV_REFERENCE
        .replace_all(input, |caps: &Captures| {
            std::env::var(&caps[1])
                .ok()
                .or_else(|| caps.get(2).map(|fallback| fallback.as_str().to_string()))
                .unwrap_or_default()
        })
        .into_owned()
}
