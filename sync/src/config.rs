//! Configuration management for the sync agent.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use fazenda_engine::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};

/// Agent configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Local API host address
    pub host: String,
    /// Local API port
    pub port: u16,
    /// Directory of the file-backed key-value store
    pub data_dir: PathBuf,
    /// Base URL of the remote apply RPC; `None` runs the no-op applier
    pub remote_url: Option<String>,
    /// Bearer token for the remote and for local API clients
    pub auth_token: Option<String>,
    /// URL polled to decide reachability; `None` assumes always reachable
    pub probe_url: Option<String>,
    /// Delay between reachability probes
    pub probe_interval: Duration,
    /// Per-action remote apply timeout
    pub apply_timeout: Duration,
    /// Failed attempts before an action is dead-lettered; 0 is unlimited
    pub max_attempts: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3030".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let remote_url = non_empty_var("REMOTE_URL").map(|url| url.trim_end_matches('/').to_string());
        let auth_token = non_empty_var("AUTH_TOKEN");
        let probe_url = non_empty_var("PROBE_URL");

        let probe_interval = Duration::from_secs(require_positive(
            "PROBE_INTERVAL_SECS",
            parse_number("PROBE_INTERVAL_SECS", 15)?,
        )?);
        let apply_timeout = Duration::from_millis(require_positive(
            "APPLY_TIMEOUT_MS",
            parse_number("APPLY_TIMEOUT_MS", 10_000)?,
        )?);
        let max_attempts = parse_number("MAX_ATTEMPTS", u64::from(DEFAULT_MAX_ATTEMPTS))?;
        let max_attempts = u32::try_from(max_attempts).map_err(|_| ConfigError::InvalidNumber {
            name: "MAX_ATTEMPTS",
            value: max_attempts.to_string(),
        })?;

        Ok(Self {
            host,
            port,
            data_dir,
            remote_url,
            auth_token,
            probe_url,
            probe_interval,
            apply_timeout,
            max_attempts,
        })
    }

    /// Retry policy derived from `max_attempts`.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_attempts(self.max_attempts)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3030,
            data_dir: PathBuf::from("./data"),
            remote_url: None,
            auth_token: None,
            probe_url: None,
            probe_interval: Duration::from_secs(15),
            apply_timeout: Duration::from_millis(10_000),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_number(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    parse_value(name, env::var(name).ok(), default)
}

fn parse_value(name: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
        None => Ok(default),
    }
}

/// Intervals and timeouts of zero would stall the agent.
fn require_positive(name: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNumber {
            name,
            value: value.to_string(),
        });
    }
    Ok(value)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid {name} value: {value}")]
    InvalidNumber { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.port, 3030);
        assert_eq!(config.apply_timeout, Duration::from_secs(10));
        assert_eq!(config.retry_policy().max_attempts, Some(DEFAULT_MAX_ATTEMPTS));
        assert!(config.remote_url.is_none());
    }

    #[test]
    fn numbers_parse_with_default() {
        assert_eq!(parse_value("MAX_ATTEMPTS", None, 10).unwrap(), 10);
        assert_eq!(parse_value("MAX_ATTEMPTS", Some(" 3 ".into()), 10).unwrap(), 3);
        assert!(matches!(
            parse_value("MAX_ATTEMPTS", Some("many".into()), 10),
            Err(ConfigError::InvalidNumber { name: "MAX_ATTEMPTS", .. })
        ));
    }

    #[test]
    fn zero_interval_and_timeout_are_rejected() {
        for name in ["PROBE_INTERVAL_SECS", "APPLY_TIMEOUT_MS"] {
            let value = parse_value(name, Some("0".into()), 15).unwrap();
            let err = require_positive(name, value).unwrap_err();
            assert_eq!(err.to_string(), format!("Invalid {} value: 0", name));
        }
        assert_eq!(require_positive("APPLY_TIMEOUT_MS", 250).unwrap(), 250);
    }

    #[test]
    fn zero_attempts_means_unlimited() {
        let config = Config {
            max_attempts: 0,
            ..Config::default()
        };
        assert_eq!(config.retry_policy(), RetryPolicy::unlimited());
    }
}
