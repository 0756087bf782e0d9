//! Configuration system for beacon.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{BeaconError, BeaconResult};
use crate::webhook::RetrySchedule;

/// Default User-Agent sent with every webhook request.
pub const DEFAULT_USER_AGENT: &str = "beacon-webhooks/1.0";

/// Webhook dispatch configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Per-attempt HTTP timeout in seconds.
    pub request_timeout_secs: u64,
    /// Delays between attempts in milliseconds. One more attempt is made
    /// than there are delays.
    pub retry_delays_ms: Vec<u64>,
    /// User-Agent header value.
    pub user_agent: String,
    /// Captured response bodies are cut to this many characters.
    pub max_response_body_chars: usize,
    /// SQLite database holding subscriptions and the delivery log.
    pub database_path: PathBuf,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            retry_delays_ms: vec![1_000, 5_000],
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_response_body_chars: 2_000,
            database_path: PathBuf::from("beacon.db"),
        }
    }
}

impl DispatchConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<Path>) -> BeaconResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| BeaconError::Configuration(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| BeaconError::Configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| BeaconError::Configuration(e.to_string()))?,
            _ => {
                return Err(BeaconError::Configuration(
                    "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
                ))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// Reads:
    /// - `BEACON_REQUEST_TIMEOUT_SECS` (default: 10)
    /// - `BEACON_RETRY_DELAYS_MS`, comma separated (default: `1000,5000`)
    /// - `BEACON_USER_AGENT` (default: `beacon-webhooks/1.0`)
    /// - `BEACON_MAX_RESPONSE_BODY_CHARS` (default: 2000)
    /// - `BEACON_DATABASE_PATH` (default: `beacon.db`)
    ///
    /// Unparseable values are reported, not ignored.
    pub fn from_env() -> BeaconResult<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("BEACON_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_env("BEACON_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Ok(value) = std::env::var("BEACON_RETRY_DELAYS_MS") {
            config.retry_delays_ms = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_env("BEACON_RETRY_DELAYS_MS", s))
                .collect::<BeaconResult<Vec<u64>>>()?;
        }

        if let Ok(agent) = std::env::var("BEACON_USER_AGENT") {
            config.user_agent = agent;
        }

        if let Ok(value) = std::env::var("BEACON_MAX_RESPONSE_BODY_CHARS") {
            config.max_response_body_chars = parse_env("BEACON_MAX_RESPONSE_BODY_CHARS", &value)?;
        }

        if let Ok(path) = std::env::var("BEACON_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make delivery meaningless.
    pub fn validate(&self) -> BeaconResult<()> {
        if self.request_timeout_secs == 0 {
            return Err(BeaconError::Configuration(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(BeaconError::Configuration(
                "user_agent must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Retry schedule built from `retry_delays_ms`.
    pub fn retry_schedule(&self) -> RetrySchedule {
        RetrySchedule::new(
            self.retry_delays_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        )
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> BeaconResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| BeaconError::Configuration(format!("{key}={value:?}: {e}")))
}
