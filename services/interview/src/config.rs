//! Runtime configuration for the interview runner.
//!
//! Settings come from environment variables (a `.env` file is honoured for
//! local development) and are parsed through a lookup function so tests can
//! feed them without touching the process environment.

use interview_core::SessionSettings;
use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_PROCTOR_WS_URL: &str = "ws://localhost:8000";
/// Capacity of the proctoring channel queues.
pub const PROCTOR_CAPACITY: usize = 16;

#[derive(Debug)]
pub struct Config {
    pub api_base_url: String,
    pub proctor_ws_url: String,
    auth_token: SecretString,
    pub frame_interval: Duration,
    pub request_timeout: Duration,
    pub closing_grace: Duration,
    pub log_level: Level,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("{name} must be a positive integer (got '{value}')")]
    InvalidNumber { name: String, value: String },
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `AUTH_TOKEN`: Bearer token from the login flow. Required.
    // *   `API_BASE_URL`: (Optional) Interview backend. Defaults to "http://localhost:8000".
    // *   `PROCTOR_WS_URL`: (Optional) Proctoring channel. Defaults to "ws://localhost:8000".
    // *   `FRAME_INTERVAL_MS`: (Optional) Camera sampling period. Defaults to 1500.
    // *   `REQUEST_TIMEOUT_SECS`: (Optional) Backend request timeout. Defaults to 30.
    // *   `CLOSING_GRACE_SECS`: (Optional) Limit on the time-up exchange. Defaults to 10.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let auth_token = lookup("AUTH_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("AUTH_TOKEN".to_string()))?;

        let api_base_url = lookup("API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let proctor_ws_url = lookup("PROCTOR_WS_URL")
            .unwrap_or_else(|| DEFAULT_PROCTOR_WS_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let frame_interval = Duration::from_millis(positive(&lookup, "FRAME_INTERVAL_MS", 1500)?);
        let request_timeout = Duration::from_secs(positive(&lookup, "REQUEST_TIMEOUT_SECS", 30)?);
        let closing_grace = Duration::from_secs(positive(&lookup, "CLOSING_GRACE_SECS", 10)?);

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            api_base_url,
            proctor_ws_url,
            auth_token: SecretString::from(auth_token),
            frame_interval,
            request_timeout,
            closing_grace,
            log_level,
        })
    }

    /// A fresh copy of the bearer token for one client.
    pub fn auth_token(&self) -> SecretString {
        SecretString::from(self.auth_token.expose_secret().to_string())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            frame_interval: self.frame_interval,
            closing_grace: self.closing_grace,
            ..SessionSettings::default()
        }
    }
}

fn positive(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => match value.trim().parse::<u64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::InvalidNumber {
                name: name.to_string(),
                value,
            }),
        },
    }
}
