//! Process configuration loaded from the environment.
//!
//! The broker URL, broker token, application id and connection-name list are
//! required. Their absence is a fatal `AppError::Configuration` raised before
//! any connection attempt is made.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::AppError;
use crate::observability::LogFormat;

// ─────────────────────────────────────────────────────────────────────────────
// Environment Keys
// ─────────────────────────────────────────────────────────────────────────────

pub const ENV_BROKER_URL: &str = "HEROKU_APPLINK_API_URL";
pub const ENV_BROKER_TOKEN: &str = "HEROKU_APPLINK_TOKEN";
pub const ENV_APP_ID: &str = "HEROKU_APP_ID";
pub const ENV_CONNECTION_NAMES: &str = "CONNECTION_NAMES";
pub const ENV_PORT: &str = "PORT";
pub const ENV_BULK_TARGET: &str = "BULK_TARGET_CONNECTION";
pub const ENV_BULK_POLL_INTERVAL: &str = "BULK_POLL_INTERVAL_SECS";
pub const ENV_BULK_MAX_POLLS: &str = "BULK_MAX_POLLS";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

/// Connection that receives the background account load unless overridden.
pub const DEFAULT_BULK_TARGET: &str = "empty-org";

/// Seconds between batch status polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

pub const DEFAULT_PORT: u16 = 8080;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Settings for talking to the AppLink authorization broker.
#[derive(Clone)]
pub struct BrokerConfig {
    /// Broker base URL (e.g. "https://applink.example.com").
    pub base_url: Url,
    /// Bearer token presented to the broker.
    pub token: SecretString,
    /// Value sent in the `X-App-UUID` header.
    pub app_id: String,
    /// Trimmed, non-empty, de-duplicated connection names in configured order.
    pub connection_names: Vec<String>,
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"[REDACTED]")
            .field("app_id", &self.app_id)
            .field("connection_names", &self.connection_names)
            .finish()
    }
}

/// Settings for the background bulk load.
#[derive(Debug, Clone)]
pub struct BulkSettings {
    /// Connection the load runs against.
    pub target_connection: String,
    /// Delay before each batch status poll.
    pub poll_interval: Duration,
    /// Optional cap on status polls. `None` polls until a terminal state.
    pub max_polls: Option<u32>,
}

impl Default for BulkSettings {
    fn default() -> Self {
        Self {
            target_connection: DEFAULT_BULK_TARGET.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_polls: None,
        }
    }
}

/// Complete process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub broker: BrokerConfig,
    pub bulk: BulkSettings,
    pub port: u16,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Loads configuration from process environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Configuration` if a required key is missing or blank,
    /// or if an optional key holds an unparseable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = required(&lookup, ENV_BROKER_URL)?;
        let token = required(&lookup, ENV_BROKER_TOKEN)?;
        let raw_names = required(&lookup, ENV_CONNECTION_NAMES)?;
        let app_id = required(&lookup, ENV_APP_ID)?;

        let base_url = parse_broker_url(&raw_url)?;

        let connection_names = parse_connection_names(&raw_names);
        if connection_names.is_empty() {
            return Err(AppError::Configuration(format!(
                "{} contains no connection names",
                ENV_CONNECTION_NAMES
            )));
        }

        let broker = BrokerConfig {
            base_url,
            token: SecretString::from(token),
            app_id,
            connection_names,
        };

        let mut bulk = BulkSettings::default();
        if let Some(target) = optional(&lookup, ENV_BULK_TARGET) {
            bulk.target_connection = target;
        }
        if let Some(secs) = optional(&lookup, ENV_BULK_POLL_INTERVAL) {
            let secs: u64 = parse_number(ENV_BULK_POLL_INTERVAL, &secs)?;
            bulk.poll_interval = Duration::from_secs(secs);
        }
        if let Some(max) = optional(&lookup, ENV_BULK_MAX_POLLS) {
            bulk.max_polls = Some(parse_number(ENV_BULK_MAX_POLLS, &max)?);
        }

        let port = match optional(&lookup, ENV_PORT) {
            Some(port) => parse_number(ENV_PORT, &port)?,
            None => DEFAULT_PORT,
        };

        let log_format = match optional(&lookup, ENV_LOG_FORMAT) {
            Some(format) => format.parse()?,
            None => LogFormat::default(),
        };

        Ok(Self {
            broker,
            bulk,
            port,
            log_format,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Splits a comma-separated connection list.
///
/// Entries are trimmed; blank entries are dropped and repeated names keep
/// only their first occurrence.
pub fn parse_connection_names(raw: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
        }
    }
    names
}

fn parse_broker_url(raw: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw.trim()).map_err(|e| {
        AppError::Configuration(format!("{} is not a valid URL: {}", ENV_BROKER_URL, e))
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AppError::Configuration(format!(
            "{} must use http or https, got '{}'",
            ENV_BROKER_URL, other
        ))),
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).ok_or_else(|| {
        AppError::Configuration(format!(
            "Heroku AppLink environment variable {} is not set",
            key
        ))
    })
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, AppError> {
    value.trim().parse().map_err(|_| {
        AppError::Configuration(format!("{} has an invalid value: '{}'", key, value))
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
