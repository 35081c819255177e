//! Process configuration, read once at startup from the environment.
//!
//! A `.env` file is honoured when present (see `dotenvy`). Everything the
//! live-sync engine needs is resolved here so the rest of the crate never
//! touches `std::env` directly.

use std::env;
use std::time::Duration;

/// What the reconciler does when reading the previous status fails for a
/// reason other than "record not found".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFailurePolicy {
    /// Give up on this unit: no decision, no write.
    Abort,
    /// Treat the previous status as UNKNOWN and carry on.
    FailOpen,
}

impl ReadFailurePolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Some(ReadFailurePolicy::Abort),
            "fail_open" | "fail-open" => Some(ReadFailurePolicy::FailOpen),
            _ => None,
        }
    }
}

/// Where the Google service-account key comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsSource {
    Inline(String),
    File(String),
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub telemetry_url: String,
    pub interval: Duration,
    pub device_label: String,
    pub default_subscriber_id: i32,
    pub fetch_timeout: Duration,
    pub store_timeout: Duration,
    pub push_timeout: Duration,
    pub read_failure_policy: ReadFailurePolicy,
}

impl SyncConfig {
    /// Upper bound on how long an in-flight tick may keep running after
    /// shutdown is requested.
    pub fn drain_grace(&self) -> Duration {
        self.store_timeout * 2 + self.push_timeout
    }
}

#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub project_id: String,
    pub credentials: CredentialsSource,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_pool_size: u32,
    pub conn_max_lifetime: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub firebase: FirebaseConfig,
    pub sync: SyncConfig,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => {
                write!(f, "Invalid value for {}: '{}'", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 2;
pub const DEFAULT_DEVICE_LABEL: &str = "Sensor Utama";
pub const DEFAULT_SUBSCRIBER_ID: i32 = 16;
pub const DEFAULT_CREDENTIALS_FILE: &str = "serviceAccountKey.json";

impl Config {
    /// Load `.env` (if any) and build the configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let credentials = match get("FIREBASE_CREDENTIALS") {
            Some(json) => CredentialsSource::Inline(json),
            None => CredentialsSource::File(
                get("GOOGLE_APPLICATION_CREDENTIALS")
                    .unwrap_or_else(|| DEFAULT_CREDENTIALS_FILE.to_string()),
            ),
        };

        let read_failure_policy = match get("LIVE_STATE_READ_FAILURE") {
            Some(v) => ReadFailurePolicy::from_str(&v).ok_or(ConfigError::Invalid {
                key: "LIVE_STATE_READ_FAILURE",
                value: v,
            })?,
            None => ReadFailurePolicy::Abort,
        };

        let interval_secs: u64 =
            parse_or(get("SYNC_INTERVAL_SECS"), "SYNC_INTERVAL_SECS", DEFAULT_SYNC_INTERVAL_SECS)?;
        if interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "SYNC_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }

        Ok(Config {
            database: DatabaseConfig {
                url: require("DATABASE_URL")?,
                max_pool_size: parse_or(get("DB_POOL_MAX_SIZE"), "DB_POOL_MAX_SIZE", 10)?,
                conn_max_lifetime: Duration::from_secs(parse_or(
                    get("DB_CONN_MAX_LIFETIME_SECS"),
                    "DB_CONN_MAX_LIFETIME_SECS",
                    180,
                )?),
            },
            firebase: FirebaseConfig {
                project_id: require("FIREBASE_PROJECT_ID")?,
                credentials,
            },
            sync: SyncConfig {
                telemetry_url: require("TELEMETRY_URL")?,
                interval: Duration::from_secs(interval_secs),
                device_label: get("SYNC_DEVICE_LABEL")
                    .unwrap_or_else(|| DEFAULT_DEVICE_LABEL.to_string()),
                default_subscriber_id: parse_or(
                    get("DEFAULT_SUBSCRIBER_ID"),
                    "DEFAULT_SUBSCRIBER_ID",
                    DEFAULT_SUBSCRIBER_ID,
                )?,
                fetch_timeout: Duration::from_secs(parse_or(
                    get("FETCH_TIMEOUT_SECS"),
                    "FETCH_TIMEOUT_SECS",
                    10,
                )?),
                store_timeout: Duration::from_secs(parse_or(
                    get("STORE_TIMEOUT_SECS"),
                    "STORE_TIMEOUT_SECS",
                    30,
                )?),
                push_timeout: Duration::from_secs(parse_or(
                    get("PUSH_TIMEOUT_SECS"),
                    "PUSH_TIMEOUT_SECS",
                    15,
                )?),
                read_failure_policy,
            },
            port: parse_or(get("PORT"), "PORT", 8000)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: v }),
        None => Ok(default),
    }
}
