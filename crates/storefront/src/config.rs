//! Fulfillment service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FULFILLMENT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `FULFILLMENT_HOST` - Bind address (default: 127.0.0.1)
//! - `FULFILLMENT_PORT` - Listen port (default: 3100)
//! - `FULFILLMENT_VERIFY_ATTEMPTS` - Read-after-write checks after checkout (default: 3)
//! - `FULFILLMENT_VERIFY_DELAY_MS` - Delay between those checks (default: 500)
//! - `FULFILLMENT_LOOKUP_DELAYS_MS` - Comma-separated delays, one lookup per entry
//!   (default: 0,500,1000,1500,2000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use crate::services::retry::RetryPolicy;

const DEFAULT_VERIFY_ATTEMPTS: usize = 3;
const DEFAULT_VERIFY_DELAY_MS: u64 = 500;
const DEFAULT_LOOKUP_DELAYS_MS: &str = "0,500,1000,1500,2000";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Fulfillment service configuration.
#[derive(Debug, Clone)]
pub struct FulfillmentConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Read-after-write lag handling
    pub consistency: ConsistencyConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "production", "staging")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry transaction sample rate
    pub sentry_traces_sample_rate: f32,
}

/// Retry schedules absorbing replica lag between a write and a later read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyConfig {
    /// Verification of a just-created order.
    pub verify: RetryPolicy,
    /// Order lookups by id.
    pub lookup: RetryPolicy,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            verify: RetryPolicy::fixed(
                DEFAULT_VERIFY_ATTEMPTS,
                Duration::from_millis(DEFAULT_VERIFY_DELAY_MS),
            ),
            lookup: RetryPolicy::from_delays(
                [0, 500, 1000, 1500, 2000].map(Duration::from_millis),
            ),
        }
    }
}

impl FulfillmentConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("FULFILLMENT_DATABASE_URL")?;
        let host = parse_env("FULFILLMENT_HOST", "127.0.0.1")?;
        let port = parse_env("FULFILLMENT_PORT", "3100")?;
        let consistency = ConsistencyConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            consistency,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl ConsistencyConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let attempts: usize = parse_env(
            "FULFILLMENT_VERIFY_ATTEMPTS",
            &DEFAULT_VERIFY_ATTEMPTS.to_string(),
        )?;
        if attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "FULFILLMENT_VERIFY_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let delay_ms: u64 = parse_env(
            "FULFILLMENT_VERIFY_DELAY_MS",
            &DEFAULT_VERIFY_DELAY_MS.to_string(),
        )?;
        let lookup = parse_delays(
            "FULFILLMENT_LOOKUP_DELAYS_MS",
            &get_env_or_default("FULFILLMENT_LOOKUP_DELAYS_MS", DEFAULT_LOOKUP_DELAYS_MS),
        )?;

        Ok(Self {
            verify: RetryPolicy::fixed(attempts, Duration::from_millis(delay_ms)),
            lookup: RetryPolicy::from_delays(lookup),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a comma-separated list of millisecond delays.
fn parse_delays(key: &str, value: &str) -> Result<Vec<Duration>, ConfigError> {
    let delays = value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), format!("{part}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if delays.is_empty() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "at least one delay is required".to_string(),
        ));
    }
    Ok(delays)
}
