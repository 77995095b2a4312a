//! # Config
//!
//! Typed, environment-driven settings for the pricing-anomaly pipeline's
//! worker binaries, following the same `Config::from_env()` shape the
//! teacher's services use: read `.env` via `dotenvy`, pull each variable
//! with a sensible default, and fail fast with a descriptive error if a
//! required one is missing or malformed.

use std::env;
use std::time::Duration;

/// Errors produced while loading [`Settings`] from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(String),

    #[error("invalid value for environment variable {name}: {value:?} ({source})")]
    Invalid {
        name: String,
        value: String,
        source: std::num::ParseIntError,
    },
}

/// Settings consumed by the core pipeline (§6 "Environment variables"),
/// plus the connection settings every worker binary needs to actually
/// reach Redis and bind its HTTP server.
#[derive(Debug, Clone)]
pub struct Settings {
    pub redis_url: String,
    pub host: String,
    pub port: u16,

    pub stream_batch_size: usize,
    pub stream_poll_interval: Duration,
    pub stream_max_retries: u32,

    pub graceful_shutdown_timeout: Duration,

    pub enable_sota_models: bool,

    pub notify_dedup_ttl_seconds: u64,

    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_window: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        // PRICEHAWK_IN_MEMORY (dev/test only, see `pricehawk-worker::main`)
        // swaps every adapter for an in-process stand-in, so REDIS_URL is
        // only truly required when that escape hatch isn't set — "reject
        // missing required values early" (§11.3) applies to the real
        // connection string a production process would otherwise silently
        // default away from.
        let in_memory = env::var("PRICEHAWK_IN_MEMORY").ok().as_deref() == Some("1");
        let redis_url = if in_memory {
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
        } else {
            env::var("REDIS_URL").map_err(|_| ConfigError::Missing("REDIS_URL".to_string()))?
        };

        Ok(Self {
            redis_url,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_env("PORT", "8089")?,

            stream_batch_size: parse_env("STREAM_BATCH_SIZE", "50")?,
            stream_poll_interval: Duration::from_millis(parse_env(
                "STREAM_POLL_INTERVAL_MS",
                "2000",
            )?),
            stream_max_retries: parse_env("STREAM_MAX_RETRIES", "5")?,

            graceful_shutdown_timeout: Duration::from_millis(parse_env(
                "GRACEFUL_SHUTDOWN_TIMEOUT",
                "30000",
            )?),

            enable_sota_models: env::var("ENABLE_SOTA_MODELS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),

            notify_dedup_ttl_seconds: parse_env("NOTIFY_DEDUP_TTL_SECONDS", "86400")?,

            circuit_breaker_threshold: parse_env("CIRCUIT_BREAKER_THRESHOLD", "3")?,
            circuit_breaker_window: Duration::from_millis(parse_env(
                "CIRCUIT_BREAKER_WINDOW_MS",
                "300000",
            )?),
        })
    }
}

fn parse_env<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse().map_err(|source| ConfigError::Invalid {
        name: name.to_string(),
        value: raw,
        source,
    })
}
