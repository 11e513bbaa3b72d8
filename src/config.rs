//! Application configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! One typed struct resolved once at startup. Missing required variables are
//! a startup failure; the process refuses to run with a partial config.
//! Every lookup goes through an injected resolver so tests can supply values
//! without mutating the process environment.

use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DB_MAX_CONNS: u32 = 25;
pub const DEFAULT_DB_MIN_CONNS: u32 = 5;
pub const DEFAULT_TOKEN_EXPIRY_HOURS: i64 = 24;
pub const DEFAULT_RATE_LIMIT_REQUESTS: usize = 100;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_BROADCAST_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_SUBSCRIBER_LIMIT: usize = 50;
pub const DEFAULT_SUBSCRIBER_MAX_LIMIT: usize = 1000;
pub const DEFAULT_WRITE_WAIT_SECS: u64 = 10;
pub const DEFAULT_PONG_WAIT_SECS: u64 = 60;
pub const DEFAULT_PING_PERIOD_SECS: u64 = 54;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 512 * 1024;
pub const DEFAULT_USER_TTL_SECS: u64 = 300;
pub const DEFAULT_SCORE_TTL_SECS: u64 = 120;
pub const DEFAULT_COUNT_TTL_SECS: u64 = 120;
pub const DEFAULT_MIN_SCORE: i64 = 0;
pub const DEFAULT_MAX_SCORE: i64 = 10_000_000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingVar(&'static str),
    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Fully resolved application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub db_max_conns: u32,
    pub db_min_conns: u32,
    /// Redis connection URL. `None` disables the cache layer entirely.
    pub redis_url: Option<String>,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub ws: WsConfig,
    pub cache_ttl: CacheTtlConfig,
    pub validation: ValidationConfig,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 signing secret for bearer credentials.
    pub token_secret: String,
    pub token_expiry: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub requests: usize,
    pub window: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct WsConfig {
    pub broadcast_interval: Duration,
    /// Entries a subscriber receives before asking for more or fewer.
    pub default_limit: usize,
    /// Upper bound a subscriber may request via `update_limit`.
    pub max_limit: usize,
    pub write_wait: Duration,
    pub pong_wait: Duration,
    pub ping_period: Duration,
    pub max_frame_bytes: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct CacheTtlConfig {
    pub user: Duration,
    pub score: Duration,
    pub count: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct ValidationConfig {
    pub min_score: i64,
    pub max_score: i64,
}

impl Config {
    /// Resolve configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when `DATABASE_URL` or `AUTH_TOKEN_SECRET` is
    /// missing, or when a numeric variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::MissingVar("DATABASE_URL"))?;
        let token_secret = lookup("AUTH_TOKEN_SECRET").ok_or(ConfigError::MissingVar("AUTH_TOKEN_SECRET"))?;

        Ok(Self {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            database_url,
            db_max_conns: parse_or(&lookup, "DB_MAX_CONNS", DEFAULT_DB_MAX_CONNS)?,
            db_min_conns: parse_or(&lookup, "DB_MIN_CONNS", DEFAULT_DB_MIN_CONNS)?,
            redis_url: lookup("REDIS_URL"),
            auth: AuthConfig {
                token_secret,
                token_expiry: {
                    let hours: u64 = parse_or(&lookup, "AUTH_TOKEN_EXPIRY_HOURS", DEFAULT_TOKEN_EXPIRY_HOURS as u64)?;
                    Duration::from_secs(hours * 3600)
                },
            },
            rate_limit: RateLimitConfig {
                requests: parse_or(&lookup, "RATE_LIMIT_REQUESTS", DEFAULT_RATE_LIMIT_REQUESTS)?,
                window: secs(parse_or(&lookup, "RATE_LIMIT_WINDOW_SEC", DEFAULT_RATE_LIMIT_WINDOW_SECS)?),
            },
            ws: WsConfig {
                broadcast_interval: secs(parse_or(&lookup, "WS_BROADCAST_INTERVAL_SEC", DEFAULT_BROADCAST_INTERVAL_SECS)?),
                default_limit: parse_or(&lookup, "WS_DEFAULT_LIMIT", DEFAULT_SUBSCRIBER_LIMIT)?,
                max_limit: parse_or(&lookup, "WS_MAX_LIMIT", DEFAULT_SUBSCRIBER_MAX_LIMIT)?,
                write_wait: secs(parse_or(&lookup, "WS_WRITE_WAIT_SEC", DEFAULT_WRITE_WAIT_SECS)?),
                pong_wait: secs(parse_or(&lookup, "WS_PONG_WAIT_SEC", DEFAULT_PONG_WAIT_SECS)?),
                ping_period: secs(parse_or(&lookup, "WS_PING_PERIOD_SEC", DEFAULT_PING_PERIOD_SECS)?),
                max_frame_bytes: parse_or(&lookup, "WS_MAX_FRAME_BYTES", DEFAULT_MAX_FRAME_BYTES)?,
            },
            cache_ttl: CacheTtlConfig {
                user: secs(parse_or(&lookup, "CACHE_USER_TTL_SEC", DEFAULT_USER_TTL_SECS)?),
                score: secs(parse_or(&lookup, "CACHE_SCORE_TTL_SEC", DEFAULT_SCORE_TTL_SECS)?),
                count: secs(parse_or(&lookup, "CACHE_COUNT_TTL_SEC", DEFAULT_COUNT_TTL_SECS)?),
            },
            validation: ValidationConfig {
                min_score: parse_or(&lookup, "SCORE_MIN", DEFAULT_MIN_SCORE)?,
                max_score: parse_or(&lookup, "SCORE_MAX", DEFAULT_MAX_SCORE)?,
            },
            request_timeout: secs(parse_or(&lookup, "REQUEST_TIMEOUT_SEC", DEFAULT_REQUEST_TIMEOUT_SECS)?),
        })
    }
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn parse_or<T, F>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
