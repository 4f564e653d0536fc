//! Configuration module
//!
//! Configuration is read once from the environment at startup (a `.env` file is
//! honoured), validated, and then handed to the components that need it. Nothing
//! reads these values from process-wide state at request time.

use std::env;
use std::str::FromStr;
use std::time::Duration;

// Common constants
const SERVER_PORT: u16 = 4000;
const MAX_CONNECTIONS: u32 = 25;
const MAX_IDLE_TIME_SECS: u64 = 900;
const QUERY_TIMEOUT_SECS: u64 = 3;
const LIMITER_RPS: f64 = 2.0;
const LIMITER_BURST: u32 = 5;
const LIMITER_REAPER_INTERVAL_SECS: u64 = 60;
const LIMITER_IDLE_EVICTION_SECS: u64 = 180;
const DRAIN_TIMEOUT_SECS: u64 = 30;
const MAX_BODY_BYTES: usize = 256_000;
const READ_TIMEOUT_SECS: u64 = 5;
const REQUEST_TIMEOUT_SECS: u64 = 10;

const ENVIRONMENTS: [&str; 3] = ["development", "staging", "production"];

/// Per-client admission control settings.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Continuous refill rate, in tokens per second.
    pub requests_per_second: f64,
    /// Largest number of tokens a client can hold.
    pub burst: u32,
    /// How often the idle reaper scans the client registry.
    pub reaper_interval: Duration,
    /// Entries unseen for longer than this are evicted by the reaper.
    pub idle_eviction_threshold: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: LIMITER_RPS,
            burst: LIMITER_BURST,
            reaper_interval: Duration::from_secs(LIMITER_REAPER_INTERVAL_SECS),
            idle_eviction_threshold: Duration::from_secs(LIMITER_IDLE_EVICTION_SECS),
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.requests_per_second.is_finite() || self.requests_per_second <= 0.0 {
            return Err(anyhow::anyhow!(
                "LIMITER_RPS must be a positive number, got {}",
                self.requests_per_second
            ));
        }
        if self.burst == 0 {
            return Err(anyhow::anyhow!("LIMITER_BURST must be at least 1"));
        }
        if self.reaper_interval.is_zero() {
            return Err(anyhow::anyhow!(
                "LIMITER_REAPER_INTERVAL_SECS must be greater than zero"
            ));
        }
        if self.idle_eviction_threshold.is_zero() {
            return Err(anyhow::anyhow!(
                "LIMITER_IDLE_EVICTION_SECS must be greater than zero"
            ));
        }
        Ok(())
    }
}

/// Connection pool settings
#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub max_idle_time: Duration,
    /// Used both as the pool acquire timeout and as the per-query ceiling.
    pub query_timeout: Duration,
}

/// Settings for the HTTP listener and its surroundings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub environment: String,
    pub cors_trusted_origins: Vec<String>,
    pub max_body_bytes: usize,
    pub drain_timeout: Duration,
    /// Time allowed for a client to send a request's headers.
    pub read_timeout: Duration,
    /// Ceiling on handling a single request, response included.
    pub request_timeout: Duration,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub base: BaseConfig,
    pub database: DatabaseConfig,
    pub rate_limit: RateLimitConfig,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string())
            .to_lowercase();

        let cors_trusted_origins = lookup("CORS_TRUSTED_ORIGINS")
            .unwrap_or_default()
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let base = BaseConfig {
            server_port: parse_var(&lookup, "PORT", SERVER_PORT)?,
            environment,
            cors_trusted_origins,
            max_body_bytes: parse_var(&lookup, "MAX_BODY_BYTES", MAX_BODY_BYTES)?,
            drain_timeout: Duration::from_secs(parse_var(
                &lookup,
                "SHUTDOWN_DRAIN_TIMEOUT_SECS",
                DRAIN_TIMEOUT_SECS,
            )?),
            read_timeout: Duration::from_secs(parse_var(
                &lookup,
                "HTTP_READ_TIMEOUT_SECS",
                READ_TIMEOUT_SECS,
            )?),
            request_timeout: Duration::from_secs(parse_var(
                &lookup,
                "HTTP_REQUEST_TIMEOUT_SECS",
                REQUEST_TIMEOUT_SECS,
            )?),
        };

        let database = DatabaseConfig {
            url: lookup("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?,
            max_connections: parse_var(&lookup, "DB_MAX_CONNECTIONS", MAX_CONNECTIONS)?,
            max_idle_time: Duration::from_secs(parse_var(
                &lookup,
                "DB_MAX_IDLE_TIME_SECS",
                MAX_IDLE_TIME_SECS,
            )?),
            query_timeout: Duration::from_secs(parse_var(
                &lookup,
                "DB_TIMEOUT_SECONDS",
                QUERY_TIMEOUT_SECS,
            )?),
        };

        let rate_limit = RateLimitConfig {
            enabled: parse_var(&lookup, "LIMITER_ENABLED", true)?,
            requests_per_second: parse_var(&lookup, "LIMITER_RPS", LIMITER_RPS)?,
            burst: parse_var(&lookup, "LIMITER_BURST", LIMITER_BURST)?,
            reaper_interval: Duration::from_secs(parse_var(
                &lookup,
                "LIMITER_REAPER_INTERVAL_SECS",
                LIMITER_REAPER_INTERVAL_SECS,
            )?),
            idle_eviction_threshold: Duration::from_secs(parse_var(
                &lookup,
                "LIMITER_IDLE_EVICTION_SECS",
                LIMITER_IDLE_EVICTION_SECS,
            )?),
        };

        let config = Config {
            base,
            database,
            rate_limit,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !ENVIRONMENTS.contains(&self.base.environment.as_str()) {
            return Err(anyhow::anyhow!(
                "ENVIRONMENT must be one of {}, got '{}'",
                ENVIRONMENTS.join("|"),
                self.base.environment
            ));
        }

        if !(self.database.url.starts_with("postgres://")
            || self.database.url.starts_with("postgresql://"))
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.base.drain_timeout.is_zero() {
            return Err(anyhow::anyhow!(
                "SHUTDOWN_DRAIN_TIMEOUT_SECS must be greater than zero"
            ));
        }

        if self.base.read_timeout.is_zero() || self.base.request_timeout.is_zero() {
            return Err(anyhow::anyhow!(
                "HTTP_READ_TIMEOUT_SECS and HTTP_REQUEST_TIMEOUT_SECS must be greater than zero"
            ));
        }

        self.rate_limit.validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        self.base.environment == "production"
    }

    pub fn server_port(&self) -> u16 {
        self.base.server_port
    }

    pub fn environment(&self) -> &str {
        &self.base.environment
    }

    pub fn cors_trusted_origins(&self) -> &[String] {
        &self.base.cors_trusted_origins
    }

    pub fn max_body_bytes(&self) -> usize {
        self.base.max_body_bytes
    }

    pub fn drain_timeout(&self) -> Duration {
        self.base.drain_timeout
    }

    pub fn read_timeout(&self) -> Duration {
        self.base.read_timeout
    }

    pub fn request_timeout(&self) -> Duration {
        self.base.request_timeout
    }

    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    pub fn rate_limit(&self) -> &RateLimitConfig {
        &self.rate_limit
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .to_lowercase()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: '{}'", key, raw)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config =
            Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/qod")]))
                .unwrap();

        assert_eq!(config.server_port(), 4000);
        assert_eq!(config.environment(), "development");
        assert_eq!(config.drain_timeout(), Duration::from_secs(30));
        assert_eq!(config.read_timeout(), Duration::from_secs(5));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.rate_limit, RateLimitConfig::default());
        assert!(config.cors_trusted_origins().is_empty());
    }

    #[test]
    fn test_limiter_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgresql://localhost/qod"),
            ("LIMITER_ENABLED", "FALSE"),
            ("LIMITER_RPS", "0.5"),
            ("LIMITER_BURST", "12"),
            ("LIMITER_REAPER_INTERVAL_SECS", "10"),
            ("LIMITER_IDLE_EVICTION_SECS", "25"),
            ("CORS_TRUSTED_ORIGINS", "http://a.test, http://b.test"),
        ]))
        .unwrap();

        let limits = config.rate_limit();
        assert!(!limits.enabled);
        assert_eq!(limits.requests_per_second, 0.5);
        assert_eq!(limits.burst, 12);
        assert_eq!(limits.reaper_interval, Duration::from_secs(10));
        // Eviction threshold is not tied to a multiple of the interval
        assert_eq!(limits.idle_eviction_threshold, Duration::from_secs(25));
        assert_eq!(
            config.cors_trusted_origins(),
            &["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn test_missing_database_url_rejected() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/qod"),
            ("LIMITER_RPS", "fast"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("LIMITER_RPS"));

        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/qod"),
            ("LIMITER_BURST", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("LIMITER_BURST"));

        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/qod"),
            ("ENVIRONMENT", "qa"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("ENVIRONMENT"));
    }
}
