//! Shop server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOP_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `SHOP_HOST` - Bind address (default: 127.0.0.1)
//! - `SHOP_PORT` - Listen port (default: 3001)
//! - `SHOP_DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `SHOP_CART_CACHE_TTL_SECS` - Lifetime of a cached cart view (default: 60)
//! - `SHOP_CART_CACHE_CAPACITY` - Maximum cached cart views (default: 10000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance trace sample rate (default: 0.1)
//! - `LOG_FORMAT` - `json` or `text` (default: text)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected `json` or `text`, got `{other}`")),
        }
    }
}

/// Shop server configuration.
#[derive(Debug, Clone)]
pub struct ShopConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Maximum pooled database connections
    pub db_max_connections: u32,
    /// Cart view cache settings
    pub cart_cache: CartCacheConfig,
    /// Error tracking settings
    pub sentry: SentryConfig,
    /// Log output format
    pub log_format: LogFormat,
}

/// Cart view cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartCacheConfig {
    pub capacity: u64,
    pub ttl: Duration,
}

impl Default for CartCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl: Duration::from_secs(60),
        }
    }
}

/// Sentry settings. Reporting is disabled without a DSN.
#[derive(Debug, Clone, PartialEq)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.1,
        }
    }
}

impl ShopConfig {
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
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);

        let database_url = env
            .get("SHOP_DATABASE_URL")
            .or_else(|| env.get("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("SHOP_DATABASE_URL".to_string()))?;

        let cart_cache = CartCacheConfig {
            capacity: env.parse_or("SHOP_CART_CACHE_CAPACITY", 10_000)?,
            ttl: Duration::from_secs(env.parse_or("SHOP_CART_CACHE_TTL_SECS", 60)?),
        };

        let sentry = SentryConfig {
            dsn: env.get("SENTRY_DSN").filter(|dsn| !dsn.is_empty()),
            environment: env.get("SENTRY_ENVIRONMENT"),
            sample_rate: parse_rate(&env, "SENTRY_SAMPLE_RATE", 1.0)?,
            traces_sample_rate: parse_rate(&env, "SENTRY_TRACES_SAMPLE_RATE", 0.1)?,
        };

        Ok(Self {
            database_url,
            host: env.parse_or("SHOP_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: env.parse_or("SHOP_PORT", 3001)?,
            db_max_connections: env.parse_or("SHOP_DB_MAX_CONNECTIONS", 10)?,
            cart_cache,
            sentry,
            log_format: env.parse_or("LOG_FORMAT", LogFormat::Text)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a, F>(&'a F);

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    /// Parse a variable, falling back to `default` when it is unset.
    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }
}

fn parse_rate<F>(env: &Env<'_, F>, key: &str, default: f32) -> Result<f32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let rate = env.parse_or(key, default)?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be between 0.0 and 1.0 (got {rate})"),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ShopConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ShopConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("SHOP_DATABASE_URL", "postgres://localhost/shop")]).unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3001");
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.cart_cache, CartCacheConfig::default());
        assert_eq!(config.sentry, SentryConfig::default());
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_missing_database_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "SHOP_DATABASE_URL"));
    }

    #[test]
    fn test_database_url_fallback() {
        let config = load(&[("DATABASE_URL", "postgres://fly/shop")]).unwrap();
        assert_eq!(config.database_url.expose_secret(), "postgres://fly/shop");
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("SHOP_DATABASE_URL", "postgres://localhost/shop"),
            ("SHOP_HOST", "0.0.0.0"),
            ("SHOP_PORT", "8080"),
            ("SHOP_CART_CACHE_TTL_SECS", "5"),
            ("SHOP_CART_CACHE_CAPACITY", "42"),
            ("SENTRY_DSN", "https://key@sentry.example/1"),
            ("SENTRY_TRACES_SAMPLE_RATE", "0.5"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();

        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.cart_cache.ttl, Duration::from_secs(5));
        assert_eq!(config.cart_cache.capacity, 42);
        assert!(config.sentry.dsn.is_some());
        assert!((config.sentry.traces_sample_rate - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values() {
        let err = load(&[
            ("SHOP_DATABASE_URL", "postgres://localhost/shop"),
            ("SHOP_PORT", "not-a-port"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "SHOP_PORT"));

        let err = load(&[
            ("SHOP_DATABASE_URL", "postgres://localhost/shop"),
            ("SENTRY_SAMPLE_RATE", "1.5"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "SENTRY_SAMPLE_RATE"));
    }

    #[test]
    fn test_debug_redacts_database_url() {
        let config = load(&[("SHOP_DATABASE_URL", "postgres://user:hunter2@db/shop")]).unwrap();
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("hunter2"));
    }
}
