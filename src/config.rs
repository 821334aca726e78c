//! Service configuration from the environment

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {key} value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    /// In-memory store when unset
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Unconfigured gateway when unset
    pub payment_api_key: Option<String>,
    pub payment_api_base: String,
    pub payment_timeout: Duration,
    pub resource_cache_ttl: Duration,
    pub request_timeout: Duration,
    /// JSON array of resources loaded into the in-memory store
    pub resource_seed_file: Option<String>,
}

impl Config {
    /// Load from the process environment after reading `.env`
    pub fn from_env() -> Result<Self, ConfigError> {
        if dotenvy::dotenv().is_err() {
            info!("No .env file found, using process environment");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            bind_address: optional("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            database_url: optional("DATABASE_URL"),
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            payment_api_key: optional("PAYMENT_API_KEY"),
            payment_api_base: optional("PAYMENT_API_BASE")
                .unwrap_or_else(|| "https://api.stripe.com".to_string()),
            payment_timeout: Duration::from_millis(parse_or(
                &lookup,
                "PAYMENT_TIMEOUT_MS",
                10_000,
            )?),
            resource_cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "RESOURCE_CACHE_TTL_SECS",
                60,
            )?),
            request_timeout: Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?),
            resource_seed_file: optional("RESOURCE_SEED_FILE"),
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(value) => value.parse().map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                value,
                reason: e.to_string(),
            }
        }),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.database_url, None);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.payment_api_key, None);
        assert_eq!(config.payment_timeout, Duration::from_secs(10));
        assert_eq!(config.resource_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides_and_blank_values() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/booking"),
            ("PAYMENT_API_KEY", "  "),
            ("PAYMENT_TIMEOUT_MS", "2500"),
        ]))
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/booking"));
        assert_eq!(config.payment_api_key, None);
        assert_eq!(config.payment_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_unparseable_value_is_an_error() {
        let err = Config::from_lookup(lookup(&[("REQUEST_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("REQUEST_TIMEOUT_SECS"));
    }
}
