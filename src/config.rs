//! Hub configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_WS_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required env var: {var}")]
    Missing { var: &'static str },
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Upper bound on waiting for a pooled connection. Every permission and
    /// ticket lookup inherits this bound.
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub port: u16,
    pub database: DatabaseConfig,
    /// Outbound frames buffered per connection before sends start failing.
    pub channel_capacity: usize,
}

impl HubConfig {
    /// Build typed hub config from environment variables.
    ///
    /// Required:
    /// - `DATABASE_URL`
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `DB_ACQUIRE_TIMEOUT_SECS`: default 5
    /// - `WS_CHANNEL_CAPACITY`: default 256
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `DATABASE_URL` is unset or a numeric
    /// variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. `from_env` delegates here.
    ///
    /// # Errors
    ///
    /// Same as [`HubConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing { var: "DATABASE_URL" })?;

        let port = parse_or(&lookup, "PORT", DEFAULT_PORT)?;
        let max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?;
        let acquire_timeout_secs = parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", DEFAULT_DB_ACQUIRE_TIMEOUT_SECS)?;
        let channel_capacity = parse_or(&lookup, "WS_CHANNEL_CAPACITY", DEFAULT_WS_CHANNEL_CAPACITY)?;

        if channel_capacity == 0 {
            return Err(ConfigError::Invalid { var: "WS_CHANNEL_CAPACITY", value: "0".into() });
        }

        Ok(Self {
            port,
            database: DatabaseConfig { url, max_connections, acquire_timeout: Duration::from_secs(acquire_timeout_secs) },
            channel_capacity,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
