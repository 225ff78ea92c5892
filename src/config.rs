//! Environment configuration.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::{Result, StorefrontError};

/// How checkout treats a line whose stock ran out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    /// All lines decrement or none do.
    #[default]
    Atomic,
    /// Lines without stock are skipped; the cart is cleared anyway.
    BestEffort,
}

impl FromStr for CheckoutMode {
    type Err = StorefrontError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "atomic" => Ok(Self::Atomic),
            "best_effort" | "best-effort" => Ok(Self::BestEffort),
            other => Err(StorefrontError::Config(format!("Invalid CHECKOUT_MODE '{other}'"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub nats_url: Option<String>,
    pub session_ttl: Duration,
    pub session_cookie: String,
    pub checkout_mode: CheckoutMode,
    pub cors_origin: Option<String>,
    pub allow_admin_signup: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: None,
            database_max_connections: 10,
            nats_url: None,
            session_ttl: Duration::from_secs(86_400),
            session_cookie: "sid".to_string(),
            checkout_mode: CheckoutMode::Atomic,
            cors_origin: None,
            allow_admin_signup: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse(&get, "PORT")?.unwrap_or(defaults.port),
            database_url: get("DATABASE_URL"),
            database_max_connections: parse(&get, "DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(defaults.database_max_connections),
            nats_url: get("NATS_URL"),
            session_ttl: parse::<u64>(&get, "SESSION_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_ttl),
            session_cookie: get("SESSION_COOKIE").unwrap_or(defaults.session_cookie),
            checkout_mode: get("CHECKOUT_MODE")
                .map(|v| v.parse::<CheckoutMode>())
                .transpose()?
                .unwrap_or_default(),
            cors_origin: get("CORS_ORIGIN"),
            allow_admin_signup: parse(&get, "ALLOW_ADMIN_SIGNUP")?.unwrap_or(false),
        };

        if config.session_ttl.is_zero() {
            return Err(StorefrontError::Config("SESSION_TTL_SECS must be positive".into()));
        }
        tracing::debug!(
            port = config.port,
            in_memory = config.database_url.is_none(),
            checkout_mode = ?config.checkout_mode,
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| StorefrontError::Config(format!("Invalid {key}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.bind_addr(), "0.0.0.0:8080");
        assert_eq!(c.checkout_mode, CheckoutMode::Atomic);
        assert!(c.database_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let c = config(&[("PORT", "9000"), ("CHECKOUT_MODE", "best_effort"), ("SESSION_TTL_SECS", "60")]).unwrap();
        assert_eq!(c.port, 9000);
        assert_eq!(c.checkout_mode, CheckoutMode::BestEffort);
        assert_eq!(c.session_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(config(&[("PORT", "eighty")]), Err(StorefrontError::Config(_))));
        assert!(matches!(config(&[("CHECKOUT_MODE", "yolo")]), Err(StorefrontError::Config(_))));
        assert!(matches!(config(&[("SESSION_TTL_SECS", "0")]), Err(StorefrontError::Config(_))));
    }
}
