//! Configuration management.
//!
//! Settings come from an optional file source plus `SHAVI__`-prefixed
//! environment variables (`SHAVI__RATE_LIMIT__INTERVAL_MS=30000`), with
//! serde defaults for every field so a bare process still starts sensibly.

use serde::{Deserialize, Serialize};

use crate::middleware::RateLimitConfig;
use crate::telemetry::LoggingConfig;

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Access control configuration
    #[serde(default)]
    pub access: AccessConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Deployment environment name (development, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            access: AccessConfig::default(),
            logging: LoggingConfig::default(),
            environment: default_environment(),
        }
    }
}

/// Access control configuration: redirect targets for the path gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Where unauthenticated restricted-area requests are sent
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Where denied authenticated requests are sent
    #[serde(default = "default_landing_path")]
    pub landing_path: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            landing_path: default_landing_path(),
        }
    }
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_landing_path() -> String {
    "/dashboard".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("SHAVI").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides on top.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("SHAVI").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.rate_limit.interval_ms, 60_000);
        assert_eq!(config.rate_limit.max_tracked_keys, 500);
        assert_eq!(config.access.login_path, "/login");
        assert_eq!(config.access.landing_path, "/dashboard");
        assert_eq!(config.environment, "development");
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"rate_limit": {"interval_ms": 30000, "max_requests": 5, "max_tracked_keys": 100}}"#,
        )
        .unwrap();
        assert_eq!(config.rate_limit.interval_ms, 30_000);
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.access.landing_path, "/dashboard");
    }
}
