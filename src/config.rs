//! Configuration management for Slidegate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use crate::brokers::default_fallback_brokers;
use crate::error::{Result, SlidegateError};
use crate::ratelimit::AttemptPolicy;

/// Prefix for environment overrides, e.g. `SLIDEGATE__SERVER__HTTP_ADDR`.
pub const ENV_PREFIX: &str = "SLIDEGATE";

/// Main configuration for the Slidegate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlidegateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Broker validation configuration
    #[serde(default)]
    pub brokers: BrokersSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Sweep period in milliseconds; also how long a key may sit idle
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_ms: u64,

    /// Limits applied to broker code validation, per client address
    #[serde(default)]
    pub broker_validation: AttemptPolicy,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_ms: default_cleanup_interval(),
            broker_validation: AttemptPolicy::default(),
        }
    }
}

fn default_cleanup_interval() -> u64 {
    3_600_000
}

impl RateLimitingConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

/// Broker validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokersSettings {
    /// Base URL of the admin service; without it only the fallback table is used
    #[serde(default)]
    pub directory_url: Option<String>,

    /// Timeout for directory requests in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Broker code to name, answered from when the directory is unavailable
    #[serde(default = "default_fallback_brokers")]
    pub fallback: BTreeMap<String, String>,
}

impl Default for BrokersSettings {
    fn default() -> Self {
        Self {
            directory_url: None,
            request_timeout_ms: default_request_timeout(),
            fallback: default_fallback_brokers(),
        }
    }
}

fn default_request_timeout() -> u64 {
    5000
}

impl BrokersSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl SlidegateConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: SlidegateConfig =
            serde_yaml::from_str(yaml).map_err(|e| SlidegateError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional YAML file layered with environment
    /// variables prefixed with [`ENV_PREFIX`].
    ///
    /// The file is parsed with serde_yaml so map keys such as broker codes keep
    /// their case; only the environment layer goes through the `config` crate.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut merged = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                serde_yaml::from_str(&contents)
                    .map_err(|e| SlidegateError::Config(e.to_string()))?
            }
            None => serde_yaml::Value::Null,
        };

        let overrides: serde_yaml::Value = ::config::Config::builder()
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| SlidegateError::Config(e.to_string()))?;

        merge_yaml(&mut merged, overrides);
        if merged.is_null() {
            merged = serde_yaml::Value::Mapping(Default::default());
        }

        let config: SlidegateConfig =
            serde_yaml::from_value(merged).map_err(|e| SlidegateError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limiting.cleanup_interval_ms == 0 {
            return Err(SlidegateError::Config(
                "rate_limiting.cleanup_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.brokers.request_timeout_ms == 0 {
            return Err(SlidegateError::Config(
                "brokers.request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Overlay `overrides` onto `base`, recursing into nested mappings.
fn merge_yaml(base: &mut serde_yaml::Value, overrides: serde_yaml::Value) {
    match (base, overrides) {
        (serde_yaml::Value::Mapping(base), serde_yaml::Value::Mapping(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (_, serde_yaml::Value::Mapping(overrides)) if overrides.is_empty() => {}
        (base, overrides) => *base = overrides,
    }
}
