//! Broker code validation with a static fallback.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::directory::BrokerDirectory;

/// Outcome of validating a broker code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerValidation {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_name: Option<String>,
}

impl BrokerValidation {
    pub fn valid(name: impl Into<String>) -> Self {
        Self {
            valid: true,
            broker_name: Some(name.into()),
        }
    }

    pub fn invalid() -> Self {
        Self {
            valid: false,
            broker_name: None,
        }
    }
}

/// The brokers answered from when the directory cannot be reached.
pub fn default_fallback_brokers() -> BTreeMap<String, String> {
    [
        ("COURT001", "Courtier Alpha"),
        ("COURT002", "Courtier Beta"),
        ("COURT003", "Courtier Gamma"),
    ]
    .into_iter()
    .map(|(code, name)| (code.to_string(), name.to_string()))
    .collect()
}

/// Validates broker codes against the admin directory.
///
/// Any directory failure degrades to the fallback table; validation itself
/// never fails.
#[derive(Clone)]
pub struct BrokerValidator {
    directory: Option<Arc<dyn BrokerDirectory>>,
    fallback: BTreeMap<String, String>,
}

impl std::fmt::Debug for BrokerValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerValidator")
            .field("has_directory", &self.directory.is_some())
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl BrokerValidator {
    /// Create a validator that consults `directory` first.
    pub fn new(directory: Arc<dyn BrokerDirectory>, fallback: BTreeMap<String, String>) -> Self {
        Self {
            directory: Some(directory),
            fallback,
        }
    }

    /// Create a validator that only knows the fallback table.
    pub fn fallback_only(fallback: BTreeMap<String, String>) -> Self {
        Self {
            directory: None,
            fallback,
        }
    }

    /// Check whether `code` belongs to an active broker.
    pub async fn validate(&self, code: &str) -> BrokerValidation {
        let Some(directory) = &self.directory else {
            return self.validate_fallback(code);
        };

        match directory.get_brokers().await {
            Ok(config) => match config.find_active(code) {
                Some(broker) => {
                    debug!(code = %code, broker = %broker.name, "Broker code accepted");
                    BrokerValidation::valid(broker.name.clone())
                }
                None => {
                    debug!(code = %code, "Broker code not found or inactive");
                    BrokerValidation::invalid()
                }
            },
            Err(e) => {
                warn!(error = %e, "Broker directory unavailable, using fallback table");
                self.validate_fallback(code)
            }
        }
    }

    fn validate_fallback(&self, code: &str) -> BrokerValidation {
        match self.fallback.get(code) {
            Some(name) => BrokerValidation::valid(name.clone()),
            None => BrokerValidation::invalid(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brokers::{Broker, BrokersConfig, StaticBrokerDirectory};
    use crate::error::{Result, SlidegateError};
    use async_trait::async_trait;

    struct FailingDirectory;

    #[async_trait]
    impl BrokerDirectory for FailingDirectory {
        async fn get_brokers(&self) -> Result<BrokersConfig> {
            Err(SlidegateError::Directory("connection refused".to_string()))
        }
    }

    fn directory() -> Arc<dyn BrokerDirectory> {
        Arc::new(StaticBrokerDirectory::new(vec![
            Broker {
                code: "COURT010".to_string(),
                name: "Courtier Delta".to_string(),
                active: true,
            },
            Broker {
                code: "COURT011".to_string(),
                name: "Courtier Epsilon".to_string(),
                active: false,
            },
        ]))
    }

    #[tokio::test]
    async fn test_active_broker_is_valid() {
        let validator = BrokerValidator::new(directory(), default_fallback_brokers());

        let result = validator.validate("COURT010").await;
        assert_eq!(result, BrokerValidation::valid("Courtier Delta"));
    }

    #[tokio::test]
    async fn test_inactive_broker_is_invalid() {
        let validator = BrokerValidator::new(directory(), default_fallback_brokers());
        assert_eq!(validator.validate("COURT011").await, BrokerValidation::invalid());
    }

    #[tokio::test]
    async fn test_directory_answer_wins_over_fallback() {
        let validator = BrokerValidator::new(directory(), default_fallback_brokers());

        // Known to the fallback table, but the directory is reachable and does not list it
        assert_eq!(validator.validate("COURT001").await, BrokerValidation::invalid());
    }

    #[tokio::test]
    async fn test_directory_failure_uses_fallback() {
        let validator =
            BrokerValidator::new(Arc::new(FailingDirectory), default_fallback_brokers());

        assert_eq!(
            validator.validate("COURT002").await,
            BrokerValidation::valid("Courtier Beta")
        );
        assert_eq!(validator.validate("COURT999").await, BrokerValidation::invalid());
    }

    #[tokio::test]
    async fn test_fallback_only() {
        let validator = BrokerValidator::fallback_only(default_fallback_brokers());

        assert_eq!(
            validator.validate("COURT003").await,
            BrokerValidation::valid("Courtier Gamma")
        );
    }

    #[test]
    fn test_validation_serialization() {
        let valid = serde_json::to_value(BrokerValidation::valid("Courtier Alpha")).unwrap();
        assert_eq!(
            valid,
            serde_json::json!({"valid": true, "broker_name": "Courtier Alpha"})
        );

        let invalid = serde_json::to_value(BrokerValidation::invalid()).unwrap();
        assert_eq!(invalid, serde_json::json!({"valid": false}));
    }
}
