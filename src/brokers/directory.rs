//! Access to the admin service's broker directory.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{Result, SlidegateError};

/// Path of the broker listing on the admin service.
pub const BROKERS_PATH: &str = "/admin/config/brokers";

/// A broker known to the admin service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broker {
    /// Code brokers quote to customers
    pub code: String,
    /// Display name
    pub name: String,
    /// Inactive brokers never validate
    pub active: bool,
}

/// The admin service's broker listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokersConfig {
    #[serde(default)]
    pub brokers: Vec<Broker>,
}

impl BrokersConfig {
    /// Find an active broker with exactly this code.
    pub fn find_active(&self, code: &str) -> Option<&Broker> {
        self.brokers.iter().find(|b| b.code == code && b.active)
    }
}

/// A source of broker listings.
#[async_trait]
pub trait BrokerDirectory: Send + Sync {
    /// Fetch the current broker listing.
    async fn get_brokers(&self) -> Result<BrokersConfig>;
}

/// Broker directory backed by the admin service's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpBrokerDirectory {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpBrokerDirectory {
    /// Create a directory client for the admin service at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, timeout)
    }

    /// Create a directory client reusing an existing `reqwest::Client`.
    pub fn with_client(client: reqwest::Client, base_url: &str, timeout: Duration) -> Self {
        let url = format!("{}{}", base_url.trim_end_matches('/'), BROKERS_PATH);
        Self {
            client,
            url,
            timeout,
        }
    }

    /// Full URL of the broker listing.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl BrokerDirectory for HttpBrokerDirectory {
    async fn get_brokers(&self) -> Result<BrokersConfig> {
        trace!(url = %self.url, "Fetching broker directory");

        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlidegateError::Directory(format!(
                "admin service answered {}",
                status
            )));
        }

        let config: BrokersConfig = response.json().await?;

        debug!(brokers = config.brokers.len(), "Fetched broker directory");
        Ok(config)
    }
}

/// A fixed, in-memory broker directory.
#[derive(Debug, Clone, Default)]
pub struct StaticBrokerDirectory {
    config: BrokersConfig,
}

impl StaticBrokerDirectory {
    pub fn new(brokers: Vec<Broker>) -> Self {
        Self {
            config: BrokersConfig { brokers },
        }
    }
}

#[async_trait]
impl BrokerDirectory for StaticBrokerDirectory {
    async fn get_brokers(&self) -> Result<BrokersConfig> {
        Ok(self.config.clone())
    }
}
