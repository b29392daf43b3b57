//! Broker code validation against the admin directory.

mod directory;
mod validator;

pub use directory::{
    Broker, BrokerDirectory, BrokersConfig, HttpBrokerDirectory, StaticBrokerDirectory,
    BROKERS_PATH,
};
pub use validator::{default_fallback_brokers, BrokerValidation, BrokerValidator};
