//! HTTP surface: broker validation and health endpoints.

mod handlers;
mod server;

pub use handlers::{
    router, ApiError, AppState, BrokerValidationRequest, ErrorBody, BROKER_VALIDATE_ACTION,
};
pub use server::HttpServer;
