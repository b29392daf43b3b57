//! Request handlers for the admin HTTP surface.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::brokers::{BrokerValidation, BrokerValidator};
use crate::ratelimit::{policy_key, AttemptPolicy, RateLimiter};

/// Action name used to key broker validation attempts.
pub const BROKER_VALIDATE_ACTION: &str = "brokers:validate";

/// Shared state for all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub rate_limiter: Arc<RateLimiter>,
    pub validator: Arc<BrokerValidator>,
    pub broker_policy: AttemptPolicy,
}

/// Body of `POST /brokers/validate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerValidationRequest {
    pub broker_code: String,
}

/// Error body returned on rejected requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Errors surfaced to HTTP callers.
#[derive(Debug)]
pub enum ApiError {
    TooManyRequests,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "too many attempts, try again later",
            ),
        };

        (
            status,
            Json(ErrorBody {
                error: message.to_string(),
            }),
        )
            .into_response()
    }
}

/// Build the router for the service.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/brokers/validate", post(validate_broker))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Validate a broker code, throttling failed guesses per client address.
#[instrument(skip_all, fields(client = %addr.ip()))]
async fn validate_broker(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<BrokerValidationRequest>,
) -> Result<Json<BrokerValidation>, ApiError> {
    let key = policy_key(BROKER_VALIDATE_ACTION, &addr.ip().to_string());

    if state.broker_policy.check(&state.rate_limiter, &key) {
        warn!(key = %key, "Broker validation rate limited");
        return Err(ApiError::TooManyRequests);
    }

    let result = state.validator.validate(&request.broker_code).await;

    if result.valid {
        // Only failed guesses count against the caller
        state.rate_limiter.reset(&key);
    }

    info!(
        broker_code = %request.broker_code,
        valid = result.valid,
        "Broker validation decision made"
    );

    Ok(Json(result))
}
