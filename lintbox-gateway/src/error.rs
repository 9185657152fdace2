//! Error types for the gateway crate.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use lintbox_core::{CoreError, ShareId};
use lintbox_engine::EngineInvocationError;

/// Failures of the share store.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The identifier was never issued or its entry has expired.
    #[error("share not found: {0}")]
    NotFound(ShareId),

    /// The backing storage cannot serve requests.
    #[error("share store unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur during gateway request handling.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// The request body is malformed or contains invalid values.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request configuration failed to merge or validate.
    #[error("invalid configuration: {0}")]
    Validation(#[from] CoreError),

    /// The engine could not complete the invocation.
    #[error(transparent)]
    Engine(#[from] EngineInvocationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GatewayError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Validation(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            GatewayError::Engine(EngineInvocationError::Timeout { .. }) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            GatewayError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            GatewayError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}
