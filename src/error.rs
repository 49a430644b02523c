// Central error envelope for the detailing API.
// Every module error converts into the same JSON shape so clients can always
// branch on error_code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::store::StoreError;

/// Consistent error response structure.
///
/// Machine-readable `error_code`, human-readable `message`, optional
/// machine-readable `details`, and an ISO 8601 timestamp.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_code: &str, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.to_string(),
            message: message.into(),
            details: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// Error type for the thin handlers that live at the crate root (catalog,
/// health, metrics). The booking, pricing and slot modules carry their own
/// richer error enums.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request validation failed")]
    ValidationError(#[from] validator::ValidationErrors),
    #[error("{resource} with id {id} not found")]
    NotFound { resource: String, id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::ValidationError(errors) => {
                debug!("Validation error: {:?}", errors);
                ErrorResponse::new("VALIDATION_ERROR", "Request validation failed")
                    .with_details(serde_json::to_value(&errors).unwrap_or(serde_json::json!({})))
                    .into_response_with(StatusCode::BAD_REQUEST)
            }
            ApiError::NotFound { resource, id } => {
                debug!("Resource not found: {} with id {}", resource, id);
                ErrorResponse::new("NOT_FOUND", format!("{} with id {} not found", resource, id))
                    .into_response_with(StatusCode::NOT_FOUND)
            }
            ApiError::Store(store_error) => {
                // Full detail stays in the logs; clients get a generic message.
                error!("Store error: {:?}", store_error);
                ErrorResponse::new("UPSTREAM_UNAVAILABLE", "A storage error occurred")
                    .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ApiError::InternalError(internal_msg) => {
                error!("Internal error: {}", internal_msg);
                ErrorResponse::new("SERVICE_ERROR", "An internal server error occurred")
                    .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

/// Shared severity policy: client mistakes log at debug/warn, infrastructure
/// failures at error. Module error enums call this from their IntoResponse
/// impls so the taxonomy stays in one place.
pub fn log_for_status(status: StatusCode, code: &str, message: &str) {
    if status.is_server_error() {
        error!("{}: {}", code, message);
    } else if status == StatusCode::CONFLICT || status == StatusCode::FORBIDDEN {
        warn!("{}: {}", code, message);
    } else {
        debug!("{}: {}", code, message);
    }
}
