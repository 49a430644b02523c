use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::error::{log_for_status, ErrorResponse};
use crate::models::VehicleSize;
use crate::store::StoreError;

/// Error types for pricing and distance resolution
#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Service not found: {0}")]
    ServiceNotFound(Uuid),

    #[error("No price configured for service {service_id} at vehicle size {tier}")]
    NotConfigured { service_id: Uuid, tier: VehicleSize },

    #[error("Travel distance could not be resolved: all providers failed")]
    DistanceUnavailable,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for PricingError {
    fn into_response(self) -> Response {
        let log_detail = self.to_string();
        let (status, code, message) = match self {
            PricingError::ValidationError(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg)
            }
            PricingError::ServiceNotFound(id) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Service with id {} not found", id),
            ),
            PricingError::NotConfigured { service_id, tier } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "PRICING_NOT_CONFIGURED",
                format!(
                    "Service {} has no price configured for vehicle size {}",
                    service_id, tier
                ),
            ),
            PricingError::DistanceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "UPSTREAM_UNAVAILABLE",
                "Travel distance is temporarily unavailable, please try again".to_string(),
            ),
            PricingError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "UPSTREAM_UNAVAILABLE",
                "A storage error occurred".to_string(),
            ),
        };

        log_for_status(status, code, &log_detail);
        ErrorResponse::new(code, message).into_response_with(status)
    }
}
