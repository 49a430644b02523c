use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use uuid::Uuid;

use crate::bookings::models::BookingStatus;
use crate::error::{log_for_status, ErrorResponse};
use crate::pricing::PricingError;
use crate::store::StoreError;

/// Error types for booking operations
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Booking {0} not found")]
    NotFound(Uuid),

    #[error("Time slot {0} is not available")]
    SlotUnavailable(Uuid),

    #[error("Time slot {0} already has a live booking")]
    SlotAlreadyBooked(Uuid),

    #[error("Booking {0} does not belong to the requesting customer")]
    AccessDenied(Uuid),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("Cancellation inside the no-refund window requires acknowledgment")]
    AcknowledgmentRequired { hours_until_appointment: i64 },

    #[error("Booking cannot be cancelled: {0}")]
    CannotCancel(String),

    #[error("Booking {0} was partially written and could not be cleaned up")]
    PartialWriteFailure(Uuid),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let log_detail = self.to_string();
        let (status, code, message, details) = match self {
            BookingError::ValidationError(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg, None)
            }
            BookingError::NotFound(id) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Booking with id {} not found", id),
                None,
            ),
            BookingError::SlotUnavailable(id) => (
                StatusCode::CONFLICT,
                "SLOT_UNAVAILABLE",
                format!("Time slot {} is not available for booking", id),
                None,
            ),
            BookingError::SlotAlreadyBooked(id) => (
                StatusCode::CONFLICT,
                "SLOT_ALREADY_BOOKED",
                format!("Time slot {} has just been taken by another booking", id),
                None,
            ),
            BookingError::AccessDenied(id) => (
                StatusCode::FORBIDDEN,
                "ACCESS_DENIED",
                format!("Booking {} belongs to a different customer", id),
                None,
            ),
            BookingError::InvalidTransition { from, to } => (
                StatusCode::BAD_REQUEST,
                "INVALID_TRANSITION",
                format!("Cannot move a booking from {} to {}", from, to),
                Some(json!({ "from": from, "to": to })),
            ),
            BookingError::AcknowledgmentRequired {
                hours_until_appointment,
            } => (
                StatusCode::CONFLICT,
                "ACKNOWLEDGMENT_REQUIRED",
                "Cancelling this close to the appointment forfeits the refund; \
                 resubmit with acknowledged_no_refund to proceed"
                    .to_string(),
                Some(json!({
                    "hours_until_appointment": hours_until_appointment,
                    "refund_eligible": false,
                })),
            ),
            BookingError::CannotCancel(reason) => {
                (StatusCode::CONFLICT, "CANNOT_CANCEL", reason, None)
            }
            BookingError::PartialWriteFailure(id) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PARTIAL_WRITE_FAILURE",
                "The booking could not be fully saved; please contact support".to_string(),
                Some(json!({ "booking_id": id })),
            ),
            // Pricing errors already carry their own envelope mapping.
            BookingError::Pricing(inner) => return inner.into_response(),
            BookingError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "UPSTREAM_UNAVAILABLE",
                "A storage error occurred".to_string(),
                None,
            ),
            BookingError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SERVICE_ERROR",
                "An internal server error occurred".to_string(),
                None,
            ),
        };

        log_for_status(status, code, &log_detail);
        let mut response = ErrorResponse::new(code, message);
        if let Some(details) = details {
            response = response.with_details(details);
        }
        response.into_response_with(status)
    }
}
