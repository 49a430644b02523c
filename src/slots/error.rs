use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use crate::error::{log_for_status, ErrorResponse};
use crate::store::StoreError;

/// Error types for slot administration
#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Slot {date} {start} is in the past")]
    SlotInPast { date: NaiveDate, start: NaiveTime },

    #[error("A slot already exists at {date} {start}")]
    DuplicateSlot { date: NaiveDate, start: NaiveTime },

    #[error("Time slot {0} not found")]
    NotFound(Uuid),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for SlotError {
    fn into_response(self) -> Response {
        let log_detail = self.to_string();
        let (status, code, message) = match self {
            SlotError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            SlotError::SlotInPast { date, start } => (
                StatusCode::BAD_REQUEST,
                "SLOT_IN_PAST",
                format!("Cannot create a slot in the past ({} {})", date, start),
            ),
            SlotError::DuplicateSlot { date, start } => (
                StatusCode::CONFLICT,
                "DUPLICATE_SLOT",
                format!("A slot already exists at {} {}", date, start),
            ),
            SlotError::NotFound(id) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Time slot with id {} not found", id),
            ),
            SlotError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "UPSTREAM_UNAVAILABLE",
                "A storage error occurred".to_string(),
            ),
        };

        log_for_status(status, code, &log_detail);
        ErrorResponse::new(code, message).into_response_with(status)
    }
}
