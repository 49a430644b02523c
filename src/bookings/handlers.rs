// HTTP handlers for the booking lifecycle

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::bookings::cancellation::{CancellationOutcome, CancellationPolicyCheck};
use crate::bookings::error::BookingError;
use crate::bookings::models::{
    AdminCancelRequest, BookingResponse, BookingStatus, CancelBookingRequest,
    CreateBookingRequest, StatusHistoryEntry, UpdateStatusRequest,
};

#[derive(Debug, Deserialize)]
pub struct BookingFetchQuery {
    /// When present, the fetch is scoped: another customer's booking answers
    /// 403 rather than leaking.
    pub customer_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct BookingListQuery {
    pub status: Option<BookingStatus>,
}

/// Handler for POST /api/bookings
/// Prices the visit, takes the slot and queues the confirmation email
#[utoipa::path(
    post,
    path = "/api/bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booking created", body = BookingResponse),
        (status = 400, description = "Validation or pricing failure"),
        (status = 409, description = "Slot already taken by another booking")
    ),
    tag = "bookings"
)]
pub async fn create_booking_handler(
    State(state): State<crate::AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), BookingError> {
    request
        .validate()
        .map_err(|e| BookingError::ValidationError(e.to_string()))?;

    let booking = state.bookings.create_booking(request).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// Handler for GET /api/bookings/:id
#[utoipa::path(
    get,
    path = "/api/bookings/{id}",
    params(
        ("id" = Uuid, Path, description = "Booking id"),
        ("customer_id" = Option<Uuid>, Query, description = "Scope the fetch to this customer")
    ),
    responses(
        (status = 200, description = "Booking with its line items", body = BookingResponse),
        (status = 403, description = "Booking belongs to another customer"),
        (status = 404, description = "No such booking")
    ),
    tag = "bookings"
)]
pub async fn get_booking_handler(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<BookingFetchQuery>,
) -> Result<Json<BookingResponse>, BookingError> {
    let booking = match query.customer_id {
        Some(customer_id) => {
            state
                .bookings
                .get_booking_for_customer(id, customer_id)
                .await?
        }
        None => state.bookings.get_booking(id).await?,
    };
    Ok(Json(booking))
}

/// Handler for GET /api/customers/:customer_id/bookings
/// Lists a customer's bookings newest first
#[utoipa::path(
    get,
    path = "/api/customers/{customer_id}/bookings",
    params(
        ("customer_id" = Uuid, Path, description = "Customer id"),
        ("status" = Option<String>, Query, description = "Filter to one booking status")
    ),
    responses(
        (status = 200, description = "The customer's bookings", body = Vec<BookingResponse>)
    ),
    tag = "bookings"
)]
pub async fn customer_bookings_handler(
    State(state): State<crate::AppState>,
    Path(customer_id): Path<Uuid>,
    Query(query): Query<BookingListQuery>,
) -> Result<Json<Vec<BookingResponse>>, BookingError> {
    let bookings = state
        .bookings
        .bookings_for_customer(customer_id, query.status)
        .await?;
    Ok(Json(bookings))
}

/// Handler for GET /api/bookings/:id/history
pub async fn booking_history_handler(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StatusHistoryEntry>>, BookingError> {
    let history = state.bookings.booking_history(id).await?;
    Ok(Json(history))
}

/// Handler for GET /api/bookings/:id/cancellation-policy
/// What cancelling right now would mean, without doing it
#[utoipa::path(
    get,
    path = "/api/bookings/{id}/cancellation-policy",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Policy position for this booking", body = CancellationPolicyCheck),
        (status = 404, description = "No such booking")
    ),
    tag = "bookings"
)]
pub async fn cancellation_policy_handler(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CancellationPolicyCheck>, BookingError> {
    let policy = state.bookings.cancellation_policy(id).await?;
    Ok(Json(policy))
}

/// Handler for POST /api/bookings/:id/cancel
/// Customer cancellation, gated by the refund policy
#[utoipa::path(
    post,
    path = "/api/bookings/{id}/cancel",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = CancelBookingRequest,
    responses(
        (status = 200, description = "Booking cancelled; the body carries the refund position"),
        (status = 403, description = "Booking belongs to another customer"),
        (status = 409, description = "Acknowledgment required or booking not cancellable")
    ),
    tag = "bookings"
)]
pub async fn cancel_booking_handler(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelBookingRequest>,
) -> Result<Json<CancellationOutcome>, BookingError> {
    request
        .validate()
        .map_err(|e| BookingError::ValidationError(e.to_string()))?;

    let outcome = state.bookings.cancel_booking(id, request).await?;
    Ok(Json(outcome))
}

/// Handler for PATCH /api/bookings/:id/status
pub async fn update_status_handler(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<BookingResponse>, BookingError> {
    request
        .validate()
        .map_err(|e| BookingError::ValidationError(e.to_string()))?;

    let booking = state.bookings.update_status(id, request).await?;
    Ok(Json(booking))
}

/// Handler for POST /api/admin/bookings/:id/cancel
pub async fn admin_cancel_handler(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AdminCancelRequest>,
) -> Result<Json<CancellationOutcome>, BookingError> {
    request
        .validate()
        .map_err(|e| BookingError::ValidationError(e.to_string()))?;

    let outcome = state.bookings.admin_cancel(id, request).await?;
    Ok(Json(outcome))
}

/// Handler for POST /api/bookings/:id/payment/confirm
/// Records a verified PayPal payment against the booking
#[utoipa::path(
    post,
    path = "/api/bookings/{id}/payment/confirm",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Payment recorded; a processing booking confirms", body = BookingResponse),
        (status = 404, description = "No such booking")
    ),
    tag = "bookings"
)]
pub async fn confirm_payment_handler(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingResponse>, BookingError> {
    let booking = state.bookings.mark_paid(id).await?;
    Ok(Json(booking))
}
