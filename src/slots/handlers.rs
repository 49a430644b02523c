// HTTP handlers for slot administration and availability

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::slots::{
    BulkCreateSlotsRequest, BulkSlotOutcome, CreateSlotRequest, SlotError, SlotQuery, TimeSlot,
};

/// Handler for POST /api/admin/slots
/// Creates a single appointment slot
#[utoipa::path(
    post,
    path = "/api/admin/slots",
    request_body = CreateSlotRequest,
    responses(
        (status = 201, description = "Slot created", body = TimeSlot),
        (status = 400, description = "Slot date and time are in the past"),
        (status = 409, description = "A slot already exists at that date and time")
    ),
    tag = "slots"
)]
pub async fn create_slot_handler(
    State(state): State<crate::AppState>,
    Json(request): Json<CreateSlotRequest>,
) -> Result<(StatusCode, Json<TimeSlot>), SlotError> {
    request
        .validate()
        .map_err(|e| SlotError::ValidationError(e.to_string()))?;

    let slot = state.slots.create_slot(request).await?;
    Ok((StatusCode::CREATED, Json(slot)))
}

/// Handler for POST /api/admin/slots/bulk
/// Creates a batch of slots, skipping past and duplicate entries
#[utoipa::path(
    post,
    path = "/api/admin/slots/bulk",
    request_body = BulkCreateSlotsRequest,
    responses(
        (status = 200, description = "Batch processed; skipped entries carry reasons", body = BulkSlotOutcome),
        (status = 400, description = "Batch empty or over the size limit")
    ),
    tag = "slots"
)]
pub async fn bulk_create_slots_handler(
    State(state): State<crate::AppState>,
    Json(request): Json<BulkCreateSlotsRequest>,
) -> Result<Json<BulkSlotOutcome>, SlotError> {
    request
        .validate()
        .map_err(|e| SlotError::ValidationError(e.to_string()))?;

    let outcome = state.slots.create_slots_bulk(request.slots).await?;
    Ok(Json(outcome))
}

/// Handler for GET /api/slots
/// Lists open slots, optionally bounded by a date window
#[utoipa::path(
    get,
    path = "/api/slots",
    params(
        ("from" = Option<String>, Query, description = "First date to include (YYYY-MM-DD), defaults to today"),
        ("to" = Option<String>, Query, description = "Last date to include (YYYY-MM-DD)")
    ),
    responses(
        (status = 200, description = "Open slots ordered by date and start time", body = Vec<TimeSlot>)
    ),
    tag = "slots"
)]
pub async fn list_slots_handler(
    State(state): State<crate::AppState>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Vec<TimeSlot>>, SlotError> {
    let slots = state.slots.list_available(query.from, query.to).await?;
    Ok(Json(slots))
}
