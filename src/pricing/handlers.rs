// HTTP handler for price quotes

use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::bookings::models::PriceBreakdown;
use crate::models::VehicleSize;
use crate::pricing::engine::PriceCalculation;
use crate::pricing::error::PricingError;

/// Request body for POST /api/quotes. Either a postcode (resolved to a road
/// distance) or an explicit distance may be supplied; with neither, the
/// quote covers base prices only.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct QuoteRequest {
    #[validate(length(min = 1, message = "At least one service is required"))]
    pub service_ids: Vec<Uuid>,
    pub vehicle_size: VehicleSize,
    #[validate(custom = "crate::validation::validate_uk_postcode")]
    #[schema(example = "BS8 1TH")]
    pub postcode: Option<String>,
    #[validate(custom = "crate::validation::validate_non_negative_amount")]
    pub distance_km: Option<Decimal>,
}

/// How the travel distance for a quote was obtained.
#[derive(Debug, Serialize, ToSchema)]
pub struct DistanceQuote {
    pub distance_km: Decimal,
    pub duration_minutes: i64,
    #[schema(example = "osrm")]
    pub provider: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QuoteResponse {
    pub vehicle_size: VehicleSize,
    pub services: Vec<PriceCalculation>,
    /// Totals the way a booking would store them, with the travel
    /// surcharge counted once.
    pub breakdown: PriceBreakdown,
    pub distance: Option<DistanceQuote>,
}

/// Handler for POST /api/quotes
/// Prices a basket of services for a vehicle size without creating a booking.
#[utoipa::path(
    post,
    path = "/api/quotes",
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Quote calculated", body = QuoteResponse),
        (status = 404, description = "A requested service does not exist"),
        (status = 422, description = "No price configured for the vehicle size"),
        (status = 503, description = "Distance could not be resolved")
    ),
    tag = "pricing"
)]
pub async fn quote_handler(
    State(state): State<crate::AppState>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<QuoteResponse>, PricingError> {
    request
        .validate()
        .map_err(|e| PricingError::ValidationError(e.to_string()))?;

    let engine = &state.pricing;
    let (services, distance_km, distance) = match request.postcode.as_deref() {
        Some(postcode) => {
            let (calculations, resolved) = engine
                .quote_for_postcode(&request.service_ids, request.vehicle_size, postcode)
                .await?;
            (
                calculations,
                Some(resolved.distance_km),
                Some(DistanceQuote {
                    distance_km: resolved.distance_km,
                    duration_minutes: resolved.duration_minutes,
                    provider: resolved.provider.to_string(),
                }),
            )
        }
        None => {
            let calculations = engine
                .quote_services(&request.service_ids, request.vehicle_size, request.distance_km)
                .await?;
            (calculations, request.distance_km, None)
        }
    };

    let breakdown = engine.breakdown(&services, distance_km);
    Ok(Json(QuoteResponse {
        vehicle_size: request.vehicle_size,
        services,
        breakdown,
        distance,
    }))
}
