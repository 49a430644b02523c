// API-level tests for the mobile detailing booking service
// The full router runs over the in-memory store with a recording mailer,
// so every test is hermetic and deterministic.

use super::*;
use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

use crate::bookings::models::{
    Booking, BookingResponse, BookingStatus, PaymentStatus, PriceBreakdown, ServiceAddress,
    VehicleDetails,
};
use crate::bookings::CancellationOutcome;
use crate::models::{CustomerProfile, DetailingService, VehicleSize};
use crate::notifications::RecordingMailer;
use crate::slots::TimeSlot;
use crate::store::MemoryStore;

// ============================================================================
// Test Helpers
// ============================================================================

struct TestApp {
    server: TestServer,
    store: Arc<MemoryStore>,
    mailer: Arc<RecordingMailer>,
    customer_id: Uuid,
    slot_id: Uuid,
    valet_id: Uuid,
    wax_id: Uuid,
}

/// Standard fixture: two priced services, one customer, one open slot
/// three days out.
async fn test_app() -> TestApp {
    test_app_with_slot_at(Utc::now() + Duration::hours(72)).await
}

async fn test_app_with_slot_at(slot_starts_at: DateTime<Utc>) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let config = Arc::new(BookingConfig::default());
    let metrics = ServiceMetrics::new();
    let mailer = Arc::new(RecordingMailer::new());

    let customer_id = Uuid::new_v4();
    store
        .seed_profile(CustomerProfile {
            id: customer_id,
            full_name: "Jo Bloggs".to_string(),
            email: "jo@example.com".to_string(),
            phone: Some("07700900123".to_string()),
            created_at: Utc::now(),
        })
        .await;

    let mut ids = Vec::new();
    for (name, medium_price) in [("Full Valet", dec!(40.00)), ("Ceramic Wax", dec!(25.00))] {
        let service = DetailingService {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: Some(format!("{} package", name)),
            duration_minutes: Some(60),
            active: true,
            price_small: Some(dec!(20.00)),
            price_medium: Some(medium_price),
            price_large: Some(dec!(55.00)),
            price_extra_large: None,
            created_at: Utc::now(),
        };
        ids.push(service.id);
        store.seed_service(service).await;
    }

    let slot_id = Uuid::new_v4();
    let naive = slot_starts_at.naive_utc();
    store
        .seed_slot(TimeSlot {
            id: slot_id,
            slot_date: naive.date(),
            start_time: naive.time(),
            is_available: true,
            created_by: Some("admin".to_string()),
            notes: None,
            created_at: Utc::now(),
        })
        .await;

    // Offline-only distance resolution keeps quotes deterministic: BS
    // postcodes estimate at 6 km from the Bristol base.
    let resolver = Arc::new(DistanceResolver::offline_only(&config, metrics.clone()));
    let pricing = Arc::new(PricingEngine::new(store.clone(), resolver, config.clone()));
    let notifier = Notifier::new(mailer.clone(), config.clone(), metrics.clone());
    let slots = SlotService::new(store.clone(), store.clone());
    let bookings = BookingService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        pricing.clone(),
        notifier.clone(),
        config.clone(),
        metrics.clone(),
    );
    let scheduler = Arc::new(ReminderScheduler::new(
        store.clone(),
        store.clone(),
        notifier,
        config,
        metrics.clone(),
    ));

    let state = AppState {
        bookings,
        slots,
        pricing,
        catalog: store.clone(),
        scheduler,
        metrics,
    };
    let server = TestServer::new(create_router(state)).unwrap();

    TestApp {
        server,
        store,
        mailer,
        customer_id,
        slot_id,
        valet_id: ids[0],
        wax_id: ids[1],
    }
}

fn booking_payload(app: &TestApp) -> serde_json::Value {
    json!({
        "customer_id": app.customer_id,
        "time_slot_id": app.slot_id,
        "service_ids": [app.valet_id, app.wax_id],
        "vehicle": {
            "make": "Ford",
            "model": "Focus",
            "year": 2019,
            "size": "M"
        },
        "address": {
            "line1": "1 Harbour Way",
            "city": "Bristol",
            "postcode": "BS3 2LP"
        }
    })
}

/// A booking placed straight into the store, bypassing the HTTP surface.
fn seeded_booking(app: &TestApp, status: BookingStatus, scheduled: NaiveDateTime) -> Booking {
    let now = Utc::now();
    Booking {
        id: Uuid::new_v4(),
        reference: format!("MVD-{}-SEED", now.timestamp_millis()),
        customer_id: app.customer_id,
        time_slot_id: app.slot_id,
        vehicle: VehicleDetails {
            make: "Audi".to_string(),
            model: "A3".to_string(),
            year: None,
            colour: None,
            size: VehicleSize::Medium,
        },
        address: ServiceAddress {
            line1: "1 Harbour Way".to_string(),
            city: None,
            postcode: "BS3 2LP".to_string(),
        },
        scheduled_date: scheduled.date(),
        start_time: scheduled.time(),
        end_time: scheduled.time() + Duration::hours(2),
        status,
        payment_status: PaymentStatus::Unpaid,
        pricing: PriceBreakdown {
            base_subtotal: dec!(65.00),
            distance_surcharge: dec!(10.50),
            total: dec!(75.50),
            distance_km: Some(dec!(12)),
        },
        special_instructions: None,
        cancellation_reason: None,
        confirmed_at: None,
        cancelled_at: None,
        completed_at: None,
        reminder_count: 0,
        last_reminder_at: None,
        created_at: now,
        updated_at: now,
    }
}

// ============================================================================
// Health and Catalogue
// ============================================================================

#[tokio::test]
async fn test_health_reports_ok() {
    let app = test_app().await;

    let response = app.server.get("/api/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "detailing-api");
}

#[tokio::test]
async fn test_services_lists_active_catalogue() {
    let app = test_app().await;

    let response = app.server.get("/api/services").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let services: Vec<DetailingService> = response.json();
    assert_eq!(services.len(), 2);
    let names: Vec<&str> = services.iter().map(|s| s.name.as_str()).collect();
    assert!(names.contains(&"Full Valet"));
    assert!(names.contains(&"Ceramic Wax"));
}

// ============================================================================
// Quotes (POST /api/quotes)
// ============================================================================

/// Two services on a medium vehicle 12 km out: 40 + 25 base, 7 chargeable
/// km at 1.50 applied once across the visit.
#[tokio::test]
async fn test_quote_worked_example() {
    let app = test_app().await;

    let response = app
        .server
        .post("/api/quotes")
        .json(&json!({
            "service_ids": [app.valet_id, app.wax_id],
            "vehicle_size": "M",
            "distance_km": 12
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert_eq!(body["breakdown"]["base_subtotal"], "65.00");
    assert_eq!(body["breakdown"]["distance_surcharge"], "10.50");
    assert_eq!(body["breakdown"]["total"], "75.50");

    // Line order follows the request.
    assert_eq!(body["services"][0]["service_name"], "Full Valet");
    assert_eq!(body["services"][1]["service_name"], "Ceramic Wax");
    // No postcode, no resolver involvement.
    assert!(body["distance"].is_null());
}

#[tokio::test]
async fn test_quote_unknown_service_is_not_found() {
    let app = test_app().await;

    let response = app
        .server
        .post("/api/quotes")
        .json(&json!({
            "service_ids": [Uuid::new_v4()],
            "vehicle_size": "M"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let body: serde_json::Value = response.json();
    assert_eq!(body["error_code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_quote_requires_at_least_one_service() {
    let app = test_app().await;

    let response = app
        .server
        .post("/api/quotes")
        .json(&json!({
            "service_ids": [],
            "vehicle_size": "M"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json();
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
}

// ============================================================================
// Booking Creation (POST /api/bookings)
// ============================================================================

/// Full happy path: priced via the offline estimate (BS area, 6 km, so a
/// 1.50 surcharge on the 65.00 base), slot taken, emails out.
#[tokio::test]
async fn test_create_booking_success() {
    let app = test_app().await;

    let response = app
        .server
        .post("/api/bookings")
        .json(&booking_payload(&app))
        .await;

    let status = response.status_code();
    if status != StatusCode::CREATED {
        let body = response.text();
        eprintln!("Response status: {}", status);
        eprintln!("Response body: {}", body);
        panic!("Expected 201 CREATED, got {}", status);
    }

    let booking: BookingResponse = response.json();
    assert!(booking.reference.starts_with("MVD-"));
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.payment_status, PaymentStatus::Unpaid);
    assert_eq!(booking.services.len(), 2);
    assert_eq!(booking.pricing.base_subtotal, dec!(65.00));
    assert_eq!(booking.pricing.distance_surcharge, dec!(1.50));
    assert_eq!(booking.pricing.total, dec!(66.50));

    // Slot is flagged as taken.
    let slot = app.store.slot_by_id(app.slot_id).await.unwrap().unwrap();
    assert!(!slot.is_available);

    // Customer confirmation plus admin alert.
    assert_eq!(app.mailer.sent().await.len(), 2);

    // The booking reads back by id.
    let response = app
        .server
        .get(&format!("/api/bookings/{}", booking.id))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let fetched: BookingResponse = response.json();
    assert_eq!(fetched.reference, booking.reference);

    let metrics: serde_json::Value = app.server.get("/api/admin/metrics").await.json();
    assert_eq!(metrics["bookings_created"], 1);
}

#[tokio::test]
async fn test_create_booking_validation() {
    let app = test_app().await;

    let mut payload = booking_payload(&app);
    payload["service_ids"] = json!([]);
    let response = app.server.post("/api/bookings").json(&payload).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error_code"], "VALIDATION_ERROR");

    let mut payload = booking_payload(&app);
    payload["address"]["postcode"] = json!("not a postcode");
    let response = app.server.post("/api/bookings").json(&payload).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

/// The availability flag can lag: a live booking blocks the slot even while
/// the flag still reads open.
#[tokio::test]
async fn test_create_booking_slot_already_booked() {
    let app = test_app().await;
    let squatter = seeded_booking(
        &app,
        BookingStatus::Pending,
        Utc::now().naive_utc() + Duration::hours(72),
    );
    app.store.seed_booking(squatter).await;

    let response = app
        .server
        .post("/api/bookings")
        .json(&booking_payload(&app))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    let body: serde_json::Value = response.json();
    assert_eq!(body["error_code"], "SLOT_ALREADY_BOOKED");
}

#[tokio::test]
async fn test_create_booking_unavailable_slot() {
    let app = test_app().await;

    let first = app
        .server
        .post("/api/bookings")
        .json(&booking_payload(&app))
        .await;
    assert_eq!(first.status_code(), StatusCode::CREATED);

    let second = app
        .server
        .post("/api/bookings")
        .json(&booking_payload(&app))
        .await;
    assert_eq!(second.status_code(), StatusCode::CONFLICT);

    let body: serde_json::Value = second.json();
    assert_eq!(body["error_code"], "SLOT_UNAVAILABLE");
}

/// A line item write failure must not leave a half-written booking behind.
#[tokio::test]
async fn test_create_booking_rolls_back_on_line_item_failure() {
    let app = test_app().await;
    app.store.fail_next_line_item_insert().await;

    let response = app
        .server
        .post("/api/bookings")
        .json(&booking_payload(&app))
        .await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = app
        .server
        .get(&format!("/api/customers/{}/bookings", app.customer_id))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let bookings: Vec<BookingResponse> = response.json();
    assert!(bookings.is_empty(), "rolled-back booking should not read back");
}

// ============================================================================
// Booking Lifecycle (PATCH /api/bookings/:id/status)
// ============================================================================

#[tokio::test]
async fn test_status_flow_with_history() {
    let app = test_app().await;
    let booking: BookingResponse = app
        .server
        .post("/api/bookings")
        .json(&booking_payload(&app))
        .await
        .json();

    let response = app
        .server
        .patch(&format!("/api/bookings/{}/status", booking.id))
        .json(&json!({"status": "processing", "actor": "admin"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let updated: BookingResponse = response.json();
    assert_eq!(updated.status, BookingStatus::Processing);

    let response = app
        .server
        .get(&format!("/api/bookings/{}/history", booking.id))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let history: serde_json::Value = response.json();
    let rows = history.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows[0]["from_status"].is_null());
    assert_eq!(rows[0]["to_status"], "pending");
    assert_eq!(rows[1]["from_status"], "pending");
    assert_eq!(rows[1]["to_status"], "processing");
    assert_eq!(rows[1]["actor"], "admin");
}

#[tokio::test]
async fn test_invalid_transition_rejected() {
    let app = test_app().await;
    let booking: BookingResponse = app
        .server
        .post("/api/bookings")
        .json(&booking_payload(&app))
        .await
        .json();

    // pending cannot jump straight to completed
    let response = app
        .server
        .patch(&format!("/api/bookings/{}/status", booking.id))
        .json(&json!({"status": "completed"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json();
    assert_eq!(body["error_code"], "INVALID_TRANSITION");
    assert_eq!(body["details"]["from"], "pending");
    assert_eq!(body["details"]["to"], "completed");
}

#[tokio::test]
async fn test_payment_confirm_promotes_processing_booking() {
    let app = test_app().await;
    let booking: BookingResponse = app
        .server
        .post("/api/bookings")
        .json(&booking_payload(&app))
        .await
        .json();
    app.server
        .patch(&format!("/api/bookings/{}/status", booking.id))
        .json(&json!({"status": "processing"}))
        .await
        .assert_status(StatusCode::OK);

    let response = app
        .server
        .post(&format!("/api/bookings/{}/payment/confirm", booking.id))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let paid: BookingResponse = response.json();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.status, BookingStatus::Confirmed);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancellation_policy_tiers() {
    let app = test_app().await;
    let now = Utc::now().naive_utc();

    let outside = seeded_booking(&app, BookingStatus::Confirmed, now + Duration::hours(25));
    let inside = seeded_booking(&app, BookingStatus::Confirmed, now + Duration::hours(10));
    let past = seeded_booking(&app, BookingStatus::Confirmed, now - Duration::hours(2));
    app.store.seed_booking(outside.clone()).await;
    app.store.seed_booking(inside.clone()).await;
    app.store.seed_booking(past.clone()).await;

    let policy: serde_json::Value = app
        .server
        .get(&format!("/api/bookings/{}/cancellation-policy", outside.id))
        .await
        .json();
    assert_eq!(policy["can_cancel"], true);
    assert_eq!(policy["is_within_24_hours"], false);
    assert_eq!(policy["refund_eligible"], true);

    let policy: serde_json::Value = app
        .server
        .get(&format!("/api/bookings/{}/cancellation-policy", inside.id))
        .await
        .json();
    assert_eq!(policy["can_cancel"], true);
    assert_eq!(policy["is_within_24_hours"], true);
    assert_eq!(policy["refund_eligible"], false);

    let policy: serde_json::Value = app
        .server
        .get(&format!("/api/bookings/{}/cancellation-policy", past.id))
        .await
        .json();
    assert_eq!(policy["can_cancel"], false);
}

#[tokio::test]
async fn test_cancel_inside_window_needs_acknowledgment() {
    let app = test_app_with_slot_at(Utc::now() + Duration::hours(10)).await;
    let booking: BookingResponse = app
        .server
        .post("/api/bookings")
        .json(&booking_payload(&app))
        .await
        .json();

    let response = app
        .server
        .post(&format!("/api/bookings/{}/cancel", booking.id))
        .json(&json!({"customer_id": app.customer_id}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error_code"], "ACKNOWLEDGMENT_REQUIRED");
    assert_eq!(body["details"]["refund_eligible"], false);

    let response = app
        .server
        .post(&format!("/api/bookings/{}/cancel", booking.id))
        .json(&json!({
            "customer_id": app.customer_id,
            "reason": "plans changed",
            "acknowledged_no_refund": true
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let outcome: CancellationOutcome = response.json();
    assert_eq!(outcome.booking.status, BookingStatus::Cancelled);
    assert_eq!(outcome.refund_amount, Decimal::ZERO);
    assert!(outcome.slot_released);
    assert!(outcome.email_sent);

    // The freed slot is bookable again.
    let response = app.server.get("/api/slots").await;
    let slots: Vec<TimeSlot> = response.json();
    assert!(slots.iter().any(|s| s.id == app.slot_id));
}

#[tokio::test]
async fn test_refund_eligible_cancellation_refunds_paid_booking() {
    let app = test_app().await;
    let booking: BookingResponse = app
        .server
        .post("/api/bookings")
        .json(&booking_payload(&app))
        .await
        .json();
    app.server
        .post(&format!("/api/bookings/{}/payment/confirm", booking.id))
        .await
        .assert_status(StatusCode::OK);

    let response = app
        .server
        .post(&format!("/api/bookings/{}/cancel", booking.id))
        .json(&json!({"customer_id": app.customer_id}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let outcome: CancellationOutcome = response.json();
    assert!(outcome.policy.refund_eligible);
    assert_eq!(outcome.refund_amount, booking.pricing.total);
    assert_eq!(outcome.booking.payment_status, PaymentStatus::Refunded);
}

#[tokio::test]
async fn test_cancel_is_scoped_to_owner() {
    let app = test_app().await;
    let booking: BookingResponse = app
        .server
        .post("/api/bookings")
        .json(&booking_payload(&app))
        .await
        .json();

    let response = app
        .server
        .post(&format!("/api/bookings/{}/cancel", booking.id))
        .json(&json!({"customer_id": Uuid::new_v4(), "acknowledged_no_refund": true}))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let body: serde_json::Value = response.json();
    assert_eq!(body["error_code"], "ACCESS_DENIED");
}

#[tokio::test]
async fn test_admin_cancel_takes_explicit_refund() {
    let app = test_app_with_slot_at(Utc::now() + Duration::hours(3)).await;
    let booking: BookingResponse = app
        .server
        .post("/api/bookings")
        .json(&booking_payload(&app))
        .await
        .json();
    app.server
        .post(&format!("/api/bookings/{}/payment/confirm", booking.id))
        .await
        .assert_status(StatusCode::OK);

    // Inside the window and past the ack gate: admin cancels anyway.
    let response = app
        .server
        .post(&format!("/api/admin/bookings/{}/cancel", booking.id))
        .json(&json!({
            "reason": "van breakdown",
            "refund_amount": "30.00",
            "actor": "ops"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let outcome: CancellationOutcome = response.json();
    assert_eq!(outcome.refund_amount, dec!(30.00));
    assert_eq!(outcome.booking.payment_status, PaymentStatus::Refunded);

    // A second attempt refuses: the booking is closed.
    let response = app
        .server
        .post(&format!("/api/admin/bookings/{}/cancel", booking.id))
        .json(&json!({"reason": "again"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error_code"], "CANNOT_CANCEL");
}

// ============================================================================
// Slot Administration
// ============================================================================

#[tokio::test]
async fn test_slot_create_duplicate_and_past_rejection() {
    let app = test_app().await;
    let tomorrow = (Utc::now() + Duration::days(1)).date_naive();

    let response = app
        .server
        .post("/api/admin/slots")
        .json(&json!({"slot_date": tomorrow, "start_time": "10:00:00"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let response = app
        .server
        .post("/api/admin/slots")
        .json(&json!({"slot_date": tomorrow, "start_time": "10:00:00"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error_code"], "DUPLICATE_SLOT");

    let last_week = (Utc::now() - Duration::days(7)).date_naive();
    let response = app
        .server
        .post("/api/admin/slots")
        .json(&json!({"slot_date": last_week, "start_time": "10:00:00"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error_code"], "SLOT_IN_PAST");
}

#[tokio::test]
async fn test_bulk_slot_creation_reports_skips() {
    let app = test_app().await;
    let tomorrow = (Utc::now() + Duration::days(1)).date_naive();
    let last_week = (Utc::now() - Duration::days(7)).date_naive();

    let response = app
        .server
        .post("/api/admin/slots/bulk")
        .json(&json!({"slots": [
            {"slot_date": tomorrow, "start_time": "09:00:00"},
            {"slot_date": tomorrow, "start_time": "09:00:00"},
            {"slot_date": last_week, "start_time": "09:00:00"}
        ]}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert_eq!(body["created"].as_array().unwrap().len(), 1);
    assert_eq!(body["skipped"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_slot_listing_hides_booked_slots() {
    let app = test_app().await;

    let before: Vec<TimeSlot> = app.server.get("/api/slots").await.json();
    assert!(before.iter().any(|s| s.id == app.slot_id));

    app.server
        .post("/api/bookings")
        .json(&booking_payload(&app))
        .await
        .assert_status(StatusCode::CREATED);

    let after: Vec<TimeSlot> = app.server.get("/api/slots").await.json();
    assert!(!after.iter().any(|s| s.id == app.slot_id));
}

// ============================================================================
// Payment Reminders
// ============================================================================

/// Overdue view and a manual sweep: a processing booking 32 hours past the
/// 48-hour deadline earns one gentle reminder, and only one.
#[tokio::test]
async fn test_overdue_view_and_reminder_sweep() {
    let app = test_app().await;
    let mut overdue = seeded_booking(
        &app,
        BookingStatus::Processing,
        Utc::now().naive_utc() + Duration::hours(48),
    );
    overdue.created_at = Utc::now() - Duration::hours(80);
    app.store.seed_booking(overdue.clone()).await;

    let view: serde_json::Value = app.server.get("/api/admin/payments/overdue").await.json();
    let entries = view.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["tier"], "gentle");
    assert!(entries[0]["payment_link"]["url"]
        .as_str()
        .unwrap()
        .contains("paypal.me/mobilevaletdetail"));

    let summary: serde_json::Value = app.server.post("/api/admin/reminders/run").await.json();
    assert_eq!(summary["processed"], 1);
    assert_eq!(summary["sent"], 1);

    let stored = app.store.booking_by_id(overdue.id).await.unwrap().unwrap();
    assert_eq!(stored.reminder_count, 1);
    let sent = app.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subject.contains("(gentle)"));

    // The tier is already claimed; a second sweep sends nothing.
    let summary: serde_json::Value = app.server.post("/api/admin/reminders/run").await.json();
    assert_eq!(summary["sent"], 0);
}
