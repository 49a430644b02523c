mod bookings;
mod config;
mod db;
mod error;
mod metrics;
mod models;
mod notifications;
mod payments;
mod pricing;
mod slots;
mod store;
mod validation;

use std::sync::Arc;

use axum::{
    extract::State,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use bookings::{
    admin_cancel_handler, booking_history_handler, cancel_booking_handler,
    cancellation_policy_handler, confirm_payment_handler, create_booking_handler,
    customer_bookings_handler, get_booking_handler, update_status_handler, BookingService,
};
use config::BookingConfig;
use error::ApiError;
use metrics::{MetricsSummary, ServiceMetrics};
use models::DetailingService;
use notifications::{LogMailer, Mailer, Notifier};
use payments::{OverduePayment, ReminderRunSummary, ReminderScheduler};
use pricing::{quote_handler, DistanceResolver, PricingEngine};
use slots::{bulk_create_slots_handler, create_slot_handler, list_slots_handler, SlotService};
use store::{BookingStore, CatalogStore, CustomerStore, PgStore, SlotStore};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        list_services,
        pricing::handlers::quote_handler,
        slots::handlers::create_slot_handler,
        slots::handlers::bulk_create_slots_handler,
        slots::handlers::list_slots_handler,
        bookings::handlers::create_booking_handler,
        bookings::handlers::get_booking_handler,
        bookings::handlers::customer_bookings_handler,
        bookings::handlers::cancellation_policy_handler,
        bookings::handlers::cancel_booking_handler,
        bookings::handlers::confirm_payment_handler,
    ),
    components(schemas(
        models::DetailingService,
        models::VehicleSize,
        bookings::models::BookingResponse,
        bookings::models::CreateBookingRequest,
        bookings::models::CancelBookingRequest,
        bookings::models::UpdateStatusRequest,
        bookings::models::AdminCancelRequest,
        bookings::models::BookingStatus,
        bookings::models::PaymentStatus,
        bookings::models::VehicleDetails,
        bookings::models::ServiceAddress,
        bookings::models::PriceBreakdown,
        bookings::models::BookingServiceItem,
        bookings::cancellation::CancellationPolicyCheck,
        slots::models::TimeSlot,
        slots::models::CreateSlotRequest,
        slots::models::BulkCreateSlotsRequest,
        slots::models::SkippedSlot,
        slots::models::BulkSlotOutcome,
        pricing::handlers::QuoteRequest,
        pricing::handlers::QuoteResponse,
        pricing::handlers::DistanceQuote,
        pricing::engine::PriceCalculation,
    )),
    tags(
        (name = "bookings", description = "Booking lifecycle endpoints"),
        (name = "slots", description = "Appointment slot management"),
        (name = "pricing", description = "Quotes and travel surcharges"),
        (name = "services", description = "Detailing service catalogue")
    ),
    info(
        title = "Mobile Detailing API",
        version = "1.0.0",
        description = "RESTful API for a mobile vehicle detailing booking platform",
        contact(
            name = "API Support",
            email = "support@mobilevaletdetail.co.uk"
        )
    )
)]
struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    bookings: BookingService,
    slots: SlotService,
    pricing: Arc<PricingEngine>,
    catalog: Arc<dyn CatalogStore>,
    scheduler: Arc<ReminderScheduler>,
    metrics: ServiceMetrics,
}

impl AppState {
    /// Production wiring over a single store backend: the full distance
    /// provider chain and the logging mailer. Tests assemble the struct
    /// directly with their own doubles.
    fn build<S>(store: Arc<S>, config: Arc<BookingConfig>) -> Self
    where
        S: CatalogStore + SlotStore + BookingStore + CustomerStore + 'static,
    {
        let metrics = ServiceMetrics::new();
        let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);
        let resolver = Arc::new(DistanceResolver::from_config(&config, metrics.clone()));
        let pricing = Arc::new(PricingEngine::new(
            store.clone(),
            resolver,
            config.clone(),
        ));
        let notifier = Notifier::new(mailer, config.clone(), metrics.clone());
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

        AppState {
            bookings,
            slots,
            pricing,
            catalog: store,
            scheduler,
            metrics,
        }
    }
}

/// Handler for GET /api/health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Handler for GET /api/services
/// Lists the active detailing services with their tier prices
#[utoipa::path(
    get,
    path = "/api/services",
    responses(
        (status = 200, description = "Active services ordered by name", body = Vec<DetailingService>),
        (status = 500, description = "Store unavailable")
    ),
    tag = "services"
)]
async fn list_services(
    State(state): State<AppState>,
) -> Result<Json<Vec<DetailingService>>, ApiError> {
    let services = state.catalog.active_services().await?;
    Ok(Json(services))
}

/// Handler for GET /api/admin/payments/overdue
/// The overdue-payments view the admin chases from
async fn overdue_payments(
    State(state): State<AppState>,
) -> Result<Json<Vec<OverduePayment>>, ApiError> {
    let overdue = state.scheduler.overdue_payments().await?;
    Ok(Json(overdue))
}

/// Handler for POST /api/admin/reminders/run
/// Runs one reminder sweep immediately instead of waiting for the timer
async fn run_reminders(
    State(state): State<AppState>,
) -> Result<Json<ReminderRunSummary>, ApiError> {
    let summary = state.scheduler.process_reminders().await?;
    Ok(Json(summary))
}

/// Handler for GET /api/admin/metrics
async fn metrics_summary(State(state): State<AppState>) -> Json<MetricsSummary> {
    Json(state.metrics.summary())
}

/// Creates and configures the application router
/// Maps all API endpoints to their handlers and adds CORS middleware
fn create_router(state: AppState) -> Router {
    use tower_http::cors::{Any, CorsLayer};

    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public surface
        .route("/api/health", get(health))
        .route("/api/services", get(list_services))
        .route("/api/quotes", post(quote_handler))
        .route("/api/slots", get(list_slots_handler))
        .route("/api/bookings", post(create_booking_handler))
        .route("/api/bookings/:id", get(get_booking_handler))
        .route("/api/bookings/:id/history", get(booking_history_handler))
        .route(
            "/api/bookings/:id/cancellation-policy",
            get(cancellation_policy_handler),
        )
        .route("/api/bookings/:id/cancel", post(cancel_booking_handler))
        .route("/api/bookings/:id/status", patch(update_status_handler))
        .route(
            "/api/bookings/:id/payment/confirm",
            post(confirm_payment_handler),
        )
        .route(
            "/api/customers/:customer_id/bookings",
            get(customer_bookings_handler),
        )
        // Admin surface
        .route("/api/admin/slots", post(create_slot_handler))
        .route("/api/admin/slots/bulk", post(bulk_create_slots_handler))
        .route("/api/admin/bookings/:id/cancel", post(admin_cancel_handler))
        .route("/api/admin/payments/overdue", get(overdue_payments))
        .route("/api/admin/reminders/run", post(run_reminders))
        .route("/api/admin/metrics", get(metrics_summary))
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    // This enables the error!, warn!, info!, debug!, and trace! macros
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Mobile Detailing API - Starting...");

    let config = Arc::new(BookingConfig::from_env());

    // Get configuration from environment variables
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set in environment");
    let host = std::env::var("HOST")
        .unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string());

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&database_url)
        .await
        .expect("Failed to create database pool");

    // Run SQLx migrations on startup
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations completed successfully");

    let store = Arc::new(PgStore::new(db_pool));
    let state = AppState::build(store, config);

    // Background payment-reminder sweep
    tokio::spawn(state.scheduler.clone().run_forever());

    // Create the application router
    let app = create_router(state);

    // Start the Axum server
    let addr = format!("{}:{}", host, port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Mobile Detailing API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}

#[cfg(test)]
mod tests;
