pub mod bookings;
pub mod config;
pub mod db;
pub mod error;
pub mod notifications;
pub mod queue;
pub mod salons;
pub mod store;
pub mod validation;

use std::sync::Arc;

use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use bookings::BookingService;

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        bookings::handlers::create_booking_handler,
        bookings::handlers::track_booking_handler,
        bookings::handlers::confirm_booking_handler,
        bookings::handlers::reject_booking_handler,
        bookings::handlers::start_service_handler,
        bookings::handlers::complete_service_handler,
        bookings::handlers::mark_no_show_handler,
        bookings::handlers::cancel_booking_handler,
        bookings::handlers::add_walk_in_handler,
        queue::handlers::queue_view_handler,
        queue::handlers::metrics_handler,
    ),
    components(
        schemas(
            bookings::Booking,
            bookings::BookingStatus,
            bookings::PaymentStatus,
            bookings::CreateBookingRequest,
            bookings::WalkInRequest,
            bookings::ReasonRequest,
            bookings::CancelRequest,
            bookings::CancelInitiator,
            bookings::TransitionOutcome,
            bookings::BookingTracking,
            queue::QueueEntry,
            queue::QueueEntryStatus,
            queue::Placement,
            queue::QueueView,
            queue::QueueViewEntry,
            queue::MetricsSummary,
            queue::OperationSummary,
        )
    ),
    tags(
        (name = "bookings", description = "Booking lifecycle endpoints"),
        (name = "queue", description = "Salon queue, walk-ins and live updates")
    ),
    info(
        title = "Salon Queue API",
        version = "1.0.0",
        description = "Booking lifecycle, walk-in queue ordering and wait-time estimation for salons"
    )
)]
pub struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub booking_service: Arc<BookingService>,
}

impl AppState {
    pub fn new(booking_service: BookingService) -> Self {
        Self {
            booking_service: Arc::new(booking_service),
        }
    }
}

/// Handler for GET /health
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Creates and configures the application router
/// Maps all API endpoints to their handlers and adds CORS and tracing middleware
pub fn create_router(state: AppState) -> Router {
    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health_check))
        .route("/api/metrics", get(queue::handlers::metrics_handler))
        // Booking lifecycle
        .route("/api/bookings", post(bookings::create_booking_handler))
        .route("/api/bookings/:id", get(bookings::track_booking_handler))
        .route("/api/bookings/:id/confirm", post(bookings::confirm_booking_handler))
        .route("/api/bookings/:id/reject", post(bookings::reject_booking_handler))
        .route("/api/bookings/:id/start", post(bookings::start_service_handler))
        .route("/api/bookings/:id/complete", post(bookings::complete_service_handler))
        .route("/api/bookings/:id/no-show", post(bookings::mark_no_show_handler))
        .route("/api/bookings/:id/cancel", post(bookings::cancel_booking_handler))
        // Salon queue
        .route("/api/salons/:id/walk-ins", post(bookings::add_walk_in_handler))
        .route("/api/salons/:id/queue", get(queue::handlers::queue_view_handler))
        .route("/api/salons/:id/queue/events", get(queue::handlers::queue_events_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests;
