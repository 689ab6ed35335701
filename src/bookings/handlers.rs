// HTTP handlers for booking endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::bookings::{
    Booking, BookingTracking, CancelRequest, CreateBookingRequest, ReasonRequest,
    TransitionOutcome, WalkInRequest,
};
use crate::error::BookingError;
use crate::AppState;

/// Action bodies are optional
///
/// A request without a JSON content type carries no body and gets the
/// defaults. Any body that was sent must parse.
fn optional_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<Option<T>, BookingError> {
    match body {
        Ok(Json(value)) => Ok(Some(value)),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(None),
        Err(rejection) => Err(BookingError::ValidationError(rejection.body_text())),
    }
}

fn reason_from(body: Result<Json<ReasonRequest>, JsonRejection>) -> Result<Option<String>, BookingError> {
    match optional_body(body)? {
        Some(request) => {
            request.validate()?;
            Ok(request.reason)
        }
        None => Ok(None),
    }
}

/// Handler for POST /api/bookings
/// Submits an online booking in `pending` state
#[utoipa::path(
    post,
    path = "/api/bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booking created", body = Booking),
        (status = 400, description = "Invalid input data"),
        (status = 404, description = "Salon or customer not found"),
        (status = 409, description = "Customer already has an active booking, or the queue is full"),
        (status = 422, description = "Salon is offline or closed")
    ),
    tag = "bookings"
)]
pub async fn create_booking_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), BookingError> {
    let booking = state.booking_service.create_booking(request).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// Handler for GET /api/bookings/:id
/// Returns the booking with its live queue rank and wait estimate
#[utoipa::path(
    get,
    path = "/api/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking found", body = BookingTracking),
        (status = 404, description = "Booking not found")
    ),
    tag = "bookings"
)]
pub async fn track_booking_handler(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingTracking>, BookingError> {
    let tracking = state.booking_service.track_booking(booking_id).await?;
    Ok(Json(tracking))
}

/// Handler for POST /api/bookings/:id/confirm
#[utoipa::path(
    post,
    path = "/api/bookings/{id}/confirm",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking confirmed and queued", body = TransitionOutcome),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking cannot be confirmed from its current status")
    ),
    tag = "bookings"
)]
pub async fn confirm_booking_handler(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<TransitionOutcome>, BookingError> {
    Ok(Json(state.booking_service.confirm_booking(booking_id).await?))
}

/// Handler for POST /api/bookings/:id/reject
#[utoipa::path(
    post,
    path = "/api/bookings/{id}/reject",
    params(("id" = Uuid, Path, description = "Booking ID")),
    request_body(content = ReasonRequest, description = "Optional rejection reason"),
    responses(
        (status = 200, description = "Booking rejected", body = TransitionOutcome),
        (status = 400, description = "Malformed reason body"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Only pending bookings can be rejected")
    ),
    tag = "bookings"
)]
pub async fn reject_booking_handler(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    body: Result<Json<ReasonRequest>, JsonRejection>,
) -> Result<Json<TransitionOutcome>, BookingError> {
    let reason = reason_from(body)?;
    Ok(Json(state.booking_service.reject_booking(booking_id, reason).await?))
}

/// Handler for POST /api/bookings/:id/start
#[utoipa::path(
    post,
    path = "/api/bookings/{id}/start",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Service started", body = TransitionOutcome),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking is not confirmed")
    ),
    tag = "bookings"
)]
pub async fn start_service_handler(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<TransitionOutcome>, BookingError> {
    Ok(Json(state.booking_service.start_service(booking_id).await?))
}

/// Handler for POST /api/bookings/:id/complete
#[utoipa::path(
    post,
    path = "/api/bookings/{id}/complete",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Service completed", body = TransitionOutcome),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking is not confirmed or in progress")
    ),
    tag = "bookings"
)]
pub async fn complete_service_handler(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<TransitionOutcome>, BookingError> {
    Ok(Json(state.booking_service.complete_service(booking_id).await?))
}

/// Handler for POST /api/bookings/:id/no-show
#[utoipa::path(
    post,
    path = "/api/bookings/{id}/no-show",
    params(("id" = Uuid, Path, description = "Booking ID")),
    request_body(content = ReasonRequest, description = "Optional no-show reason"),
    responses(
        (status = 200, description = "Booking marked as no-show", body = TransitionOutcome),
        (status = 400, description = "Malformed reason body"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking is not pending or confirmed")
    ),
    tag = "bookings"
)]
pub async fn mark_no_show_handler(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    body: Result<Json<ReasonRequest>, JsonRejection>,
) -> Result<Json<TransitionOutcome>, BookingError> {
    let reason = reason_from(body)?;
    Ok(Json(state.booking_service.mark_no_show(booking_id, reason).await?))
}

/// Handler for POST /api/bookings/:id/cancel
#[utoipa::path(
    post,
    path = "/api/bookings/{id}/cancel",
    params(("id" = Uuid, Path, description = "Booking ID")),
    request_body(content = CancelRequest, description = "Reason and initiator"),
    responses(
        (status = 200, description = "Booking cancelled", body = TransitionOutcome),
        (status = 400, description = "Malformed cancel body"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking is not pending or confirmed")
    ),
    tag = "bookings"
)]
pub async fn cancel_booking_handler(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    body: Result<Json<CancelRequest>, JsonRejection>,
) -> Result<Json<TransitionOutcome>, BookingError> {
    let request = optional_body(body)?.unwrap_or_default();
    Ok(Json(state.booking_service.cancel_booking(booking_id, request).await?))
}

/// Handler for POST /api/salons/:id/walk-ins
/// Adds a walk-in at the tail, or at position 1 with `priority: true`
#[utoipa::path(
    post,
    path = "/api/salons/{id}/walk-ins",
    params(("id" = Uuid, Path, description = "Salon ID")),
    request_body = WalkInRequest,
    responses(
        (status = 201, description = "Walk-in queued", body = TransitionOutcome),
        (status = 400, description = "Invalid input data"),
        (status = 404, description = "Salon not found"),
        (status = 409, description = "Queue is full"),
        (status = 422, description = "Salon closed or not taking walk-ins")
    ),
    tag = "queue"
)]
pub async fn add_walk_in_handler(
    State(state): State<AppState>,
    Path(salon_id): Path<Uuid>,
    Json(request): Json<WalkInRequest>,
) -> Result<(StatusCode, Json<TransitionOutcome>), BookingError> {
    let outcome = state.booking_service.add_walk_in(salon_id, request).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
