// HTTP handlers for the live queue

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

use crate::error::BookingError;
use crate::queue::{MetricsSummary, QueueView};
use crate::AppState;

/// Handler for GET /api/salons/:id/queue
#[utoipa::path(
    get,
    path = "/api/salons/{id}/queue",
    params(("id" = Uuid, Path, description = "Salon ID")),
    responses(
        (status = 200, description = "Active queue in service order", body = QueueView),
        (status = 404, description = "Salon not found")
    ),
    tag = "queue"
)]
pub async fn queue_view_handler(
    State(state): State<AppState>,
    Path(salon_id): Path<Uuid>,
) -> Result<Json<QueueView>, BookingError> {
    Ok(Json(state.booking_service.queue_view(salon_id).await?))
}

/// Handler for GET /api/salons/:id/queue/events
/// Streams queue changes as Server-Sent Events until the client disconnects
pub async fn queue_events_handler(
    State(state): State<AppState>,
    Path(salon_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, BookingError> {
    let rx = state.booking_service.subscribe(salon_id).await?;
    tracing::debug!("New queue subscriber for salon {}", salon_id);

    let stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().event("queue_event").data(data)))
        }
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            // Tell the viewer to refetch the queue instead of replaying
            tracing::debug!("Queue subscriber for salon {} lagged by {}", salon_id, skipped);
            Some(Ok(Event::default().event("resync").data(skipped.to_string())))
        }
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keepalive"),
    ))
}

/// Handler for GET /api/metrics
#[utoipa::path(
    get,
    path = "/api/metrics",
    responses((status = 200, description = "Engine operation metrics", body = MetricsSummary)),
    tag = "queue"
)]
pub async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsSummary> {
    Json(state.booking_service.metrics().summary())
}
