// HTTP tests for the Salon Queue API
// Runs the full router against the in-memory store

use super::*;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;
use uuid::Uuid;

use crate::notifications::LogDispatcher;
use crate::salons::{Customer, Salon};
use crate::store::{EntityStore, InMemoryStore};

// ============================================================================
// Test Helpers
// ============================================================================

struct TestApp {
    server: TestServer,
    store: InMemoryStore,
    salon_id: Uuid,
}

/// Helper function to create a test app with one open salon
async fn create_test_app(salon: Salon) -> TestApp {
    let store = InMemoryStore::new();
    let salon = store.insert_salon(salon).await;
    let service = BookingService::new(Arc::new(store.clone()), Arc::new(LogDispatcher));
    let server = TestServer::new(create_router(AppState::new(service))).unwrap();

    TestApp {
        server,
        store,
        salon_id: salon.id,
    }
}

async fn default_app() -> TestApp {
    create_test_app(Salon::new("Fade Factory").with_avg_service_time(30)).await
}

/// Helper function to create a valid booking payload for testing
fn booking_payload(customer_id: Uuid, salon_id: Uuid) -> serde_json::Value {
    json!({
        "customer_id": customer_id,
        "salon_id": salon_id,
        "service_id": Uuid::new_v4(),
        "party_size": 1,
        "booking_date": "2024-06-03",
        "booking_time": "14:30:00",
        "duration_minutes": 30,
        "total_price": "25.00",
        "contact_name": "Alex",
        "contact_phone": "+15551234567",
        "notes": "Short fade"
    })
}

impl TestApp {
    async fn create_booking(&self) -> Uuid {
        let customer = self.store.insert_customer(Customer::new("Alex")).await;
        let response = self
            .server
            .post("/api/bookings")
            .json(&booking_payload(customer.id, self.salon_id))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: serde_json::Value = response.json();
        body["id"].as_str().unwrap().parse().unwrap()
    }

    async fn confirmed_booking(&self) -> Uuid {
        let id = self.create_booking().await;
        self.server
            .post(&format!("/api/bookings/{}/confirm", id))
            .await
            .assert_status_ok();
        id
    }
}

// ============================================================================
// Health Tests
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = default_app().await;
    let response = app.server.get("/health").await;

    response.assert_status_ok();
    response.assert_json(&json!({ "status": "ok" }));
}

// ============================================================================
// Booking Tests (POST /api/bookings, GET /api/bookings/:id)
// ============================================================================

#[tokio::test]
async fn test_create_booking_success() {
    let app = default_app().await;
    let customer = app.store.insert_customer(Customer::new("Alex")).await;

    let response = app
        .server
        .post("/api/bookings")
        .json(&booking_payload(customer.id, app.salon_id))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "pending");
    assert_eq!(body["payment_status"], "unpaid");
    assert_eq!(body["notes"], "Contact: Alex (+15551234567)\nShort fade");
    assert!(body["arrival_deadline"].is_null());
}

#[tokio::test]
async fn test_create_booking_validation_error() {
    let app = default_app().await;
    let customer = app.store.insert_customer(Customer::new("Alex")).await;
    let mut payload = booking_payload(customer.id, app.salon_id);
    payload["contact_phone"] = json!("call me");

    let response = app.server.post("/api/bookings").json(&payload).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_create_second_active_booking_conflicts() {
    let app = default_app().await;
    let customer = app.store.insert_customer(Customer::new("Alex")).await;
    let payload = booking_payload(customer.id, app.salon_id);

    app.server
        .post("/api/bookings")
        .json(&payload)
        .await
        .assert_status(StatusCode::CREATED);
    let response = app.server.post("/api/bookings").json(&payload).await;

    response.assert_status(StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error_code"], "CONFLICT_ACTIVE_BOOKING");
}

#[tokio::test]
async fn test_track_unknown_booking_not_found() {
    let app = default_app().await;
    let response = app
        .server
        .get(&format!("/api/bookings/{}", Uuid::new_v4()))
        .await;

    response.assert_status_not_found();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error_code"], "NOT_FOUND");
    assert!(body["message"].as_str().unwrap().contains("Booking"));
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_track_booking_reports_live_estimate() {
    let app = default_app().await;
    app.confirmed_booking().await;
    let second = app.confirmed_booking().await;

    let response = app.server.get(&format!("/api/bookings/{}", second)).await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["booking"]["status"], "confirmed");
    assert_eq!(body["queue_entry"]["position"], 2);
    assert_eq!(body["live_rank"], 2);
    assert_eq!(body["estimated_wait_minutes"], 30);
}

// ============================================================================
// Lifecycle Tests (POST /api/bookings/:id/...)
// ============================================================================

#[tokio::test]
async fn test_confirm_start_complete() {
    let app = default_app().await;
    let id = app.create_booking().await;

    let response = app.server.post(&format!("/api/bookings/{}/confirm", id)).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["booking"]["status"], "confirmed");
    assert_eq!(body["queue_entry"]["position"], 1);
    assert_eq!(body["already_satisfied"], false);

    let response = app.server.post(&format!("/api/bookings/{}/start", id)).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["queue_entry"]["status"], "in_service");

    let response = app.server.post(&format!("/api/bookings/{}/complete", id)).await;
    response.assert_status_ok();

    let response = app.server.post(&format!("/api/bookings/{}/complete", id)).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["booking"]["status"], "completed");
    assert_eq!(body["already_satisfied"], true);
}

#[tokio::test]
async fn test_invalid_transition_is_conflict() {
    let app = default_app().await;
    let id = app.create_booking().await;

    let response = app.server.post(&format!("/api/bookings/{}/start", id)).await;

    response.assert_status(StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error_code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn test_reject_with_and_without_reason() {
    let app = default_app().await;

    let id = app.create_booking().await;
    let response = app
        .server
        .post(&format!("/api/bookings/{}/reject", id))
        .json(&json!({ "reason": "Fully booked today" }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["booking"]["status"], "rejected");
    assert_eq!(body["booking"]["cancellation_reason"], "Fully booked today");

    let id = app.create_booking().await;
    let response = app.server.post(&format!("/api/bookings/{}/reject", id)).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(
        body["booking"]["cancellation_reason"],
        crate::notifications::DEFAULT_REJECTION_REASON
    );
}

#[tokio::test]
async fn test_no_show_and_cancel() {
    let app = default_app().await;
    let absent = app.confirmed_booking().await;
    let leaving = app.confirmed_booking().await;

    let response = app.server.post(&format!("/api/bookings/{}/no-show", absent)).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["booking"]["status"], "cancelled");
    assert_eq!(body["booking"]["no_show"], true);
    assert_eq!(body["queue_entry"]["status"], "completed");

    let response = app
        .server
        .post(&format!("/api/bookings/{}/cancel", leaving))
        .json(&json!({ "cancelled_by": "owner" }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["booking"]["cancellation_reason"], "Cancelled by salon");
    assert_eq!(body["booking"]["no_show"], false);
}

#[tokio::test]
async fn test_malformed_reason_body_is_rejected() {
    let app = default_app().await;
    let id = app.create_booking().await;

    let response = app
        .server
        .post(&format!("/api/bookings/{}/reject", id))
        .json(&json!({ "reason": 42 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error_code"], "VALIDATION_ERROR");

    // The booking is still waiting for a decision
    let response = app.server.get(&format!("/api/bookings/{}", id)).await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["booking"]["status"], "pending");
    assert!(body["booking"]["cancellation_reason"].is_null());
}

#[tokio::test]
async fn test_malformed_cancel_body_is_rejected() {
    let app = default_app().await;
    let id = app.confirmed_booking().await;
    let response = app.server.get(&format!("/api/bookings/{}", id)).await;
    let body: serde_json::Value = response.json();
    let customer_id: Uuid = body["booking"]["customer_id"].as_str().unwrap().parse().unwrap();

    let response = app
        .server
        .post(&format!("/api/bookings/{}/cancel", id))
        .json(&json!({ "cancelled_by": "salon" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let response = app.server.get(&format!("/api/bookings/{}", id)).await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["booking"]["status"], "confirmed");
    assert_eq!(app.store.cancellation_count(customer_id).await.unwrap(), Some(0));
}

#[tokio::test]
async fn test_no_show_without_body_uses_default_reason() {
    let app = default_app().await;
    let id = app.confirmed_booking().await;

    let response = app.server.post(&format!("/api/bookings/{}/no-show", id)).await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(
        body["booking"]["cancellation_reason"],
        crate::notifications::DEFAULT_NO_SHOW_REASON
    );
}

// ============================================================================
// Queue Tests (POST /api/salons/:id/walk-ins, GET /api/salons/:id/queue)
// ============================================================================

#[tokio::test]
async fn test_priority_walk_in_goes_first() {
    let app = default_app().await;
    app.confirmed_booking().await;

    let response = app
        .server
        .post(&format!("/api/salons/{}/walk-ins", app.salon_id))
        .json(&json!({ "customer_name": "Sam", "priority": true }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["booking"]["status"], "confirmed");
    assert!(body["booking"]["customer_id"].is_null());
    assert_eq!(body["queue_entry"]["position"], 1);

    let response = app
        .server
        .get(&format!("/api/salons/{}/queue", app.salon_id))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[0]["customer_id"].is_null());
    assert_eq!(entries[0]["estimated_wait_minutes"], 0);
    assert_eq!(entries[1]["position"], 2);
    assert_eq!(entries[1]["estimated_wait_minutes"], 30);
    assert_eq!(body["waiting"], 2);
}

#[tokio::test]
async fn test_walk_ins_disabled() {
    let mut salon = Salon::new("Appointments Only");
    salon.accepts_walkins = false;
    let app = create_test_app(salon).await;

    let response = app
        .server
        .post(&format!("/api/salons/{}/walk-ins", app.salon_id))
        .json(&json!({ "customer_name": "Sam" }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error_code"], "WALK_INS_DISABLED");
}

#[tokio::test]
async fn test_queue_of_unknown_salon() {
    let app = default_app().await;
    let response = app
        .server
        .get(&format!("/api/salons/{}/queue", Uuid::new_v4()))
        .await;

    response.assert_status_not_found();
}

// ============================================================================
// Metrics Tests (GET /api/metrics)
// ============================================================================

#[tokio::test]
async fn test_metrics_reflect_operations() {
    let app = default_app().await;
    app.confirmed_booking().await;

    let response = app.server.get("/api/metrics").await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let operations = body["operations"].as_array().unwrap();
    let create = operations
        .iter()
        .find(|op| op["operation"] == "create_booking")
        .unwrap();
    assert_eq!(create["count"], 1);
    assert_eq!(body["conflict_retries"], 0);
}
