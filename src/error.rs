// Error handling for the salon queue engine
// Provides the booking/queue error taxonomy and its HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Postgres SQLSTATE codes that mean a concurrent writer won the race
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Main error type for lifecycle, ordering and store operations
///
/// Every fallible operation of the engine returns `BookingResult<T>`. Nothing
/// here is swallowed except notification failures, which never reach this type.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// Attempted status change is not allowed from the current state
    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    /// Referenced booking, salon or customer does not exist
    #[error("{resource} with id {id} not found")]
    NotFound { resource: &'static str, id: String },

    /// Customer already holds a pending, confirmed or in-progress booking
    #[error("Customer {0} already has an active booking")]
    ConflictActiveBooking(Uuid),

    /// A concurrent write raced this one and won; the caller must re-read and retry
    #[error("Concurrent queue update: {0}")]
    ConflictQueuePosition(String),

    /// Salon is offline or outside its business hours
    #[error("Salon is not accepting bookings: {0}")]
    SalonUnavailable(String),

    #[error("Salon does not accept walk-ins")]
    WalkInsDisabled,

    #[error("Queue is full ({max} active entries)")]
    QueueFull { max: i32 },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Result type alias for engine operations
pub type BookingResult<T> = Result<T, BookingError>;

impl BookingError {
    /// Shorthand for a missing record
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        BookingError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::InvalidTransition(_) => StatusCode::CONFLICT,
            BookingError::NotFound { .. } => StatusCode::NOT_FOUND,
            BookingError::ConflictActiveBooking(_) => StatusCode::CONFLICT,
            BookingError::ConflictQueuePosition(_) => StatusCode::CONFLICT,
            BookingError::SalonUnavailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BookingError::WalkInsDisabled => StatusCode::UNPROCESSABLE_ENTITY,
            BookingError::QueueFull { .. } => StatusCode::CONFLICT,
            BookingError::ValidationError(_) => StatusCode::BAD_REQUEST,
            BookingError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            BookingError::InvalidTransition(_) => "INVALID_TRANSITION",
            BookingError::NotFound { .. } => "NOT_FOUND",
            BookingError::ConflictActiveBooking(_) => "CONFLICT_ACTIVE_BOOKING",
            BookingError::ConflictQueuePosition(_) => "CONFLICT_QUEUE_POSITION",
            BookingError::SalonUnavailable(_) => "SALON_UNAVAILABLE",
            BookingError::WalkInsDisabled => "WALK_INS_DISABLED",
            BookingError::QueueFull { .. } => "QUEUE_FULL",
            BookingError::ValidationError(_) => "VALIDATION_ERROR",
            BookingError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }
}

/// Consistent error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "INVALID_TRANSITION", "NOT_FOUND")
    pub error_code: String,

    /// Human-readable error message
    pub message: String,

    /// ISO 8601 timestamp of when the error occurred
    pub timestamp: String,
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            BookingError::DatabaseError(detail) => {
                // Full detail stays in the logs
                error!("Database error: {}", detail);
                "A database error occurred".to_string()
            }
            BookingError::ConflictActiveBooking(_)
            | BookingError::ConflictQueuePosition(_)
            | BookingError::InvalidTransition(_) => {
                warn!("Rejected booking action: {}", self);
                self.to_string()
            }
            _ => {
                debug!("Client error: {}", self);
                self.to_string()
            }
        };

        let body = ErrorResponse {
            error_code: self.error_code().to_string(),
            message,
            timestamp: Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for BookingError {
    fn from(err: sqlx::Error) -> Self {
        let raced = err
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code == SERIALIZATION_FAILURE || code == DEADLOCK_DETECTED)
            .unwrap_or(false);

        if raced {
            BookingError::ConflictQueuePosition(err.to_string())
        } else {
            BookingError::DatabaseError(err.to_string())
        }
    }
}

impl From<validator::ValidationErrors> for BookingError {
    fn from(errors: validator::ValidationErrors) -> Self {
        BookingError::ValidationError(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = BookingError::InvalidTransition("completed -> confirmed".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid status transition: completed -> confirmed"
        );

        let error = BookingError::not_found("Salon", 42);
        assert_eq!(error.to_string(), "Salon with id 42 not found");

        let error = BookingError::QueueFull { max: 12 };
        assert_eq!(error.to_string(), "Queue is full (12 active entries)");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            BookingError::InvalidTransition(String::new()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            BookingError::not_found("Booking", "x").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            BookingError::ConflictActiveBooking(Uuid::nil()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            BookingError::WalkInsDisabled.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            BookingError::DatabaseError("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_from_sqlx() {
        let err: BookingError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, BookingError::DatabaseError(_)));
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let codes = [
            BookingError::InvalidTransition(String::new()).error_code(),
            BookingError::not_found("Booking", 1).error_code(),
            BookingError::ConflictActiveBooking(Uuid::nil()).error_code(),
            BookingError::ConflictQueuePosition(String::new()).error_code(),
            BookingError::SalonUnavailable(String::new()).error_code(),
            BookingError::WalkInsDisabled.error_code(),
            BookingError::QueueFull { max: 1 }.error_code(),
            BookingError::ValidationError(String::new()).error_code(),
            BookingError::DatabaseError(String::new()).error_code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }
}
