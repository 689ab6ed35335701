use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::queue::{Placement, QueueEntry};
use crate::validation::{validate_phone, validate_reason};

/// Booking status enum representing the lifecycle of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    Rejected,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::Rejected,
    ];

    /// Convert status to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Rejected => "rejected",
        }
    }

    /// Pending, confirmed and in-progress bookings count against the
    /// one-active-booking-per-customer rule
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::InProgress
        )
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl Default for BookingStatus {
    fn default() -> Self {
        BookingStatus::Pending
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "in_progress" => Ok(BookingStatus::InProgress),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "rejected" => Ok(BookingStatus::Rejected),
            _ => Err(format!("Invalid booking status: {}", s)),
        }
    }
}

/// Payment state of the prepaid booking fee (online bookings only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

/// Domain model representing a booking in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Booking {
    pub id: Uuid,
    pub salon_id: Uuid,
    /// `None` denotes a walk-in without a registered account
    pub customer_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub party_size: i32,
    pub companions: Vec<String>,
    pub booking_date: NaiveDate,
    pub booking_time: NaiveTime,
    pub duration_minutes: i32,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub no_show: bool,
    pub arrival_deadline: Option<DateTime<Utc>>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_walk_in(&self) -> bool {
        self.customer_id.is_none()
    }
}

/// Request DTO for creating an online booking
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateBookingRequest {
    pub customer_id: Uuid,
    pub salon_id: Uuid,
    pub service_id: Uuid,
    #[validate(range(min = 1, max = 10, message = "Party size must be between 1 and 10"))]
    pub party_size: i32,
    #[serde(default)]
    #[validate(length(max = 9, message = "At most 9 companions"))]
    pub companions: Vec<String>,
    pub booking_date: NaiveDate,
    pub booking_time: NaiveTime,
    #[validate(range(min = 5, max = 480, message = "Duration must be between 5 and 480 minutes"))]
    pub duration_minutes: i32,
    pub total_price: Decimal,
    #[validate(length(min = 1, max = 100, message = "Contact name is required"))]
    pub contact_name: String,
    #[validate(custom = "validate_phone")]
    pub contact_phone: String,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub payment_method: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub payment_reference: Option<String>,
}

/// Request DTO for adding a walk-in customer
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct WalkInRequest {
    #[validate(length(min = 1, max = 100, message = "Customer name is required"))]
    pub customer_name: String,
    #[validate(custom = "validate_phone")]
    pub customer_phone: Option<String>,
    pub service_id: Option<Uuid>,
    #[validate(range(min = 5, max = 480))]
    pub duration_minutes: Option<i32>,
    pub total_price: Option<Decimal>,
    /// Serve this walk-in before everyone already waiting
    #[serde(default)]
    pub priority: bool,
}

impl WalkInRequest {
    pub fn placement(&self) -> Placement {
        if self.priority {
            Placement::First
        } else {
            Placement::Tail
        }
    }

    /// Walk-ins carry their contact details in the booking notes
    pub fn notes(&self) -> String {
        match &self.customer_phone {
            Some(phone) => format!("Walk-in: {} ({})", self.customer_name, phone),
            None => format!("Walk-in: {}", self.customer_name),
        }
    }
}

/// Optional reason attached to reject, cancel and no-show actions
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReasonRequest {
    #[validate(length(min = 1, max = 500), custom = "validate_reason")]
    pub reason: Option<String>,
}

/// Who asked for a cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CancelInitiator {
    #[default]
    Customer,
    Owner,
}

/// Request DTO for cancelling a booking
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct CancelRequest {
    #[validate(length(min = 1, max = 500), custom = "validate_reason")]
    pub reason: Option<String>,
    #[serde(default)]
    pub cancelled_by: CancelInitiator,
}

/// Result of a lifecycle operation
///
/// `already_satisfied` is set when the booking was already in the state the
/// operation would have produced; nothing was written in that case.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransitionOutcome {
    pub booking: Booking,
    pub queue_entry: Option<QueueEntry>,
    pub already_satisfied: bool,
}

/// Customer-facing view of a booking and its live place in the queue
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookingTracking {
    pub booking: Booking,
    pub queue_entry: Option<QueueEntry>,
    /// 1-based rank among active entries; `None` once the entry left the queue
    pub live_rank: Option<i32>,
    pub estimated_wait_minutes: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_round_trip_strings() {
        for status in BookingStatus::ALL {
            assert_eq!(BookingStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(BookingStatus::from_str("archived").is_err());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&BookingStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn test_active_statuses() {
        assert!(BookingStatus::Pending.is_active());
        assert!(BookingStatus::Confirmed.is_active());
        assert!(BookingStatus::InProgress.is_active());
        assert!(BookingStatus::Completed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(BookingStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_walk_in_notes() {
        let mut request = WalkInRequest {
            customer_name: "Sam".to_string(),
            customer_phone: Some("+15551230000".to_string()),
            service_id: None,
            duration_minutes: None,
            total_price: None,
            priority: false,
        };
        assert_eq!(request.notes(), "Walk-in: Sam (+15551230000)");
        assert_eq!(request.placement(), Placement::Tail);

        request.customer_phone = None;
        request.priority = true;
        assert_eq!(request.notes(), "Walk-in: Sam");
        assert_eq!(request.placement(), Placement::First);
    }

    #[test]
    fn test_walk_in_request_validation() {
        let request = WalkInRequest {
            customer_name: String::new(),
            customer_phone: Some("not a phone".to_string()),
            service_id: None,
            duration_minutes: Some(1),
            total_price: None,
            priority: false,
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("customer_name"));
        assert!(fields.contains_key("customer_phone"));
        assert!(fields.contains_key("duration_minutes"));
    }

    #[test]
    fn test_cancel_request_defaults_to_customer() {
        let request: CancelRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.cancelled_by, CancelInitiator::Customer);
        assert!(request.reason.is_none());
    }
}
