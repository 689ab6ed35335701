// Fixed message templates, one per notifying transition

use chrono::{DateTime, FixedOffset, Offset, Utc};
use uuid::Uuid;

use crate::notifications::{Notification, NotificationCategory};

/// Fallback when an owner rejects without giving a reason
pub const DEFAULT_REJECTION_REASON: &str =
    "The salon is unable to accommodate your booking at this time.";

/// Fallback when a no-show is recorded without a reason
pub const DEFAULT_NO_SHOW_REASON: &str = "Customer did not arrive within the arrival window";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationTemplate {
    /// The deadline is shown in the salon's local time
    BookingConfirmed {
        arrival_deadline: DateTime<Utc>,
        utc_offset_minutes: i32,
    },
    BookingNotAvailable { reason: String },
    ServiceStarted,
    ServiceComplete,
    MarkedNoShow { reason: String },
    /// Sent to the waiting customer who just reached the head of the queue
    NextInLine,
}

impl NotificationTemplate {
    pub fn title(&self) -> &'static str {
        match self {
            NotificationTemplate::BookingConfirmed { .. } => "Booking Confirmed",
            NotificationTemplate::BookingNotAvailable { .. } => "Booking Not Available",
            NotificationTemplate::ServiceStarted => "Service Started",
            NotificationTemplate::ServiceComplete => "Service Complete",
            NotificationTemplate::MarkedNoShow { .. } => "Marked as No-Show",
            NotificationTemplate::NextInLine => "You're Next!",
        }
    }

    pub fn message(&self) -> String {
        match self {
            NotificationTemplate::BookingConfirmed {
                arrival_deadline,
                utc_offset_minutes,
            } => {
                // Out-of-range offsets fall back to UTC
                let local =
                    FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
                format!(
                    "Your booking is confirmed. Please arrive by {} to keep your place in the queue.",
                    arrival_deadline.with_timezone(&local).format("%H:%M (UTC%:z)")
                )
            }
            NotificationTemplate::BookingNotAvailable { reason } => {
                format!("Your booking request was declined: {}", reason)
            }
            NotificationTemplate::ServiceStarted => {
                "Your service has started. Enjoy!".to_string()
            }
            NotificationTemplate::ServiceComplete => {
                "Your service is complete. Thank you for visiting!".to_string()
            }
            NotificationTemplate::MarkedNoShow { reason } => {
                format!("Your booking was cancelled as a no-show: {}", reason)
            }
            NotificationTemplate::NextInLine => {
                "You're next in line. Please make your way to the salon.".to_string()
            }
        }
    }

    pub fn category(&self) -> NotificationCategory {
        match self {
            NotificationTemplate::NextInLine | NotificationTemplate::ServiceStarted => {
                NotificationCategory::Queue
            }
            _ => NotificationCategory::Booking,
        }
    }

    pub fn render(&self, recipient_id: Uuid, booking_id: Uuid) -> Notification {
        Notification {
            recipient_id,
            title: self.title().to_string(),
            message: self.message(),
            category: self.category(),
            related_booking_id: booking_id,
        }
    }
}
