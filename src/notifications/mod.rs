// Notifications module
// Fire-and-forget customer messages triggered by lifecycle transitions

pub mod dispatchers;
pub mod templates;

pub use dispatchers::*;
pub use templates::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of message, used by clients to route it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Booking,
    Queue,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::Booking => "booking",
            NotificationCategory::Queue => "queue",
        }
    }
}

/// A message addressed to one customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_id: Uuid,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
    pub related_booking_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification storage failed: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Notification transport unavailable: {0}")]
    Unavailable(String),
}

/// Delivery collaborator
///
/// Implementations may fail; callers go through [`dispatch`] so a failure is
/// logged and never undoes the transition that produced the message.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Send and swallow the outcome
pub async fn dispatch(dispatcher: &dyn NotificationDispatcher, notification: Notification) {
    if let Err(e) = dispatcher.send(&notification).await {
        tracing::warn!(
            "Failed to send '{}' notification for booking {}: {}",
            notification.title,
            notification.related_booking_id,
            e
        );
    }
}
