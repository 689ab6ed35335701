// Notification dispatchers

use async_trait::async_trait;
use sqlx::PgPool;

use crate::notifications::{Notification, NotificationDispatcher, NotificationError};

/// Writes notifications to the log only
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        tracing::info!(
            recipient = %notification.recipient_id,
            booking = %notification.related_booking_id,
            category = notification.category.as_str(),
            "{}: {}",
            notification.title,
            notification.message
        );
        Ok(())
    }
}

/// Stores notifications in the `notifications` table for clients to pick up
pub struct PgNotificationDispatcher {
    pool: PgPool,
}

impl PgNotificationDispatcher {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationDispatcher for PgNotificationDispatcher {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (recipient_id, title, message, category, related_booking_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(notification.recipient_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.category)
        .bind(notification.related_booking_id)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            "Stored '{}' notification for {}",
            notification.title,
            notification.recipient_id
        );
        Ok(())
    }
}
