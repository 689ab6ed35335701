use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Queue entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueueEntryStatus {
    Waiting,
    InService,
    Completed,
}

impl QueueEntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueEntryStatus::Waiting => "waiting",
            QueueEntryStatus::InService => "in_service",
            QueueEntryStatus::Completed => "completed",
        }
    }

    /// Waiting and in-service entries hold a place in the live queue
    pub fn is_active(&self) -> bool {
        !matches!(self, QueueEntryStatus::Completed)
    }
}

impl std::fmt::Display for QueueEntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A booking's place in a salon's queue
///
/// `position` is a stable rank: retiring an entry never renumbers the others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct QueueEntry {
    pub id: Uuid,
    pub salon_id: Uuid,
    pub booking_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub position: i32,
    pub status: QueueEntryStatus,
    pub check_in_time: DateTime<Utc>,
    pub service_start_time: Option<DateTime<Utc>>,
    pub service_end_time: Option<DateTime<Utc>>,
    /// Snapshot written with the last queue mutation; reads recompute it
    pub estimated_wait_minutes: i32,
}

impl QueueEntry {
    /// A fresh waiting entry; the ordering engine assigns the real position
    pub fn waiting(
        salon_id: Uuid,
        booking_id: Uuid,
        customer_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            salon_id,
            booking_id,
            customer_id,
            position: 0,
            status: QueueEntryStatus::Waiting,
            check_in_time: now,
            service_start_time: None,
            service_end_time: None,
            estimated_wait_minutes: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Where a new entry lands in the salon's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Behind every active entry
    Tail,
    /// Position 1, pushing every active entry back by one
    First,
}

/// Change applied to an existing queue entry alongside a booking transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryChange {
    /// waiting -> in_service, stamps the service start
    StartService,
    /// -> completed, stamps the service end
    FinishService,
    /// -> completed without service (cancellation, rejection, no-show)
    Retire,
}

/// One row of the live queue as shown to owners and customers
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QueueViewEntry {
    pub entry_id: Uuid,
    pub booking_id: Uuid,
    pub customer_id: Option<Uuid>,
    /// Stored rank shown as "#N"
    pub position: i32,
    /// Rank among entries still in the queue
    pub live_rank: i32,
    pub status: QueueEntryStatus,
    pub estimated_wait_minutes: i32,
    pub check_in_time: DateTime<Utc>,
}

/// Snapshot of a salon's active queue
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QueueView {
    pub salon_id: Uuid,
    pub avg_service_time: i32,
    pub waiting: usize,
    pub in_service: usize,
    pub entries: Vec<QueueViewEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_status_activity() {
        assert!(QueueEntryStatus::Waiting.is_active());
        assert!(QueueEntryStatus::InService.is_active());
        assert!(!QueueEntryStatus::Completed.is_active());
    }

    #[test]
    fn test_entry_status_serialization() {
        let json = serde_json::to_string(&QueueEntryStatus::InService).unwrap();
        assert_eq!(json, "\"in_service\"");
    }

    #[test]
    fn test_waiting_entry() {
        let salon_id = Uuid::new_v4();
        let booking_id = Uuid::new_v4();
        let entry = QueueEntry::waiting(salon_id, booking_id, None, Utc::now());

        assert_eq!(entry.salon_id, salon_id);
        assert_eq!(entry.booking_id, booking_id);
        assert_eq!(entry.status, QueueEntryStatus::Waiting);
        assert!(entry.service_start_time.is_none());
        assert!(entry.is_active());
    }
}
