// Queue change events
//
// Per-salon broadcast channels replacing row-level change subscriptions.
// A viewer subscribes by salon id and unsubscribes by dropping its receiver.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::bookings::BookingStatus;
use crate::queue::Placement;

pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// What happened to the salon's queue
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEventKind {
    /// A booking took a place in the queue
    Joined { position: i32, placement: Placement },
    ServiceStarted,
    /// The entry was retired; `reason` is the booking's new status
    Left { reason: BookingStatus },
    /// A booking of this salon changed status without touching the queue
    BookingStatusChanged { status: BookingStatus },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueEvent {
    pub salon_id: Uuid,
    pub booking_id: Uuid,
    pub entry_id: Option<Uuid>,
    #[serde(flatten)]
    pub kind: QueueEventKind,
    pub at: DateTime<Utc>,
}

impl QueueEvent {
    pub fn new(salon_id: Uuid, booking_id: Uuid, entry_id: Option<Uuid>, kind: QueueEventKind) -> Self {
        Self {
            salon_id,
            booking_id,
            entry_id,
            kind,
            at: Utc::now(),
        }
    }
}

/// Fan-out of queue events keyed by salon id
#[derive(Debug, Clone)]
pub struct QueueEventBus {
    channels: Arc<RwLock<HashMap<Uuid, broadcast::Sender<QueueEvent>>>>,
    capacity: usize,
}

impl QueueEventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Receive every event published for `salon_id` from now on
    pub async fn subscribe(&self, salon_id: Uuid) -> broadcast::Receiver<QueueEvent> {
        if let Some(sender) = self.channels.read().await.get(&salon_id) {
            return sender.subscribe();
        }

        let mut channels = self.channels.write().await;
        channels
            .entry(salon_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish to the salon's subscribers
    ///
    /// Returns the number of receivers reached. A salon without listeners
    /// drops the event and its idle channel.
    pub async fn publish(&self, event: QueueEvent) -> usize {
        let salon_id = event.salon_id;
        let delivered = match self.channels.read().await.get(&salon_id) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => return 0,
        };

        if delivered == 0 {
            let mut channels = self.channels.write().await;
            if channels
                .get(&salon_id)
                .map_or(false, |sender| sender.receiver_count() == 0)
            {
                channels.remove(&salon_id);
            }
        }

        tracing::trace!("Queue event for salon {} reached {} listeners", salon_id, delivered);
        delivered
    }

    pub async fn subscriber_count(&self, salon_id: Uuid) -> usize {
        self.channels
            .read()
            .await
            .get(&salon_id)
            .map_or(0, |sender| sender.receiver_count())
    }
}

impl Default for QueueEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}
