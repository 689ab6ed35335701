// Entity store
//
// Durable home of salons, customers, bookings and queue entries. Every write
// that touches more than one record, or that must observe a consistent queue,
// is a single store call so each backend can make it atomic.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::bookings::{Booking, BookingStatus};
use crate::error::{BookingError, BookingResult};
use crate::queue::{EntryChange, Placement, QueueEntry};
use crate::salons::Salon;

/// Booking half of an enqueue
#[derive(Debug, Clone)]
pub enum BookingWrite {
    /// An existing booking moving out of `expected`
    Update {
        booking: Booking,
        expected: BookingStatus,
    },
    /// A booking created together with its queue entry (walk-ins)
    Insert(Booking),
}

impl BookingWrite {
    pub fn booking(&self) -> &Booking {
        match self {
            BookingWrite::Update { booking, .. } => booking,
            BookingWrite::Insert(booking) => booking,
        }
    }
}

/// Write a booking and give it a place in its salon's queue
#[derive(Debug, Clone)]
pub struct EnqueueWrite {
    pub booking: BookingWrite,
    pub placement: Placement,
    /// Refuse with `QueueFull` when this many entries are already active
    pub max_active: Option<i32>,
    pub avg_service_time: i32,
    pub now: DateTime<Utc>,
}

/// Move a booking to a new status and apply the matching queue change
#[derive(Debug, Clone)]
pub struct TransitionWrite {
    /// The booking as it should be stored
    pub booking: Booking,
    /// Status the stored booking must still have; anything else is a lost race
    pub expected: BookingStatus,
    pub entry_change: Option<EntryChange>,
    pub increment_cancellations: bool,
    pub avg_service_time: i32,
    pub now: DateTime<Utc>,
}

/// What `apply_transition` stored
#[derive(Debug, Clone)]
pub struct AppliedTransition {
    pub booking: Booking,
    pub entry: Option<QueueEntry>,
    /// Waiting entry that became the head of the queue with this write
    pub promoted: Option<QueueEntry>,
}

/// Entity store collaborator
///
/// Implementations run the queue position rules through `QueueOrdering` and
/// `WaitTimeEstimator` inside their own serialization boundary.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find_salon(&self, salon_id: Uuid) -> BookingResult<Option<Salon>>;

    async fn customer_exists(&self, customer_id: Uuid) -> BookingResult<bool>;

    /// Lifetime cancellation counter, `None` for an unknown customer
    async fn cancellation_count(&self, customer_id: Uuid) -> BookingResult<Option<i32>>;

    async fn find_booking(&self, booking_id: Uuid) -> BookingResult<Option<Booking>>;

    async fn find_queue_entry(&self, booking_id: Uuid) -> BookingResult<Option<QueueEntry>>;

    /// Entries of the salon still waiting or in service
    async fn salon_entries(&self, salon_id: Uuid) -> BookingResult<Vec<QueueEntry>>;

    async fn active_booking_for_customer(&self, customer_id: Uuid)
        -> BookingResult<Option<Booking>>;

    /// Insert a pending booking unless the customer already holds an active one
    ///
    /// The check and the insert are one atomic step per customer.
    async fn insert_pending_booking(&self, booking: Booking) -> BookingResult<Booking>;

    /// Atomically write the booking and place a new waiting entry for it
    async fn enqueue(&self, write: EnqueueWrite) -> BookingResult<(Booking, QueueEntry)>;

    /// Atomically compare-and-set the booking status, change its queue entry
    /// and bump the customer's cancellation counter
    ///
    /// The head of the queue is compared before and after the entry change
    /// under the same serialization boundary.
    async fn apply_transition(&self, write: TransitionWrite) -> BookingResult<AppliedTransition>;
}

pub(crate) fn lost_race(booking_id: Uuid, expected: BookingStatus, actual: BookingStatus) -> BookingError {
    BookingError::ConflictQueuePosition(format!(
        "booking {} is {}, expected {}",
        booking_id, actual, expected
    ))
}
