// In-memory entity store
//
// One RwLock over all tables is the single-writer boundary: every queue
// mutation happens under the write guard, readers proceed concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::bookings::Booking;
use crate::error::{BookingError, BookingResult};
use crate::queue::{QueueEntry, QueueOrdering, WaitTimeEstimator};
use crate::salons::{Customer, Salon};
use crate::store::{
    lost_race, AppliedTransition, BookingWrite, EnqueueWrite, EntityStore, TransitionWrite,
};

#[derive(Debug, Default)]
struct Tables {
    salons: HashMap<Uuid, Salon>,
    customers: HashMap<Uuid, Customer>,
    bookings: HashMap<Uuid, Booking>,
    /// Every entry ever created, keyed by salon
    queues: HashMap<Uuid, Vec<QueueEntry>>,
}

impl Tables {
    fn entry_for(&self, booking: &Booking) -> Option<&QueueEntry> {
        self.queues
            .get(&booking.salon_id)?
            .iter()
            .find(|e| e.booking_id == booking.id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_salon(&self, salon: Salon) -> Salon {
        self.tables
            .write()
            .await
            .salons
            .insert(salon.id, salon.clone());
        salon
    }

    pub async fn insert_customer(&self, customer: Customer) -> Customer {
        self.tables
            .write()
            .await
            .customers
            .insert(customer.id, customer.clone());
        customer
    }

    /// Full entry history of a salon, retired entries included
    pub async fn all_entries(&self, salon_id: Uuid) -> Vec<QueueEntry> {
        self.tables
            .read()
            .await
            .queues
            .get(&salon_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn find_salon(&self, salon_id: Uuid) -> BookingResult<Option<Salon>> {
        Ok(self.tables.read().await.salons.get(&salon_id).cloned())
    }

    async fn customer_exists(&self, customer_id: Uuid) -> BookingResult<bool> {
        Ok(self.tables.read().await.customers.contains_key(&customer_id))
    }

    async fn cancellation_count(&self, customer_id: Uuid) -> BookingResult<Option<i32>> {
        Ok(self
            .tables
            .read()
            .await
            .customers
            .get(&customer_id)
            .map(|c| c.cancellation_count))
    }

    async fn find_booking(&self, booking_id: Uuid) -> BookingResult<Option<Booking>> {
        Ok(self.tables.read().await.bookings.get(&booking_id).cloned())
    }

    async fn find_queue_entry(&self, booking_id: Uuid) -> BookingResult<Option<QueueEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .get(&booking_id)
            .and_then(|booking| tables.entry_for(booking))
            .cloned())
    }

    async fn salon_entries(&self, salon_id: Uuid) -> BookingResult<Vec<QueueEntry>> {
        Ok(self
            .tables
            .read()
            .await
            .queues
            .get(&salon_id)
            .map(|entries| entries.iter().filter(|e| e.is_active()).cloned().collect())
            .unwrap_or_default())
    }

    async fn active_booking_for_customer(
        &self,
        customer_id: Uuid,
    ) -> BookingResult<Option<Booking>> {
        Ok(self
            .tables
            .read()
            .await
            .bookings
            .values()
            .find(|b| b.customer_id == Some(customer_id) && b.status.is_active())
            .cloned())
    }

    async fn insert_pending_booking(&self, booking: Booking) -> BookingResult<Booking> {
        let mut tables = self.tables.write().await;

        if let Some(customer_id) = booking.customer_id {
            if !tables.customers.contains_key(&customer_id) {
                return Err(BookingError::not_found("Customer", customer_id));
            }
            let has_active = tables
                .bookings
                .values()
                .any(|b| b.customer_id == Some(customer_id) && b.status.is_active());
            if has_active {
                return Err(BookingError::ConflictActiveBooking(customer_id));
            }
        }

        tables.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn enqueue(&self, write: EnqueueWrite) -> BookingResult<(Booking, QueueEntry)> {
        let mut tables = self.tables.write().await;
        let booking = write.booking.booking().clone();

        if !tables.salons.contains_key(&booking.salon_id) {
            return Err(BookingError::not_found("Salon", booking.salon_id));
        }

        match &write.booking {
            BookingWrite::Update { expected, .. } => {
                let stored = tables
                    .bookings
                    .get(&booking.id)
                    .ok_or_else(|| BookingError::not_found("Booking", booking.id))?;
                if stored.status != *expected {
                    return Err(lost_race(booking.id, *expected, stored.status));
                }
                if tables.entry_for(stored).is_some() {
                    return Err(BookingError::ConflictQueuePosition(format!(
                        "booking {} is already queued",
                        booking.id
                    )));
                }
            }
            BookingWrite::Insert(_) => {
                if tables.bookings.contains_key(&booking.id) {
                    return Err(BookingError::ConflictQueuePosition(format!(
                        "booking {} already exists",
                        booking.id
                    )));
                }
            }
        }

        let queue = tables.queues.entry(booking.salon_id).or_default();
        if let Some(max) = write.max_active {
            if QueueOrdering::active_count(queue) as i32 >= max {
                return Err(BookingError::QueueFull { max });
            }
        }

        let entry = QueueEntry::waiting(booking.salon_id, booking.id, booking.customer_id, write.now);
        let placed = QueueOrdering::place(queue, entry, write.placement);
        WaitTimeEstimator::refresh(queue, write.avg_service_time);
        let placed = queue
            .iter()
            .find(|e| e.id == placed.id)
            .cloned()
            .unwrap_or(placed);

        tables.bookings.insert(booking.id, booking.clone());
        Ok((booking, placed))
    }

    async fn apply_transition(&self, write: TransitionWrite) -> BookingResult<AppliedTransition> {
        let mut tables = self.tables.write().await;
        let booking = write.booking;

        let stored = tables
            .bookings
            .get(&booking.id)
            .ok_or_else(|| BookingError::not_found("Booking", booking.id))?;
        if stored.status != write.expected {
            return Err(lost_race(booking.id, write.expected, stored.status));
        }

        let mut entry = None;
        let mut promoted = None;
        if let Some(queue) = tables.queues.get_mut(&booking.salon_id) {
            if let Some(idx) = queue.iter().position(|e| e.booking_id == booking.id) {
                let head_before = QueueOrdering::head(queue);
                if let Some(change) = write.entry_change {
                    if QueueOrdering::apply(&mut queue[idx], change, write.now) {
                        WaitTimeEstimator::refresh(queue, write.avg_service_time);
                    }
                }
                entry = Some(queue[idx].clone());
                promoted = QueueOrdering::promoted(head_before, queue).cloned();
            }
        }

        if write.increment_cancellations {
            if let Some(customer) = booking
                .customer_id
                .and_then(|id| tables.customers.get_mut(&id))
            {
                customer.cancellation_count += 1;
            }
        }

        tables.bookings.insert(booking.id, booking.clone());
        Ok(AppliedTransition {
            booking,
            entry,
            promoted,
        })
    }
}
