// Postgres entity store
//
// Each write runs in one transaction. Queue mutations lock the salon row
// first (per-salon serialization boundary); the active-booking check locks
// the customer row (per-customer boundary).

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::bookings::{Booking, BookingStatus};
use crate::error::{BookingError, BookingResult};
use crate::queue::{QueueEntry, QueueOrdering, WaitTimeEstimator};
use crate::salons::Salon;
use crate::store::{
    lost_race, AppliedTransition, BookingWrite, EnqueueWrite, EntityStore, TransitionWrite,
};

const UNIQUE_VIOLATION: &str = "23505";
const ONE_ACTIVE_BOOKING_INDEX: &str = "bookings_one_active_per_customer";

const BOOKING_COLUMNS: &str = r#"
    id, salon_id, customer_id, service_id, party_size, companions, booking_date,
    booking_time, duration_minutes, total_price, status, notes, cancellation_reason,
    no_show, arrival_deadline, payment_status, payment_method, payment_reference,
    created_at, updated_at
"#;

const ENTRY_COLUMNS: &str = r#"
    id, salon_id, booking_id, customer_id, position, status, check_in_time,
    service_start_time, service_end_time, estimated_wait_minutes
"#;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_salon(tx: &mut Transaction<'_, Postgres>, salon_id: Uuid) -> BookingResult<()> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM salons WHERE id = $1 FOR UPDATE")
            .bind(salon_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| BookingError::not_found("Salon", salon_id))?;
        Ok(())
    }

    async fn active_entries(
        tx: &mut Transaction<'_, Postgres>,
        salon_id: Uuid,
    ) -> BookingResult<Vec<QueueEntry>> {
        let entries = sqlx::query_as::<_, QueueEntry>(&format!(
            "SELECT {} FROM queue_entries WHERE salon_id = $1 AND status <> 'completed' ORDER BY position",
            ENTRY_COLUMNS
        ))
        .bind(salon_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(entries)
    }

    async fn insert_booking(
        tx: &mut Transaction<'_, Postgres>,
        booking: &Booking,
    ) -> Result<Booking, sqlx::Error> {
        sqlx::query_as::<_, Booking>(&format!(
            r#"
            INSERT INTO bookings ({cols})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            RETURNING {cols}
            "#,
            cols = BOOKING_COLUMNS
        ))
        .bind(booking.id)
        .bind(booking.salon_id)
        .bind(booking.customer_id)
        .bind(booking.service_id)
        .bind(booking.party_size)
        .bind(&booking.companions)
        .bind(booking.booking_date)
        .bind(booking.booking_time)
        .bind(booking.duration_minutes)
        .bind(booking.total_price)
        .bind(booking.status)
        .bind(&booking.notes)
        .bind(&booking.cancellation_reason)
        .bind(booking.no_show)
        .bind(booking.arrival_deadline)
        .bind(booking.payment_status)
        .bind(&booking.payment_method)
        .bind(&booking.payment_reference)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .fetch_one(&mut **tx)
        .await
    }

    /// Status compare-and-set; a status that moved on is a lost race
    async fn update_booking(
        tx: &mut Transaction<'_, Postgres>,
        booking: &Booking,
        expected: BookingStatus,
    ) -> BookingResult<Booking> {
        let updated = sqlx::query_as::<_, Booking>(&format!(
            r#"
            UPDATE bookings
            SET status = $2,
                notes = $3,
                cancellation_reason = $4,
                no_show = $5,
                arrival_deadline = $6,
                payment_status = $7,
                updated_at = $8
            WHERE id = $1 AND status = $9
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(booking.id)
        .bind(booking.status)
        .bind(&booking.notes)
        .bind(&booking.cancellation_reason)
        .bind(booking.no_show)
        .bind(booking.arrival_deadline)
        .bind(booking.payment_status)
        .bind(booking.updated_at)
        .bind(expected)
        .fetch_optional(&mut **tx)
        .await?;

        match updated {
            Some(booking) => Ok(booking),
            None => {
                let actual = sqlx::query_scalar::<_, BookingStatus>(
                    "SELECT status FROM bookings WHERE id = $1",
                )
                .bind(booking.id)
                .fetch_optional(&mut **tx)
                .await?
                .ok_or_else(|| BookingError::not_found("Booking", booking.id))?;
                Err(lost_race(booking.id, expected, actual))
            }
        }
    }

    async fn insert_entry(
        tx: &mut Transaction<'_, Postgres>,
        entry: &QueueEntry,
    ) -> BookingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO queue_entries (id, salon_id, booking_id, customer_id, position, status,
                check_in_time, service_start_time, service_end_time, estimated_wait_minutes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id)
        .bind(entry.salon_id)
        .bind(entry.booking_id)
        .bind(entry.customer_id)
        .bind(entry.position)
        .bind(entry.status)
        .bind(entry.check_in_time)
        .bind(entry.service_start_time)
        .bind(entry.service_end_time)
        .bind(entry.estimated_wait_minutes)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Persist entries that differ from their loaded snapshot
    async fn write_changed_entries(
        tx: &mut Transaction<'_, Postgres>,
        before: &[QueueEntry],
        after: &[QueueEntry],
    ) -> BookingResult<()> {
        for entry in after {
            if before.iter().any(|old| old == entry) {
                continue;
            }
            sqlx::query(
                r#"
                UPDATE queue_entries
                SET position = $2,
                    status = $3,
                    service_start_time = $4,
                    service_end_time = $5,
                    estimated_wait_minutes = $6
                WHERE id = $1
                "#,
            )
            .bind(entry.id)
            .bind(entry.position)
            .bind(entry.status)
            .bind(entry.service_start_time)
            .bind(entry.service_end_time)
            .bind(entry.estimated_wait_minutes)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn find_salon(&self, salon_id: Uuid) -> BookingResult<Option<Salon>> {
        let salon = sqlx::query_as::<_, Salon>(
            r#"
            SELECT id, name, is_active, avg_service_time, max_queue_size, accepts_walkins,
                   utc_offset_minutes, business_hours, created_at
            FROM salons
            WHERE id = $1
            "#,
        )
        .bind(salon_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(salon)
    }

    async fn customer_exists(&self, customer_id: Uuid) -> BookingResult<bool> {
        let exists: Option<bool> =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM customers WHERE id = $1)")
                .bind(customer_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists.unwrap_or(false))
    }

    async fn cancellation_count(&self, customer_id: Uuid) -> BookingResult<Option<i32>> {
        let count = sqlx::query_scalar::<_, i32>(
            "SELECT cancellation_count FROM customers WHERE id = $1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(count)
    }

    async fn find_booking(&self, booking_id: Uuid) -> BookingResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(booking)
    }

    async fn find_queue_entry(&self, booking_id: Uuid) -> BookingResult<Option<QueueEntry>> {
        let entry = sqlx::query_as::<_, QueueEntry>(&format!(
            "SELECT {} FROM queue_entries WHERE booking_id = $1",
            ENTRY_COLUMNS
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn salon_entries(&self, salon_id: Uuid) -> BookingResult<Vec<QueueEntry>> {
        let entries = sqlx::query_as::<_, QueueEntry>(&format!(
            "SELECT {} FROM queue_entries WHERE salon_id = $1 AND status <> 'completed' ORDER BY position",
            ENTRY_COLUMNS
        ))
        .bind(salon_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn active_booking_for_customer(
        &self,
        customer_id: Uuid,
    ) -> BookingResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            r#"
            SELECT {} FROM bookings
            WHERE customer_id = $1 AND status IN ('pending', 'confirmed', 'in_progress')
            LIMIT 1
            "#,
            BOOKING_COLUMNS
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(booking)
    }

    async fn insert_pending_booking(&self, booking: Booking) -> BookingResult<Booking> {
        let mut tx = self.pool.begin().await?;

        if let Some(customer_id) = booking.customer_id {
            sqlx::query_scalar::<_, Uuid>("SELECT id FROM customers WHERE id = $1 FOR UPDATE")
                .bind(customer_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| BookingError::not_found("Customer", customer_id))?;

            let has_active: Option<bool> = sqlx::query_scalar(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM bookings
                    WHERE customer_id = $1 AND status IN ('pending', 'confirmed', 'in_progress')
                )
                "#,
            )
            .bind(customer_id)
            .fetch_one(&mut *tx)
            .await?;

            if has_active.unwrap_or(false) {
                return Err(BookingError::ConflictActiveBooking(customer_id));
            }
        }

        let stored = Self::insert_booking(&mut tx, &booking).await.map_err(|e| {
            let hit_index = e
                .as_database_error()
                .map(|db| {
                    db.code().as_deref() == Some(UNIQUE_VIOLATION)
                        && db.constraint() == Some(ONE_ACTIVE_BOOKING_INDEX)
                })
                .unwrap_or(false);
            match booking.customer_id {
                Some(customer_id) if hit_index => BookingError::ConflictActiveBooking(customer_id),
                _ => BookingError::from(e),
            }
        })?;

        tx.commit().await?;
        Ok(stored)
    }

    async fn enqueue(&self, write: EnqueueWrite) -> BookingResult<(Booking, QueueEntry)> {
        let salon_id = write.booking.booking().salon_id;
        let mut tx = self.pool.begin().await?;
        Self::lock_salon(&mut tx, salon_id).await?;

        let before = Self::active_entries(&mut tx, salon_id).await?;
        if let Some(max) = write.max_active {
            if QueueOrdering::active_count(&before) as i32 >= max {
                return Err(BookingError::QueueFull { max });
            }
        }

        let booking = match &write.booking {
            BookingWrite::Update { booking, expected } => {
                Self::update_booking(&mut tx, booking, *expected).await?
            }
            BookingWrite::Insert(booking) => Self::insert_booking(&mut tx, booking).await?,
        };

        let mut after = before.clone();
        let entry = QueueEntry::waiting(salon_id, booking.id, booking.customer_id, write.now);
        let placed = QueueOrdering::place(&mut after, entry, write.placement);
        WaitTimeEstimator::refresh(&mut after, write.avg_service_time);
        QueueOrdering::verify(&after).map_err(BookingError::ConflictQueuePosition)?;

        let (new_entries, existing): (Vec<QueueEntry>, Vec<QueueEntry>) =
            after.into_iter().partition(|e| e.id == placed.id);
        Self::write_changed_entries(&mut tx, &before, &existing).await?;

        let placed = new_entries.into_iter().next().unwrap_or(placed);
        Self::insert_entry(&mut tx, &placed).await?;

        tx.commit().await?;
        tracing::debug!(
            "Queued booking {} at position {} in salon {}",
            booking.id,
            placed.position,
            salon_id
        );
        Ok((booking, placed))
    }

    async fn apply_transition(&self, write: TransitionWrite) -> BookingResult<AppliedTransition> {
        let salon_id = write.booking.salon_id;
        let mut tx = self.pool.begin().await?;
        Self::lock_salon(&mut tx, salon_id).await?;

        let booking = Self::update_booking(&mut tx, &write.booking, write.expected).await?;

        let before = Self::active_entries(&mut tx, salon_id).await?;
        let mut after = before.clone();

        let (entry, promoted) = match after.iter().position(|e| e.booking_id == booking.id) {
            Some(idx) => {
                if let Some(change) = write.entry_change {
                    if QueueOrdering::apply(&mut after[idx], change, write.now) {
                        WaitTimeEstimator::refresh(&mut after, write.avg_service_time);
                    }
                }
                Self::write_changed_entries(&mut tx, &before, &after).await?;
                let promoted = QueueOrdering::promoted(QueueOrdering::head(&before), &after).cloned();
                (Some(after[idx].clone()), promoted)
            }
            // Retired or never queued; history is left untouched
            None => {
                let entry = sqlx::query_as::<_, QueueEntry>(&format!(
                    "SELECT {} FROM queue_entries WHERE booking_id = $1",
                    ENTRY_COLUMNS
                ))
                .bind(booking.id)
                .fetch_optional(&mut *tx)
                .await?;
                (entry, None)
            }
        };

        if write.increment_cancellations {
            if let Some(customer_id) = booking.customer_id {
                sqlx::query(
                    "UPDATE customers SET cancellation_count = cancellation_count + 1 WHERE id = $1",
                )
                .bind(customer_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(AppliedTransition {
            booking,
            entry,
            promoted,
        })
    }
}
