use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use uuid::Uuid;
use validator::Validate;

use crate::bookings::{
    BookingAction, Booking, BookingStatus, BookingTracking, CancelInitiator, CancelRequest,
    CreateBookingRequest, PaymentStatus, StatusMachine, Transition, TransitionOutcome,
    WalkInRequest,
};
use crate::error::{BookingError, BookingResult};
use crate::notifications::{
    dispatch, NotificationDispatcher, NotificationTemplate, DEFAULT_NO_SHOW_REASON,
    DEFAULT_REJECTION_REASON,
};
use crate::queue::{
    EngineMetrics, EngineOperation, EntryChange, Placement, QueueEntry, QueueEntryStatus, QueueEvent,
    QueueEventBus, QueueEventKind, QueueOrdering, QueueView, QueueViewEntry, WaitTimeEstimator,
    DEFAULT_AVG_SERVICE_MINUTES,
};
use crate::salons::{AlwaysOpen, BusinessHoursGate, Salon};
use crate::store::{AppliedTransition, BookingWrite, EnqueueWrite, EntityStore, TransitionWrite};

/// Engine knobs read from configuration
#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Arrival window granted on confirmation
    pub arrival_grace: Duration,
    pub default_avg_service_minutes: i32,
    /// Attempts per operation before a lost queue race is surfaced
    pub max_write_attempts: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            arrival_grace: Duration::minutes(10),
            default_avg_service_minutes: DEFAULT_AVG_SERVICE_MINUTES,
            max_write_attempts: 3,
        }
    }
}

/// Booking lifecycle and queue operations
///
/// Validates every action with the [`StatusMachine`], writes through the
/// [`EntityStore`] in one atomic call, then fans out notifications and queue
/// events. Notification failures never undo a transition.
#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn EntityStore>,
    notifier: Arc<dyn NotificationDispatcher>,
    hours: Arc<dyn BusinessHoursGate>,
    events: QueueEventBus,
    metrics: EngineMetrics,
    settings: QueueSettings,
}

impl BookingService {
    /// Create a new BookingService with an always-open hours gate
    pub fn new(store: Arc<dyn EntityStore>, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        Self {
            store,
            notifier,
            hours: Arc::new(AlwaysOpen),
            events: QueueEventBus::default(),
            metrics: EngineMetrics::new(),
            settings: QueueSettings::default(),
        }
    }

    pub fn with_hours_gate(mut self, hours: Arc<dyn BusinessHoursGate>) -> Self {
        self.hours = hours;
        self
    }

    pub fn with_settings(mut self, settings: QueueSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_events(mut self, events: QueueEventBus) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &QueueEventBus {
        &self.events
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Submit an online booking
    ///
    /// # Validation
    /// - Salon must exist, be online and within business hours
    /// - Customer must exist and hold no other pending, confirmed or in-progress booking
    /// - Salon queue must not be at `max_queue_size`
    ///
    /// The booking starts `pending` without a queue entry; confirmation queues it.
    pub async fn create_booking(&self, request: CreateBookingRequest) -> BookingResult<Booking> {
        let _timer = self.metrics.start(EngineOperation::CreateBooking);
        request.validate()?;

        let now = Utc::now();
        let salon = self.load_salon(request.salon_id).await?;
        if !salon.is_active {
            return Err(BookingError::SalonUnavailable(format!("{} is offline", salon.name)));
        }
        if !self.hours.is_within_hours(&salon, now) {
            return Err(BookingError::SalonUnavailable(format!(
                "{} is outside business hours",
                salon.name
            )));
        }

        if !self.store.customer_exists(request.customer_id).await? {
            return Err(BookingError::not_found("Customer", request.customer_id));
        }
        if let Some(existing) = self
            .store
            .active_booking_for_customer(request.customer_id)
            .await?
        {
            tracing::warn!(
                "Customer {} tried to book while booking {} is {}",
                request.customer_id,
                existing.id,
                existing.status
            );
            return Err(BookingError::ConflictActiveBooking(request.customer_id));
        }

        if let Some(max) = salon.max_queue_size {
            let active = self.store.salon_entries(salon.id).await?.len();
            if active as i32 >= max {
                return Err(BookingError::QueueFull { max });
            }
        }

        let notes = match request.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(extra) => format!(
                "Contact: {} ({})\n{}",
                request.contact_name, request.contact_phone, extra
            ),
            None => format!("Contact: {} ({})", request.contact_name, request.contact_phone),
        };
        let payment_status = if request.payment_reference.is_some() {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Unpaid
        };

        let booking = Booking {
            id: Uuid::new_v4(),
            salon_id: salon.id,
            customer_id: Some(request.customer_id),
            service_id: Some(request.service_id),
            party_size: request.party_size,
            companions: request.companions,
            booking_date: request.booking_date,
            booking_time: request.booking_time,
            duration_minutes: request.duration_minutes,
            total_price: request.total_price,
            status: BookingStatus::Pending,
            notes: Some(notes),
            cancellation_reason: None,
            no_show: false,
            arrival_deadline: None,
            payment_status: Some(payment_status),
            payment_method: request.payment_method,
            payment_reference: request.payment_reference,
            created_at: now,
            updated_at: now,
        };

        let booking = self.store.insert_pending_booking(booking).await?;
        self.publish(
            &booking,
            None,
            QueueEventKind::BookingStatusChanged { status: booking.status },
        )
        .await;

        tracing::info!(
            "Created booking {} for customer {} at salon {}",
            booking.id,
            request.customer_id,
            booking.salon_id
        );
        Ok(booking)
    }

    /// pending → confirmed; queues the booking at the tail and starts the arrival window
    pub async fn confirm_booking(&self, booking_id: Uuid) -> BookingResult<TransitionOutcome> {
        self.run(EngineOperation::ConfirmBooking, booking_id, BookingAction::Confirm, None)
            .await
    }

    /// pending → rejected with the owner's reason or a generic one
    pub async fn reject_booking(
        &self,
        booking_id: Uuid,
        reason: Option<String>,
    ) -> BookingResult<TransitionOutcome> {
        self.run(EngineOperation::RejectBooking, booking_id, BookingAction::Reject, reason)
            .await
    }

    /// Move a confirmed booking's waiting entry into service
    pub async fn start_service(&self, booking_id: Uuid) -> BookingResult<TransitionOutcome> {
        self.run(EngineOperation::StartService, booking_id, BookingAction::StartService, None)
            .await
    }

    pub async fn complete_service(&self, booking_id: Uuid) -> BookingResult<TransitionOutcome> {
        self.run(
            EngineOperation::CompleteService,
            booking_id,
            BookingAction::CompleteService,
            None,
        )
        .await
    }

    pub async fn mark_no_show(
        &self,
        booking_id: Uuid,
        reason: Option<String>,
    ) -> BookingResult<TransitionOutcome> {
        self.run(EngineOperation::MarkNoShow, booking_id, BookingAction::MarkNoShow, reason)
            .await
    }

    /// Cancel on behalf of the customer or the salon
    ///
    /// Customer bookings bump the customer's lifetime cancellation counter.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        request: CancelRequest,
    ) -> BookingResult<TransitionOutcome> {
        request.validate()?;
        let reason = request.reason.unwrap_or_else(|| match request.cancelled_by {
            CancelInitiator::Customer => "Cancelled by customer".to_string(),
            CancelInitiator::Owner => "Cancelled by salon".to_string(),
        });
        self.run(
            EngineOperation::CancelBooking,
            booking_id,
            BookingAction::Cancel,
            Some(reason),
        )
        .await
    }

    /// Add a walk-in customer at the tail, or at position 1 when `priority` is set
    ///
    /// Walk-ins are created `confirmed` without a customer account.
    pub async fn add_walk_in(
        &self,
        salon_id: Uuid,
        request: WalkInRequest,
    ) -> BookingResult<TransitionOutcome> {
        let _timer = self.metrics.start(EngineOperation::AddWalkIn);
        request.validate()?;

        let now = Utc::now();
        let salon = self.load_salon(salon_id).await?;
        if !salon.accepts_walkins {
            return Err(BookingError::WalkInsDisabled);
        }
        if !self.hours.is_within_hours(&salon, now) {
            return Err(BookingError::SalonUnavailable(format!(
                "{} is outside business hours",
                salon.name
            )));
        }

        let avg = self.avg_for(&salon);
        let placement = request.placement();
        let max_active = salon.max_queue_size;
        let booking = Booking {
            id: Uuid::new_v4(),
            salon_id,
            customer_id: None,
            service_id: request.service_id,
            party_size: 1,
            companions: Vec::new(),
            booking_date: now.date_naive(),
            booking_time: now.time(),
            duration_minutes: request.duration_minutes.unwrap_or(avg),
            total_price: request.total_price.unwrap_or(Decimal::ZERO),
            status: BookingStatus::Confirmed,
            notes: Some(request.notes()),
            cancellation_reason: None,
            no_show: false,
            arrival_deadline: None,
            payment_status: None,
            payment_method: None,
            payment_reference: None,
            created_at: now,
            updated_at: now,
        };

        let (booking, entry) = self
            .with_retry(move || {
                self.store.enqueue(EnqueueWrite {
                    booking: BookingWrite::Insert(booking.clone()),
                    placement,
                    max_active,
                    avg_service_time: avg,
                    now: Utc::now(),
                })
            })
            .await?;

        self.publish(
            &booking,
            Some(entry.id),
            QueueEventKind::Joined { position: entry.position, placement },
        )
        .await;

        tracing::info!(
            "Added walk-in booking {} to salon {} at position {} ({:?})",
            booking.id,
            salon_id,
            entry.position,
            placement
        );
        Ok(TransitionOutcome {
            booking,
            queue_entry: Some(entry),
            already_satisfied: false,
        })
    }

    /// A booking with its live queue rank and estimated wait
    pub async fn track_booking(&self, booking_id: Uuid) -> BookingResult<BookingTracking> {
        let _timer = self.metrics.start(EngineOperation::TrackBooking);
        let booking = self.load_booking(booking_id).await?;
        let entry = self.store.find_queue_entry(booking_id).await?;

        let (live_rank, estimated_wait_minutes) = match &entry {
            Some(entry) if entry.is_active() => {
                let avg = self.avg_for_salon(booking.salon_id).await?;
                let entries = self.store.salon_entries(booking.salon_id).await?;
                let rank = QueueOrdering::live_rank(&entries, entry.id);
                (rank, rank.map(|r| WaitTimeEstimator::estimate(r, avg)))
            }
            _ => (None, None),
        };

        Ok(BookingTracking {
            booking,
            queue_entry: entry,
            live_rank,
            estimated_wait_minutes,
        })
    }

    /// Active queue of a salon in service order, estimates recomputed now
    pub async fn queue_view(&self, salon_id: Uuid) -> BookingResult<QueueView> {
        let _timer = self.metrics.start(EngineOperation::QueueView);
        let salon = self.load_salon(salon_id).await?;
        let avg = self.avg_for(&salon);
        let entries = self.store.salon_entries(salon_id).await?;

        let ordered = QueueOrdering::ordered_active(&entries);
        let view_entries: Vec<QueueViewEntry> = ordered
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                let live_rank = idx as i32 + 1;
                QueueViewEntry {
                    entry_id: entry.id,
                    booking_id: entry.booking_id,
                    customer_id: entry.customer_id,
                    position: entry.position,
                    live_rank,
                    status: entry.status,
                    estimated_wait_minutes: WaitTimeEstimator::estimate(live_rank, avg),
                    check_in_time: entry.check_in_time,
                }
            })
            .collect();

        Ok(QueueView {
            salon_id,
            avg_service_time: avg,
            waiting: ordered
                .iter()
                .filter(|e| e.status == QueueEntryStatus::Waiting)
                .count(),
            in_service: ordered
                .iter()
                .filter(|e| e.status == QueueEntryStatus::InService)
                .count(),
            entries: view_entries,
        })
    }

    /// Live queue events for an existing salon
    pub async fn subscribe(&self, salon_id: Uuid) -> BookingResult<broadcast::Receiver<QueueEvent>> {
        self.load_salon(salon_id).await?;
        Ok(self.events.subscribe(salon_id).await)
    }

    async fn run(
        &self,
        operation: EngineOperation,
        booking_id: Uuid,
        action: BookingAction,
        reason: Option<String>,
    ) -> BookingResult<TransitionOutcome> {
        let _timer = self.metrics.start(operation);

        let (outcome, promoted) = self
            .with_retry(move || self.run_once(booking_id, action, reason.clone()))
            .await?;

        if outcome.already_satisfied {
            tracing::debug!(
                "Booking {} already {}; nothing to {}",
                booking_id,
                outcome.booking.status,
                action.as_str()
            );
            return Ok(outcome);
        }

        self.after_transition(action, &outcome, promoted).await;
        tracing::info!(
            "Booking {} at salon {} is now {}",
            booking_id,
            outcome.booking.salon_id,
            outcome.booking.status
        );
        Ok(outcome)
    }

    /// One read-validate-write pass; the store rejects it if the status moved meanwhile
    ///
    /// Also returns the waiting entry this write moved to the head of the queue.
    async fn run_once(
        &self,
        booking_id: Uuid,
        action: BookingAction,
        reason: Option<String>,
    ) -> BookingResult<(TransitionOutcome, Option<QueueEntry>)> {
        let booking = self.load_booking(booking_id).await?;
        let now = Utc::now();

        let (from, to) = match StatusMachine::check(action, booking.status)? {
            Transition::Apply { from, to } => (from, to),
            Transition::AlreadySatisfied => {
                return self
                    .already_satisfied(booking, action, now)
                    .await
                    .map(|outcome| (outcome, None));
            }
        };

        let avg = self.avg_for_salon(booking.salon_id).await?;
        let updated = self.prepare(&booking, action, to, reason.as_deref(), now);

        if action == BookingAction::Confirm {
            let (booking, entry) = self
                .store
                .enqueue(EnqueueWrite {
                    booking: BookingWrite::Update { booking: updated, expected: from },
                    placement: Placement::Tail,
                    max_active: None,
                    avg_service_time: avg,
                    now,
                })
                .await?;
            let outcome = TransitionOutcome {
                booking,
                queue_entry: Some(entry),
                already_satisfied: false,
            };
            return Ok((outcome, None));
        }

        let applied = self
            .store
            .apply_transition(TransitionWrite {
                increment_cancellations: action == BookingAction::Cancel
                    && updated.customer_id.is_some(),
                booking: updated,
                expected: from,
                entry_change: Self::entry_change(action),
                avg_service_time: avg,
                now,
            })
            .await?;

        Ok(Self::applied_outcome(applied))
    }

    fn applied_outcome(applied: AppliedTransition) -> (TransitionOutcome, Option<QueueEntry>) {
        let outcome = TransitionOutcome {
            booking: applied.booking,
            queue_entry: applied.entry,
            already_satisfied: false,
        };
        (outcome, applied.promoted)
    }

    /// Handle a request whose target status is already reached
    async fn already_satisfied(
        &self,
        booking: Booking,
        action: BookingAction,
        now: DateTime<Utc>,
    ) -> BookingResult<TransitionOutcome> {
        let entry = self.store.find_queue_entry(booking.id).await?;

        match action {
            // In progress but the entry never left the waiting line
            BookingAction::StartService
                if entry.as_ref().map(|e| e.status) == Some(QueueEntryStatus::Waiting) =>
            {
                let avg = self.avg_for_salon(booking.salon_id).await?;
                let status = booking.status;
                let applied = self
                    .store
                    .apply_transition(TransitionWrite {
                        booking,
                        expected: status,
                        entry_change: Some(EntryChange::StartService),
                        increment_cancellations: false,
                        avg_service_time: avg,
                        now,
                    })
                    .await?;
                Ok(TransitionOutcome {
                    booking: applied.booking,
                    queue_entry: applied.entry,
                    already_satisfied: false,
                })
            }
            BookingAction::MarkNoShow if !booking.no_show => {
                Err(BookingError::InvalidTransition(format!(
                    "booking {} was cancelled, not marked as a no-show",
                    booking.id
                )))
            }
            _ => Ok(TransitionOutcome {
                booking,
                queue_entry: entry,
                already_satisfied: true,
            }),
        }
    }

    /// The booking as it should be stored after `action`
    fn prepare(
        &self,
        booking: &Booking,
        action: BookingAction,
        to: BookingStatus,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Booking {
        let mut updated = booking.clone();
        updated.status = to;
        updated.updated_at = now;

        match action {
            BookingAction::Confirm => {
                updated.arrival_deadline = Some(now + self.settings.arrival_grace);
            }
            BookingAction::Reject => {
                updated.cancellation_reason =
                    Some(reason.unwrap_or(DEFAULT_REJECTION_REASON).to_string());
            }
            BookingAction::MarkNoShow => {
                updated.no_show = true;
                updated.cancellation_reason =
                    Some(reason.unwrap_or(DEFAULT_NO_SHOW_REASON).to_string());
                updated.notes = Some(match booking.notes.as_deref() {
                    Some(notes) if !notes.is_empty() => format!("{}\n[no-show]", notes),
                    _ => "[no-show]".to_string(),
                });
            }
            BookingAction::Cancel => {
                updated.cancellation_reason = reason.map(str::to_string);
            }
            BookingAction::StartService | BookingAction::CompleteService => {}
        }

        updated
    }

    fn entry_change(action: BookingAction) -> Option<EntryChange> {
        match action {
            BookingAction::StartService => Some(EntryChange::StartService),
            BookingAction::CompleteService => Some(EntryChange::FinishService),
            BookingAction::MarkNoShow | BookingAction::Cancel => Some(EntryChange::Retire),
            BookingAction::Confirm | BookingAction::Reject => None,
        }
    }

    /// Notifications and queue events for an applied transition
    async fn after_transition(
        &self,
        action: BookingAction,
        outcome: &TransitionOutcome,
        promoted: Option<QueueEntry>,
    ) {
        let booking = &outcome.booking;
        let entry_id = outcome.queue_entry.as_ref().map(|e| e.id);
        let reason = booking.cancellation_reason.clone().unwrap_or_default();

        let template = match action {
            BookingAction::Confirm => Some(NotificationTemplate::BookingConfirmed {
                arrival_deadline: booking
                    .arrival_deadline
                    .unwrap_or(booking.updated_at + self.settings.arrival_grace),
                utc_offset_minutes: self.utc_offset_of(booking.salon_id).await,
            }),
            BookingAction::Reject => Some(NotificationTemplate::BookingNotAvailable { reason }),
            BookingAction::StartService => Some(NotificationTemplate::ServiceStarted),
            BookingAction::CompleteService => Some(NotificationTemplate::ServiceComplete),
            BookingAction::MarkNoShow => Some(NotificationTemplate::MarkedNoShow { reason }),
            BookingAction::Cancel => None,
        };
        if let Some(template) = template {
            self.notify(booking.customer_id, booking.id, template).await;
        }

        let kind = match (action, &outcome.queue_entry) {
            (BookingAction::Confirm, Some(entry)) => QueueEventKind::Joined {
                position: entry.position,
                placement: Placement::Tail,
            },
            (BookingAction::StartService, Some(_)) => QueueEventKind::ServiceStarted,
            (
                BookingAction::CompleteService | BookingAction::MarkNoShow | BookingAction::Cancel,
                Some(_),
            ) => QueueEventKind::Left { reason: booking.status },
            _ => QueueEventKind::BookingStatusChanged { status: booking.status },
        };
        self.publish(booking, entry_id, kind).await;

        // Only a customer who just reached the head is told they are next
        if let (
            BookingAction::CompleteService | BookingAction::MarkNoShow,
            Some(next),
        ) = (action, promoted)
        {
            self.notify(next.customer_id, next.booking_id, NotificationTemplate::NextInLine)
                .await;
        }
    }

    /// Offset used to show local times to the salon's customers
    async fn utc_offset_of(&self, salon_id: Uuid) -> i32 {
        match self.store.find_salon(salon_id).await {
            Ok(salon) => salon.map_or(0, |s| s.utc_offset_minutes),
            Err(e) => {
                tracing::warn!("Could not read salon {} for its UTC offset: {}", salon_id, e);
                0
            }
        }
    }

    async fn notify(
        &self,
        customer_id: Option<Uuid>,
        booking_id: Uuid,
        template: NotificationTemplate,
    ) {
        // Walk-ins have nobody to address
        if let Some(customer_id) = customer_id {
            dispatch(self.notifier.as_ref(), template.render(customer_id, booking_id)).await;
        }
    }

    async fn publish(&self, booking: &Booking, entry_id: Option<Uuid>, kind: QueueEventKind) {
        self.events
            .publish(QueueEvent::new(booking.salon_id, booking.id, entry_id, kind))
            .await;
    }

    /// Re-run `attempt` after a lost queue race, up to `max_write_attempts` times
    async fn with_retry<T, F, Fut>(&self, mut attempt: F) -> BookingResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BookingResult<T>>,
    {
        let mut tries = 1;
        loop {
            match attempt().await {
                Err(BookingError::ConflictQueuePosition(detail))
                    if tries < self.settings.max_write_attempts =>
                {
                    tracing::debug!("Lost queue race (attempt {}): {}", tries, detail);
                    self.metrics.record_conflict_retry();
                    tries += 1;
                }
                result => return result,
            }
        }
    }

    async fn load_booking(&self, booking_id: Uuid) -> BookingResult<Booking> {
        self.store
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Booking", booking_id))
    }

    async fn load_salon(&self, salon_id: Uuid) -> BookingResult<Salon> {
        self.store
            .find_salon(salon_id)
            .await?
            .ok_or_else(|| BookingError::not_found("Salon", salon_id))
    }

    fn avg_for(&self, salon: &Salon) -> i32 {
        WaitTimeEstimator::effective_avg(
            salon.avg_service_time,
            self.settings.default_avg_service_minutes,
        )
    }

    async fn avg_for_salon(&self, salon_id: Uuid) -> BookingResult<i32> {
        let salon = self.store.find_salon(salon_id).await?;
        Ok(WaitTimeEstimator::effective_avg(
            salon.and_then(|s| s.avg_service_time),
            self.settings.default_avg_service_minutes,
        ))
    }
}
