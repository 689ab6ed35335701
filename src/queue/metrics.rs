// Engine metrics
//
// Counts lifecycle and queue operations, their execution time, slow calls
// and conflict retries, so hot salons and lock contention show up in the logs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use utoipa::ToSchema;

/// Operations slower than this are logged at warn
const SLOW_OPERATION_THRESHOLD_MS: u64 = 100;

/// Engine operation being timed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOperation {
    CreateBooking,
    ConfirmBooking,
    RejectBooking,
    AddWalkIn,
    StartService,
    CompleteService,
    MarkNoShow,
    CancelBooking,
    QueueView,
    TrackBooking,
}

impl EngineOperation {
    pub const ALL: [EngineOperation; 10] = [
        EngineOperation::CreateBooking,
        EngineOperation::ConfirmBooking,
        EngineOperation::RejectBooking,
        EngineOperation::AddWalkIn,
        EngineOperation::StartService,
        EngineOperation::CompleteService,
        EngineOperation::MarkNoShow,
        EngineOperation::CancelBooking,
        EngineOperation::QueueView,
        EngineOperation::TrackBooking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineOperation::CreateBooking => "create_booking",
            EngineOperation::ConfirmBooking => "confirm_booking",
            EngineOperation::RejectBooking => "reject_booking",
            EngineOperation::AddWalkIn => "add_walk_in",
            EngineOperation::StartService => "start_service",
            EngineOperation::CompleteService => "complete_service",
            EngineOperation::MarkNoShow => "mark_no_show",
            EngineOperation::CancelBooking => "cancel_booking",
            EngineOperation::QueueView => "queue_view",
            EngineOperation::TrackBooking => "track_booking",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Default)]
struct OperationStats {
    count: AtomicU64,
    total_time_us: AtomicU64,
    slow: AtomicU64,
}

#[derive(Debug, Default)]
struct MetricsInner {
    operations: [OperationStats; 10],
    conflict_retries: AtomicU64,
}

/// Shared, cheaply cloneable metrics handle
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    inner: Arc<MetricsInner>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing an operation; the duration is recorded when the timer drops
    pub fn start(&self, operation: EngineOperation) -> OperationTimer {
        OperationTimer {
            start: Instant::now(),
            operation,
            metrics: self.clone(),
        }
    }

    /// Record one re-read-and-retry after a lost queue race
    pub fn record_conflict_retry(&self) {
        self.inner.conflict_retries.fetch_add(1, Ordering::Relaxed);
    }

    fn record(&self, operation: EngineOperation, duration: Duration) {
        let stats = &self.inner.operations[operation.index()];
        stats.count.fetch_add(1, Ordering::Relaxed);
        stats
            .total_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        if duration.as_millis() as u64 > SLOW_OPERATION_THRESHOLD_MS {
            stats.slow.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Slow {}: {}ms", operation.as_str(), duration.as_millis());
        }
    }

    pub fn count(&self, operation: EngineOperation) -> u64 {
        self.inner.operations[operation.index()]
            .count
            .load(Ordering::Relaxed)
    }

    pub fn conflict_retries(&self) -> u64 {
        self.inner.conflict_retries.load(Ordering::Relaxed)
    }

    /// Get metrics summary
    pub fn summary(&self) -> MetricsSummary {
        let operations = EngineOperation::ALL
            .iter()
            .map(|op| {
                let stats = &self.inner.operations[op.index()];
                let count = stats.count.load(Ordering::Relaxed);
                let total_us = stats.total_time_us.load(Ordering::Relaxed);
                OperationSummary {
                    operation: op.as_str().to_string(),
                    count,
                    avg_time_ms: if count == 0 {
                        0.0
                    } else {
                        (total_us as f64 / count as f64) / 1000.0
                    },
                    slow: stats.slow.load(Ordering::Relaxed),
                }
            })
            .collect();

        MetricsSummary {
            operations,
            conflict_retries: self.conflict_retries(),
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        let summary = self.summary();
        for op in summary.operations.iter().filter(|op| op.count > 0) {
            tracing::info!(
                "{}: {} calls, avg {:.2}ms, {} slow",
                op.operation,
                op.count,
                op.avg_time_ms,
                op.slow
            );
        }
        tracing::info!("Queue conflict retries: {}", summary.conflict_retries);
    }
}

/// Times one operation and records it on drop
pub struct OperationTimer {
    start: Instant,
    operation: EngineOperation,
    metrics: EngineMetrics,
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        self.metrics.record(self.operation, self.start.elapsed());
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OperationSummary {
    pub operation: String,
    pub count: u64,
    pub avg_time_ms: f64,
    pub slow: u64,
}

/// Metrics snapshot served by `GET /api/metrics`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MetricsSummary {
    pub operations: Vec<OperationSummary>,
    pub conflict_retries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_records_once_on_drop() {
        let metrics = EngineMetrics::new();
        {
            let _timer = metrics.start(EngineOperation::ConfirmBooking);
        }
        assert_eq!(metrics.count(EngineOperation::ConfirmBooking), 1);
        assert_eq!(metrics.count(EngineOperation::CreateBooking), 0);
    }

    #[test]
    fn test_conflict_retries() {
        let metrics = EngineMetrics::new();
        metrics.record_conflict_retry();
        metrics.record_conflict_retry();
        assert_eq!(metrics.conflict_retries(), 2);
        assert_eq!(metrics.summary().conflict_retries, 2);
    }

    #[test]
    fn test_slow_operation_counted() {
        let metrics = EngineMetrics::new();
        metrics.record(EngineOperation::AddWalkIn, Duration::from_millis(250));
        metrics.record(EngineOperation::AddWalkIn, Duration::from_millis(5));

        let summary = metrics.summary();
        let walk_ins = summary
            .operations
            .iter()
            .find(|op| op.operation == "add_walk_in")
            .unwrap();
        assert_eq!(walk_ins.count, 2);
        assert_eq!(walk_ins.slow, 1);
        assert!(walk_ins.avg_time_ms > 100.0);
    }

    #[test]
    fn test_summary_lists_every_operation() {
        let metrics = EngineMetrics::new();
        assert_eq!(metrics.summary().operations.len(), EngineOperation::ALL.len());
    }
}
