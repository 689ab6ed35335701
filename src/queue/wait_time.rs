// Wait-Time Estimator
//
// Estimates minutes until service from a queue rank and the salon's average
// service time. Always fed the live rank (active entries ahead + 1), never the
// raw stored position, because stored positions do not compact.

use uuid::Uuid;

use crate::queue::{QueueEntry, QueueOrdering};

/// Fallback average service time in minutes
pub const DEFAULT_AVG_SERVICE_MINUTES: i32 = 30;

/// Service for wait-time estimation
pub struct WaitTimeEstimator;

impl WaitTimeEstimator {
    /// `max(0, (rank - 1) * avg_service_time)`
    pub fn estimate(rank: i32, avg_service_time: i32) -> i32 {
        if rank <= 1 || avg_service_time <= 0 {
            return 0;
        }
        (rank - 1).saturating_mul(avg_service_time)
    }

    /// Average service time to use for a salon
    ///
    /// Unset or non-positive values fall back to `default_minutes`.
    pub fn effective_avg(configured: Option<i32>, default_minutes: i32) -> i32 {
        match configured {
            Some(minutes) if minutes > 0 => minutes,
            _ => default_minutes,
        }
    }

    /// Estimated wait for one entry, `None` once it left the queue
    pub fn estimate_for(entries: &[QueueEntry], entry: &QueueEntry, avg_service_time: i32) -> Option<i32> {
        QueueOrdering::live_rank(entries, entry.id)
            .map(|rank| Self::estimate(rank, avg_service_time))
    }

    /// Rewrite the estimate snapshot of every entry after a queue mutation
    pub fn refresh(entries: &mut [QueueEntry], avg_service_time: i32) {
        let ranks: Vec<(Uuid, i32)> = QueueOrdering::ordered_active(entries)
            .iter()
            .enumerate()
            .map(|(idx, e)| (e.id, Self::estimate(idx as i32 + 1, avg_service_time)))
            .collect();

        for entry in entries.iter_mut() {
            entry.estimated_wait_minutes = ranks
                .iter()
                .find(|(id, _)| *id == entry.id)
                .map_or(0, |(_, minutes)| *minutes);
        }
    }
}
