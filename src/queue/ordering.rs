// Queue Ordering Engine
//
// Assigns and maintains queue positions for one salon. Every function here
// works on the full entry list of a single salon and must run inside the
// store's per-salon serialization boundary when the result is persisted.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::queue::{EntryChange, Placement, QueueEntry, QueueEntryStatus};

/// Service for assigning and retiring queue positions
pub struct QueueOrdering;

impl QueueOrdering {
    /// Active entries ordered by stored position
    pub fn ordered_active(entries: &[QueueEntry]) -> Vec<&QueueEntry> {
        let mut active: Vec<&QueueEntry> = entries.iter().filter(|e| e.is_active()).collect();
        active.sort_by_key(|e| e.position);
        active
    }

    /// Number of entries still holding a place in the queue
    pub fn active_count(entries: &[QueueEntry]) -> usize {
        entries.iter().filter(|e| e.is_active()).count()
    }

    /// Position for an entry joining at the tail
    ///
    /// `1 + max(active position)`, or 1 when nobody is queued.
    pub fn append_tail(entries: &[QueueEntry]) -> i32 {
        entries
            .iter()
            .filter(|e| e.is_active())
            .map(|e| e.position)
            .max()
            .map_or(1, |max| max + 1)
    }

    /// Make room at the head of the queue
    ///
    /// Shifts every active entry back by one and returns 1, the position the
    /// new entry takes. Completed entries keep their historical rank.
    pub fn insert_first(entries: &mut [QueueEntry]) -> i32 {
        for entry in entries.iter_mut().filter(|e| e.is_active()) {
            entry.position += 1;
        }
        1
    }

    /// Position `entry` according to `placement` and add it to the salon's entries
    ///
    /// Returns the placed entry.
    pub fn place(
        entries: &mut Vec<QueueEntry>,
        mut entry: QueueEntry,
        placement: Placement,
    ) -> QueueEntry {
        entry.position = match placement {
            Placement::Tail => Self::append_tail(entries),
            Placement::First => Self::insert_first(entries),
        };
        entries.push(entry.clone());
        entry
    }

    /// Move a waiting entry into service
    ///
    /// Returns `false` when the entry was not waiting (already in service or retired).
    pub fn start_service(entry: &mut QueueEntry, now: DateTime<Utc>) -> bool {
        if entry.status != QueueEntryStatus::Waiting {
            return false;
        }
        entry.status = QueueEntryStatus::InService;
        entry.service_start_time = Some(now);
        true
    }

    /// Take an entry out of the live queue without renumbering anyone else
    ///
    /// Returns `false` when the entry was already completed.
    pub fn retire(entry: &mut QueueEntry) -> bool {
        if !entry.is_active() {
            return false;
        }
        entry.status = QueueEntryStatus::Completed;
        entry.estimated_wait_minutes = 0;
        true
    }

    /// Apply a lifecycle-driven change to an entry
    pub fn apply(entry: &mut QueueEntry, change: EntryChange, now: DateTime<Utc>) -> bool {
        match change {
            EntryChange::StartService => Self::start_service(entry, now),
            EntryChange::FinishService => {
                let retired = Self::retire(entry);
                if retired {
                    entry.service_end_time = Some(now);
                }
                retired
            }
            EntryChange::Retire => Self::retire(entry),
        }
    }

    /// 1-based rank of an entry among active entries
    ///
    /// Counts active entries with a smaller stored position, so gaps left by
    /// retired entries do not inflate the rank.
    pub fn live_rank(entries: &[QueueEntry], entry_id: Uuid) -> Option<i32> {
        let target = entries.iter().find(|e| e.id == entry_id && e.is_active())?;
        let ahead = entries
            .iter()
            .filter(|e| e.is_active() && e.position < target.position)
            .count();
        Some(ahead as i32 + 1)
    }

    /// The entry at live rank 1 if it is still waiting
    pub fn next_in_line(entries: &[QueueEntry]) -> Option<&QueueEntry> {
        Self::ordered_active(entries)
            .into_iter()
            .next()
            .filter(|e| e.status == QueueEntryStatus::Waiting)
    }

    /// Id of the active entry at live rank 1, whatever its status
    pub fn head(entries: &[QueueEntry]) -> Option<Uuid> {
        Self::ordered_active(entries).first().map(|e| e.id)
    }

    /// The waiting entry that reached the head of the queue since `head_before`
    ///
    /// `None` when the head did not change, or the new head is already in service.
    pub fn promoted(head_before: Option<Uuid>, entries: &[QueueEntry]) -> Option<&QueueEntry> {
        Self::next_in_line(entries).filter(|next| Some(next.id) != head_before)
    }

    /// Check that active positions are positive and unique
    pub fn verify(entries: &[QueueEntry]) -> Result<(), String> {
        let active = Self::ordered_active(entries);
        for pair in active.windows(2) {
            if pair[0].position == pair[1].position {
                return Err(format!(
                    "Duplicate queue position {} (entries {} and {})",
                    pair[0].position, pair[0].id, pair[1].id
                ));
            }
        }
        if let Some(first) = active.first() {
            if first.position < 1 {
                return Err(format!("Non-positive queue position {}", first.position));
            }
        }
        Ok(())
    }
}
