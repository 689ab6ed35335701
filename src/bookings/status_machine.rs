use crate::bookings::BookingStatus;
use crate::error::{BookingError, BookingResult};

/// Lifecycle operation requested on a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingAction {
    Confirm,
    Reject,
    StartService,
    CompleteService,
    MarkNoShow,
    Cancel,
}

impl BookingAction {
    pub const ALL: [BookingAction; 6] = [
        BookingAction::Confirm,
        BookingAction::Reject,
        BookingAction::StartService,
        BookingAction::CompleteService,
        BookingAction::MarkNoShow,
        BookingAction::Cancel,
    ];

    /// Status the booking ends up in
    pub fn target(&self) -> BookingStatus {
        match self {
            BookingAction::Confirm => BookingStatus::Confirmed,
            BookingAction::Reject => BookingStatus::Rejected,
            BookingAction::StartService => BookingStatus::InProgress,
            BookingAction::CompleteService => BookingStatus::Completed,
            BookingAction::MarkNoShow | BookingAction::Cancel => BookingStatus::Cancelled,
        }
    }

    /// Statuses the action may be applied from
    pub fn allowed_from(&self) -> &'static [BookingStatus] {
        match self {
            BookingAction::Confirm | BookingAction::Reject => &[BookingStatus::Pending],
            BookingAction::StartService => &[BookingStatus::Confirmed],
            BookingAction::CompleteService => {
                &[BookingStatus::Confirmed, BookingStatus::InProgress]
            }
            BookingAction::MarkNoShow | BookingAction::Cancel => {
                &[BookingStatus::Pending, BookingStatus::Confirmed]
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingAction::Confirm => "confirm",
            BookingAction::Reject => "reject",
            BookingAction::StartService => "start service for",
            BookingAction::CompleteService => "complete",
            BookingAction::MarkNoShow => "mark as no-show",
            BookingAction::Cancel => "cancel",
        }
    }
}

/// Outcome of validating an action against the current status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Write `to`; the stored status must still be `from`
    Apply { from: BookingStatus, to: BookingStatus },
    /// The booking is already where the action would take it
    AlreadySatisfied,
}

/// Service for managing booking status transitions
pub struct StatusMachine;

impl StatusMachine {
    /// Check if a status transition is valid
    ///
    /// # Valid Transitions
    /// - Pending → Confirmed, Rejected, Cancelled
    /// - Confirmed → InProgress, Completed, Cancelled
    /// - InProgress → Completed
    /// - Completed, Cancelled, Rejected → (terminal)
    /// - Any status → Same status (idempotent)
    pub fn is_valid_transition(from: BookingStatus, to: BookingStatus) -> bool {
        if from == to {
            return true;
        }

        match (from, to) {
            // From Pending
            (BookingStatus::Pending, BookingStatus::Confirmed) => true,
            (BookingStatus::Pending, BookingStatus::Rejected) => true,
            (BookingStatus::Pending, BookingStatus::Cancelled) => true,

            // From Confirmed
            (BookingStatus::Confirmed, BookingStatus::InProgress) => true,
            (BookingStatus::Confirmed, BookingStatus::Completed) => true,
            (BookingStatus::Confirmed, BookingStatus::Cancelled) => true,

            // From InProgress
            (BookingStatus::InProgress, BookingStatus::Completed) => true,

            // Terminal states never move
            _ => false,
        }
    }

    /// Validate `action` against the booking's `current` status
    ///
    /// Returns `AlreadySatisfied` when `current` is the action's target, so
    /// duplicate requests are no-ops rather than errors.
    pub fn check(action: BookingAction, current: BookingStatus) -> BookingResult<Transition> {
        if action.allowed_from().contains(&current) {
            return Ok(Transition::Apply {
                from: current,
                to: action.target(),
            });
        }

        if current == action.target() {
            return Ok(Transition::AlreadySatisfied);
        }

        Err(BookingError::InvalidTransition(format!(
            "cannot {} a {} booking",
            action.as_str(),
            current
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(action: BookingAction, from: BookingStatus) -> Transition {
        StatusMachine::check(action, from).unwrap()
    }

    #[test]
    fn test_pending_transitions() {
        assert_eq!(
            apply(BookingAction::Confirm, BookingStatus::Pending),
            Transition::Apply { from: BookingStatus::Pending, to: BookingStatus::Confirmed }
        );
        assert_eq!(
            apply(BookingAction::Reject, BookingStatus::Pending),
            Transition::Apply { from: BookingStatus::Pending, to: BookingStatus::Rejected }
        );
        assert_eq!(
            apply(BookingAction::Cancel, BookingStatus::Pending),
            Transition::Apply { from: BookingStatus::Pending, to: BookingStatus::Cancelled }
        );
    }

    #[test]
    fn test_complete_from_confirmed_or_in_progress() {
        for from in [BookingStatus::Confirmed, BookingStatus::InProgress] {
            assert_eq!(
                apply(BookingAction::CompleteService, from),
                Transition::Apply { from, to: BookingStatus::Completed }
            );
        }
    }

    #[test]
    fn test_complete_from_pending_is_invalid() {
        let err = StatusMachine::check(BookingAction::CompleteService, BookingStatus::Pending)
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidTransition(_)));
        assert_eq!(
            err.to_string(),
            "Invalid status transition: cannot complete a pending booking"
        );
    }

    #[test]
    fn test_repeated_action_is_already_satisfied() {
        assert_eq!(
            apply(BookingAction::CompleteService, BookingStatus::Completed),
            Transition::AlreadySatisfied
        );
        assert_eq!(
            apply(BookingAction::StartService, BookingStatus::InProgress),
            Transition::AlreadySatisfied
        );
        assert_eq!(
            apply(BookingAction::Confirm, BookingStatus::Confirmed),
            Transition::AlreadySatisfied
        );
    }

    #[test]
    fn test_terminal_states_reject_other_actions() {
        for action in [BookingAction::Confirm, BookingAction::StartService, BookingAction::Cancel] {
            assert!(StatusMachine::check(action, BookingStatus::Rejected).is_err());
        }
        assert!(StatusMachine::check(BookingAction::Cancel, BookingStatus::InProgress).is_err());
        assert!(StatusMachine::check(BookingAction::Reject, BookingStatus::Confirmed).is_err());
    }

    #[test]
    fn test_table_agrees_with_pairs() {
        for action in BookingAction::ALL {
            for from in action.allowed_from() {
                assert!(
                    StatusMachine::is_valid_transition(*from, action.target()),
                    "{:?} from {} must be a valid pair",
                    action,
                    from
                );
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_exit() {
        for from in [BookingStatus::Completed, BookingStatus::Cancelled, BookingStatus::Rejected] {
            for to in BookingStatus::ALL {
                assert_eq!(StatusMachine::is_valid_transition(from, to), from == to);
            }
        }
    }
}
