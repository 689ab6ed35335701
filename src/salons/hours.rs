// Business-hours gate
//
// Decides whether a salon may take new bookings or walk-ins at a given instant.
// The engine treats the answer as an opaque precondition.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};

use crate::salons::{BusinessHours, Salon};

/// Opening-hours collaborator consulted before Create and before walk-ins
pub trait BusinessHoursGate: Send + Sync {
    fn is_within_hours(&self, salon: &Salon, now: DateTime<Utc>) -> bool;
}

/// Gate that never closes
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOpen;

impl BusinessHoursGate for AlwaysOpen {
    fn is_within_hours(&self, _salon: &Salon, _now: DateTime<Utc>) -> bool {
        true
    }
}

/// Gate driven by the salon's own weekly schedule
///
/// A salon without any configured windows is treated as unrestricted.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeeklyScheduleGate;

impl WeeklyScheduleGate {
    fn window_contains(window: &BusinessHours, time: NaiveTime) -> bool {
        if window.open < window.close {
            time >= window.open && time < window.close
        } else {
            // Overnight: the tail before midnight belongs to this weekday
            time >= window.open
        }
    }

    fn overnight_tail_contains(window: &BusinessHours, time: NaiveTime) -> bool {
        window.close <= window.open && time < window.close
    }
}

impl BusinessHoursGate for WeeklyScheduleGate {
    fn is_within_hours(&self, salon: &Salon, now: DateTime<Utc>) -> bool {
        let schedule = &salon.business_hours.0;
        if schedule.is_empty() {
            return true;
        }

        let local = now.naive_utc() + Duration::minutes(salon.utc_offset_minutes as i64);
        let today = local.weekday();
        let yesterday = today.pred();
        let time = local.time();

        schedule.iter().any(|window| {
            (window.weekday == today && Self::window_contains(window, time))
                || (window.weekday == yesterday && Self::overnight_tail_contains(window, time))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn salon_with(hours: Vec<BusinessHours>, offset: i32) -> Salon {
        let mut salon = Salon::new("Test Salon").with_business_hours(hours);
        salon.utc_offset_minutes = offset;
        salon
    }

    // 2024-06-03 is a Monday
    fn monday_at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, h, m, 0).unwrap()
    }

    #[test]
    fn test_empty_schedule_is_open() {
        let salon = salon_with(vec![], 0);
        assert!(WeeklyScheduleGate.is_within_hours(&salon, monday_at(3, 0)));
    }

    #[test]
    fn test_regular_window() {
        let salon = salon_with(
            vec![BusinessHours {
                weekday: Weekday::Mon,
                open: hm(9, 0),
                close: hm(18, 0),
            }],
            0,
        );

        assert!(!WeeklyScheduleGate.is_within_hours(&salon, monday_at(8, 59)));
        assert!(WeeklyScheduleGate.is_within_hours(&salon, monday_at(9, 0)));
        assert!(WeeklyScheduleGate.is_within_hours(&salon, monday_at(17, 59)));
        assert!(!WeeklyScheduleGate.is_within_hours(&salon, monday_at(18, 0)));
    }

    #[test]
    fn test_other_weekday_is_closed() {
        let salon = salon_with(
            vec![BusinessHours {
                weekday: Weekday::Tue,
                open: hm(9, 0),
                close: hm(18, 0),
            }],
            0,
        );
        assert!(!WeeklyScheduleGate.is_within_hours(&salon, monday_at(12, 0)));
    }

    #[test]
    fn test_utc_offset_is_applied() {
        // 09:00-18:00 local at UTC+3 is 06:00-15:00 UTC
        let salon = salon_with(
            vec![BusinessHours {
                weekday: Weekday::Mon,
                open: hm(9, 0),
                close: hm(18, 0),
            }],
            180,
        );
        assert!(WeeklyScheduleGate.is_within_hours(&salon, monday_at(6, 30)));
        assert!(!WeeklyScheduleGate.is_within_hours(&salon, monday_at(15, 30)));
    }

    #[test]
    fn test_overnight_window() {
        // Sunday 20:00 until Monday 02:00
        let salon = salon_with(
            vec![BusinessHours {
                weekday: Weekday::Sun,
                open: hm(20, 0),
                close: hm(2, 0),
            }],
            0,
        );
        assert!(WeeklyScheduleGate.is_within_hours(&salon, monday_at(1, 30)));
        assert!(!WeeklyScheduleGate.is_within_hours(&salon, monday_at(2, 30)));
    }

    #[test]
    fn test_always_open() {
        let salon = salon_with(vec![], 0);
        assert!(AlwaysOpen.is_within_hours(&salon, monday_at(0, 0)));
    }
}
