//! Monthly windows.
//!
//! A window spans `[first-of-month 00:00, last-of-month 23:59:59.999]` in the calendar of
//! the time zone it was built in, expressed as inclusive epoch-millisecond bounds. Every
//! aggregate and the budget monitor work in units of one window.

use crate::errors::{Error, Result};
use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, TimeDelta, TimeZone};

/// One calendar month as an inclusive millisecond range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonthWindow {
    /// Calendar month, 1 = January
    pub month: u32,
    /// Calendar year
    pub year: i32,
    /// First millisecond of the month
    pub start_ms: i64,
    /// Last millisecond of the month
    pub end_ms: i64,
}

/// Epoch milliseconds of local midnight on `date`. When midnight does not exist (a DST
/// jump at 00:00) the first instant of the day is used; when it is ambiguous, the earlier.
#[must_use]
pub fn local_midnight_ms<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> i64 {
    let midnight = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(midnight + TimeDelta::hours(1)))
                .earliest()
        })
        .map_or_else(
            || midnight.and_utc().timestamp_millis(),
            |instant| instant.timestamp_millis(),
        )
}

impl MonthWindow {
    /// The month containing `instant`, in `instant`'s own time zone.
    #[must_use]
    pub fn containing<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self {
        let date = instant.date_naive();
        let first = date.with_day(1).unwrap_or(date);
        Self::starting_on(&instant.timezone(), first)
    }

    /// An explicit month in `tz`.
    pub fn for_month<Tz: TimeZone>(tz: &Tz, month: u32, year: i32) -> Result<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(Error::InvalidPeriod {
            month: i32::try_from(month).unwrap_or(i32::MAX),
            year,
        })?;
        Ok(Self::starting_on(tz, first))
    }

    fn starting_on<Tz: TimeZone>(tz: &Tz, first: NaiveDate) -> Self {
        let next = first
            .checked_add_months(Months::new(1))
            .unwrap_or(NaiveDate::MAX);
        Self {
            month: first.month(),
            year: first.year(),
            start_ms: local_midnight_ms(tz, first),
            end_ms: local_midnight_ms(tz, next) - 1,
        }
    }

    fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// The following month.
    #[must_use]
    pub fn next<Tz: TimeZone>(&self, tz: &Tz) -> Self {
        let first = self.first_day();
        Self::starting_on(tz, first.checked_add_months(Months::new(1)).unwrap_or(first))
    }

    /// The preceding month.
    #[must_use]
    pub fn previous<Tz: TimeZone>(&self, tz: &Tz) -> Self {
        let first = self.first_day();
        Self::starting_on(tz, first.checked_sub_months(Months::new(1)).unwrap_or(first))
    }

    /// Whether `date_ms` falls inside the window, bounds included.
    #[must_use]
    pub const fn contains(&self, date_ms: i64) -> bool {
        self.start_ms <= date_ms && date_ms <= self.end_ms
    }

    /// The `(month, year)` key budgets are stored under.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn budget_key(&self) -> (i32, i32) {
        (self.month as i32, self.year)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{utc, utc_ms};
    use chrono::{FixedOffset, Utc};

    #[test]
    fn test_window_bounds_utc() {
        let window = MonthWindow::containing(&utc(2024, 2, 14, 13, 45));

        assert_eq!(window.month, 2);
        assert_eq!(window.year, 2024);
        assert_eq!(window.start_ms, utc_ms(2024, 2, 1, 0, 0));
        // Leap year: February has 29 days
        assert_eq!(window.end_ms, utc_ms(2024, 3, 1, 0, 0) - 1);
        assert_eq!(window.budget_key(), (2, 2024));
    }

    #[test]
    fn test_window_contains_is_inclusive() {
        let window = MonthWindow::for_month(&Utc, 6, 2025).unwrap();
        assert!(window.contains(window.start_ms));
        assert!(window.contains(window.end_ms));
        assert!(!window.contains(window.start_ms - 1));
        assert!(!window.contains(window.end_ms + 1));
    }

    #[test]
    fn test_window_uses_callers_calendar() {
        // 23:30 UTC on Jan 31 is already February 1st at UTC+2
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let instant = utc(2025, 1, 31, 23, 30).with_timezone(&plus_two);

        let window = MonthWindow::containing(&instant);
        assert_eq!(window.month, 2);
        assert_eq!(window.start_ms, utc_ms(2025, 1, 31, 22, 0));
    }

    #[test]
    fn test_december_rolls_into_next_year() {
        let december = MonthWindow::for_month(&Utc, 12, 2024).unwrap();
        assert_eq!(december.end_ms, utc_ms(2025, 1, 1, 0, 0) - 1);

        let january = december.next(&Utc);
        assert_eq!((january.month, january.year), (1, 2025));
        assert_eq!(january.previous(&Utc), december);
    }

    #[test]
    fn test_local_midnight_lands_on_requested_day() {
        let minus_five = FixedOffset::west_opt(5 * 3600).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();

        let ms = local_midnight_ms(&minus_five, date);
        assert_eq!(ms, utc_ms(2025, 3, 9, 5, 0));
        let window = MonthWindow::for_month(&minus_five, 3, 2025).unwrap();
        assert!(window.contains(ms));
    }

    #[test]
    fn test_invalid_month_rejected() {
        assert!(matches!(
            MonthWindow::for_month(&Utc, 13, 2025),
            Err(Error::InvalidPeriod { month: 13, year: 2025 })
        ));
    }
}
