//! UTC calendar-day windows.
//!
//! Feed, stats and winner queries are all scoped to the half-open interval
//! `[00:00 UTC, next 00:00 UTC)` containing the request time.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

/// A half-open `[start, end)` interval covering one UTC calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DayWindow {
    /// The window for the UTC day containing `instant`.
    #[must_use]
    pub fn containing(instant: DateTime<Utc>) -> Self {
        Self::for_date(instant.date_naive())
    }

    /// The window for a calendar date.
    #[must_use]
    pub fn for_date(date: NaiveDate) -> Self {
        let start = date.and_time(NaiveTime::MIN).and_utc();
        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    /// The window for the current UTC day.
    #[must_use]
    pub fn today() -> Self {
        Self::containing(Utc::now())
    }

    /// The window `days` calendar days before this one.
    #[must_use]
    pub fn days_before(&self, days: u32) -> Self {
        let start = self.start - Duration::days(i64::from(days));
        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    /// Inclusive start (midnight UTC).
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Exclusive end (next midnight UTC).
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Calendar date of the window.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    /// Whether `instant` falls inside the window.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// The instant the day's winner is announced (display only).
    #[must_use]
    pub fn announcement_at(&self, hour_utc: u32) -> DateTime<Utc> {
        self.start + Duration::hours(i64::from(hour_utc.min(23)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_containing_truncates_to_midnight() {
        let instant = Utc.with_ymd_and_hms(2025, 3, 10, 18, 45, 12).unwrap();
        let window = DayWindow::containing(instant);

        assert_eq!(window.start(), Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap());
        assert_eq!(window.end(), Utc.with_ymd_and_hms(2025, 3, 11, 0, 0, 0).unwrap());
        assert!(window.contains(instant));
    }

    #[test]
    fn test_boundaries_are_half_open() {
        let window = DayWindow::for_date(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());

        assert!(window.contains(window.start()));
        assert!(!window.contains(window.end()));
        assert!(!window.contains(window.start() - Duration::nanoseconds(1)));
    }

    #[test]
    fn test_days_before() {
        let window = DayWindow::for_date(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        let previous = window.days_before(1);

        assert_eq!(previous.date(), NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        assert_eq!(previous.end(), window.start());
    }

    #[test]
    fn test_announcement_at() {
        let window = DayWindow::for_date(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());

        assert_eq!(
            window.announcement_at(22),
            Utc.with_ymd_and_hms(2025, 3, 10, 22, 0, 0).unwrap()
        );
        assert_eq!(
            window.announcement_at(99),
            Utc.with_ymd_and_hms(2025, 3, 10, 23, 0, 0).unwrap()
        );
    }
}
