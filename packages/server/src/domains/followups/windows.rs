//! Time windows of the daily follow-up jobs.

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};

/// `[now - (days + 1)d, now - days d)`. On Mondays the lower bound moves two
/// more days back so sends from the weekend are still picked up.
pub fn reminder_window(now: DateTime<Utc>, days: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    let until = now - Duration::days(days);
    let mut from = now - Duration::days(days + 1);
    if now.weekday() == Weekday::Mon {
        from -= Duration::days(2);
    }
    (from, until)
}

pub fn is_weekday(now: DateTime<Utc>) -> bool {
    !matches!(now.weekday(), Weekday::Sat | Weekday::Sun)
}
