use chrono::NaiveDate;
use serde::Serialize;

/// Streak counters after a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreakUpdate {
    pub current_streak: i64,
    pub best_streak: i64,
}

/// Compute a habit's streak counters after a log on `today`.
///
/// A log the day after the previous one extends the chain, a second log on the
/// same day leaves it alone, and anything else (a gap of two or more days, or
/// no previous log) starts a new chain at 1. The best streak never drops below
/// the current one.
#[must_use]
pub fn evaluate(
    current_streak: i64,
    best_streak: i64,
    last_logged_date: Option<NaiveDate>,
    today: NaiveDate,
) -> StreakUpdate {
    let yesterday = today.pred_opt();

    let current = match last_logged_date {
        Some(last) if Some(last) == yesterday => current_streak + 1,
        Some(last) if last == today => current_streak,
        _ => 1,
    };

    StreakUpdate {
        current_streak: current,
        best_streak: current.max(best_streak),
    }
}
