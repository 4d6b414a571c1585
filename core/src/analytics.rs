use chrono::{Datelike, Duration, NaiveDate};

use crate::models::{
    CompletionRate, DayActivity, HabitAnalytics, HabitLogRecord, HabitType, WeekActivity,
};

/// How far back analytics look, in days before today.
pub const WINDOW_DAYS: i64 = 30;

/// First date included in the analytics window for `today`.
#[must_use]
pub fn window_start(today: NaiveDate) -> NaiveDate {
    today - Duration::days(WINDOW_DAYS)
}

fn is_completed(record: &HabitLogRecord) -> bool {
    record.value >= record.target_value
}

/// One bucket per day for the seven days ending `today`, oldest first.
#[must_use]
pub fn weekly(records: &[HabitLogRecord], today: NaiveDate) -> Vec<DayActivity> {
    (0..7)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            let day_logs: Vec<&HabitLogRecord> =
                records.iter().filter(|r| r.date == date).collect();
            DayActivity {
                date,
                day: date.format("%a").to_string(),
                completed: day_logs.iter().filter(|r| is_completed(r)).count() as i64,
                logged: day_logs.len() as i64,
            }
        })
        .collect()
}

/// Four Sunday-start calendar weeks ending with the week containing `today`,
/// labelled "Week 1" (oldest) to "Week 4".
#[must_use]
pub fn monthly(records: &[HabitLogRecord], today: NaiveDate) -> Vec<WeekActivity> {
    let current_start = today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));

    (0..4)
        .map(|i| {
            let start = current_start - Duration::weeks(3 - i);
            let end = start + Duration::days(6);
            let week_logs: Vec<&HabitLogRecord> = records
                .iter()
                .filter(|r| r.date >= start && r.date <= end)
                .collect();
            WeekActivity {
                week: format!("Week {}", i + 1),
                start,
                end,
                completed: week_logs.iter().filter(|r| is_completed(r)).count() as i64,
                total: week_logs.len() as i64,
            }
        })
        .collect()
}

/// Completion rate per habit type, in the order each type first appears.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn completion(records: &[HabitLogRecord]) -> Vec<CompletionRate> {
    let mut stats: Vec<(HabitType, i64, i64)> = Vec::new();
    for record in records {
        let idx = if let Some(idx) = stats.iter().position(|(t, _, _)| *t == record.habit_type) {
            idx
        } else {
            stats.push((record.habit_type, 0, 0));
            stats.len() - 1
        };
        let entry = &mut stats[idx];
        entry.2 += 1;
        if is_completed(record) {
            entry.1 += 1;
        }
    }

    stats
        .into_iter()
        .map(|(habit_type, completed, total)| CompletionRate {
            name: habit_type.label().to_string(),
            value: if total > 0 {
                (completed as f64 / total as f64 * 100.0).round() as i64
            } else {
                0
            },
            completed,
            total,
        })
        .collect()
}

#[must_use]
pub fn summarize(records: &[HabitLogRecord], today: NaiveDate) -> HabitAnalytics {
    HabitAnalytics {
        weekly: weekly(records, today),
        monthly: monthly(records, today),
        completion: completion(records),
    }
}
