use anyhow::Result;

use crate::db::Database;
use crate::models::Badge;

/// A streak length that earns a one-time badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milestone {
    pub days: i64,
    pub badge_type: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const MILESTONES: &[Milestone] = &[
    Milestone {
        days: 3,
        badge_type: "streak_3",
        name: "3-Day Streak",
        description: "Logged a habit 3 days in a row",
    },
    Milestone {
        days: 7,
        badge_type: "streak_7",
        name: "Week Warrior",
        description: "Logged a habit 7 days in a row",
    },
    Milestone {
        days: 30,
        badge_type: "streak_30",
        name: "Monthly Master",
        description: "Logged a habit 30 days in a row",
    },
];

/// The milestone reached on exactly this streak length, if any.
///
/// Awards trigger on equality rather than `>=`: a streak grows by at most one
/// per log, so every threshold is hit exactly once on the way up.
#[must_use]
pub fn milestone_for(streak: i64) -> Option<&'static Milestone> {
    MILESTONES.iter().find(|m| m.days == streak)
}

/// Grant the milestone badge for `new_streak` unless the user already holds it
/// for this habit. Returns the badge only when it was created by this call.
pub fn award_if_eligible(
    db: &Database,
    user_id: &str,
    habit_id: i64,
    new_streak: i64,
) -> Result<Option<Badge>> {
    let Some(milestone) = milestone_for(new_streak) else {
        return Ok(None);
    };
    let badge = db.insert_badge_if_absent(user_id, habit_id, milestone)?;
    if let Some(ref b) = badge {
        tracing::info!(user_id, habit_id, badge_type = %b.badge_type, "badge earned");
    }
    Ok(badge)
}
