use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use fittrack_core::models::{Habit, HabitLog, HabitType};
use fittrack_core::service::FitTrackService;

use super::helpers::{HabitRef, fmt_amount, parse_date, parse_habit_ref, print_json};

#[derive(Tabled)]
struct HabitRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Habit")]
    habit: &'static str,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Streak")]
    streak: i64,
    #[tabled(rename = "Best")]
    best: i64,
    #[tabled(rename = "Last logged")]
    last: String,
}

fn print_habit_table(habits: &[Habit], today: NaiveDate) {
    let rows: Vec<HabitRow> = habits
        .iter()
        .map(|h| HabitRow {
            id: h.id,
            habit: h.habit_type.label(),
            target: format!("{} {}", fmt_amount(h.target_value), h.unit),
            streak: h.active_streak(today),
            best: h.best_streak,
            last: h
                .last_logged_date
                .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d").to_string()),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..5)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

fn resolve_habit(svc: &FitTrackService, user: &str, habit: &str) -> Result<i64> {
    match parse_habit_ref(habit)? {
        HabitRef::Id(id) => Ok(id),
        HabitRef::Type(t) => Ok(svc.find_habit_by_type(user, t)?.id),
    }
}

pub(crate) fn cmd_habit_list(svc: &FitTrackService, user: &str, json: bool) -> Result<()> {
    let habits = svc.list_habits(user)?;

    if json {
        print_json(&habits)?;
    } else {
        print_habit_table(&habits, FitTrackService::today());
    }

    Ok(())
}

pub(crate) fn cmd_habit_add(
    svc: &FitTrackService,
    user: &str,
    habit_type: &str,
    target: f64,
    unit: &str,
    json: bool,
) -> Result<()> {
    let habit_type: HabitType = habit_type.parse()?;
    let habit = svc.add_habit(user, habit_type, target, unit)?;

    if json {
        print_json(&habit)?;
    } else {
        println!(
            "Added {} habit #{} (target {} {})",
            habit.habit_type,
            habit.id,
            fmt_amount(habit.target_value),
            habit.unit
        );
    }

    Ok(())
}

pub(crate) fn cmd_habit_log(
    svc: &FitTrackService,
    user: &str,
    habit: &str,
    value: f64,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let habit_id = resolve_habit(svc, user, habit)?;
    let date = parse_date(date)?;
    let outcome = svc.log_habit(user, habit_id, Some(date), value)?;

    if json {
        print_json(&outcome)?;
        return Ok(());
    }

    let h = &outcome.habit;
    let status = if h.is_completed_by(outcome.log.value) {
        "target met"
    } else {
        "below target"
    };
    println!(
        "Logged {} {} of {} for {} ({status})",
        fmt_amount(outcome.log.value),
        h.unit,
        h.habit_type,
        date.format("%Y-%m-%d"),
    );
    println!(
        "  Streak: {} day(s), best {}",
        h.current_streak, h.best_streak
    );
    if let Some(ref badge) = outcome.badge {
        println!("  New badge: {}! {}", badge.badge_name, badge.description);
    }

    Ok(())
}

pub(crate) fn cmd_habit_today(
    svc: &FitTrackService,
    user: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let habits = svc.list_habits(user)?;
    let logs = svc.get_habit_logs(user, Some(date))?;

    #[derive(Serialize)]
    struct DayStatus<'a> {
        habit: &'a Habit,
        log: Option<&'a HabitLog>,
        completed: bool,
    }

    let statuses: Vec<DayStatus> = habits
        .iter()
        .map(|h| {
            let log = logs.iter().find(|l| l.habit_id == h.id);
            DayStatus {
                habit: h,
                log,
                completed: log.is_some_and(|l| h.is_completed_by(l.value)),
            }
        })
        .collect();

    if json {
        return print_json(&statuses);
    }

    #[derive(Tabled)]
    struct DayRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Habit")]
        habit: &'static str,
        #[tabled(rename = "Logged")]
        logged: String,
        #[tabled(rename = "Target")]
        target: String,
        #[tabled(rename = "Done")]
        done: &'static str,
    }

    let rows: Vec<DayRow> = statuses
        .iter()
        .map(|s| DayRow {
            id: s.habit.id,
            habit: s.habit.habit_type.label(),
            logged: s
                .log
                .map_or_else(|| "-".to_string(), |l| fmt_amount(l.value)),
            target: format!("{} {}", fmt_amount(s.habit.target_value), s.habit.unit),
            done: if s.completed { "yes" } else { "" },
        })
        .collect();

    println!("{}", date.format("%A, %B %-d %Y"));
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_badges(svc: &FitTrackService, user: &str, json: bool) -> Result<()> {
    let badges = svc.list_badges(user)?;

    if json {
        print_json(&badges)?;
    } else if badges.is_empty() {
        eprintln!("No badges yet. Log a habit 3 days in a row to earn your first.");
    } else {
        #[derive(Tabled)]
        struct BadgeRow {
            #[tabled(rename = "Badge")]
            name: String,
            #[tabled(rename = "Habit")]
            habit_id: i64,
            #[tabled(rename = "Description")]
            description: String,
            #[tabled(rename = "Earned")]
            earned: String,
        }

        let rows: Vec<BadgeRow> = badges
            .iter()
            .map(|b| BadgeRow {
                name: b.badge_name.clone(),
                habit_id: b.habit_id,
                description: b.description.clone(),
                earned: b.earned_at.chars().take(10).collect(),
            })
            .collect();

        let table = Table::new(&rows).with(Style::rounded()).to_string();
        println!("{table}");
    }

    Ok(())
}
