use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::analytics;
use crate::db::Database;
use crate::generation::{self, PlanGenerator, PlanKind};
use crate::models::{
    Badge, GenerationProfile, Habit, HabitAnalytics, HabitLog, HabitLogOutcome, HabitType,
    MealPlan, NewHabit, Profile, SavedMeal, SavedWorkout, UpdateProfile, WeightEntry, WeightTrend,
    WorkoutPlan, days_before, validate_user_id,
};

/// A generated workout and, when requested, its saved history row.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedWorkout {
    pub plan: WorkoutPlan,
    pub saved: Option<SavedWorkout>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedMealPlan {
    pub plan: MealPlan,
    pub saved: Vec<SavedMeal>,
}

pub struct FitTrackService {
    db: Database,
}

impl FitTrackService {
    pub fn new(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    /// Hand the underlying database to a caller that manages its own locking.
    #[must_use]
    pub fn into_database(self) -> Database {
        self.db
    }

    #[must_use]
    pub fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    // --- Profile ---

    pub fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        validate_user_id(user_id)?;
        self.db.get_profile(user_id)
    }

    pub fn update_profile(&self, user_id: &str, update: &UpdateProfile) -> Result<Profile> {
        validate_user_id(user_id)?;
        if update.is_empty() {
            bail!("Nothing to update");
        }
        self.db.upsert_profile(user_id, update)
    }

    /// The stored profile as generation input, or an error naming what is missing.
    pub fn generation_profile(&self, user_id: &str) -> Result<GenerationProfile> {
        let profile = self
            .get_profile(user_id)?
            .context("No profile found. Set gender, age, weight and goal first")?;
        profile.generation_profile().context(
            "Profile is incomplete: gender, age, weight and goal are required for plan generation",
        )
    }

    // --- Habits ---

    pub fn list_habits(&self, user_id: &str) -> Result<Vec<Habit>> {
        validate_user_id(user_id)?;
        self.db.ensure_default_habits(user_id)
    }

    pub fn add_habit(
        &self,
        user_id: &str,
        habit_type: HabitType,
        target_value: f64,
        unit: &str,
    ) -> Result<Habit> {
        validate_user_id(user_id)?;
        self.db.insert_habit(
            user_id,
            &NewHabit {
                habit_type,
                target_value,
                unit: unit.to_string(),
            },
        )
    }

    /// Resolve a habit by type for users who name habits instead of ids.
    /// Fails when the user has zero or several habits of that type.
    pub fn find_habit_by_type(&self, user_id: &str, habit_type: HabitType) -> Result<Habit> {
        let mut matches: Vec<Habit> = self
            .list_habits(user_id)?
            .into_iter()
            .filter(|h| h.habit_type == habit_type)
            .collect();
        match matches.len() {
            0 => bail!("No {habit_type} habit found"),
            1 => Ok(matches.remove(0)),
            n => bail!("{n} {habit_type} habits found; use the habit id instead"),
        }
    }

    pub fn log_habit(
        &self,
        user_id: &str,
        habit_id: i64,
        date: Option<NaiveDate>,
        value: f64,
    ) -> Result<HabitLogOutcome> {
        validate_user_id(user_id)?;
        let date = date.unwrap_or_else(Self::today);
        self.db.log_habit(user_id, habit_id, date, value)
    }

    pub fn get_habit_logs(&self, user_id: &str, date: Option<NaiveDate>) -> Result<Vec<HabitLog>> {
        validate_user_id(user_id)?;
        self.db
            .get_habit_logs_for_date(user_id, date.unwrap_or_else(Self::today))
    }

    pub fn list_badges(&self, user_id: &str) -> Result<Vec<Badge>> {
        validate_user_id(user_id)?;
        self.db.list_badges(user_id)
    }

    pub fn analytics(&self, user_id: &str, today: NaiveDate) -> Result<HabitAnalytics> {
        validate_user_id(user_id)?;
        let records = self
            .db
            .get_habit_log_records_since(user_id, analytics::window_start(today))?;
        Ok(analytics::summarize(&records, today))
    }

    // --- Weight ---

    pub fn log_weight(
        &self,
        user_id: &str,
        date: Option<NaiveDate>,
        weight_kg: f64,
    ) -> Result<WeightEntry> {
        validate_user_id(user_id)?;
        self.db
            .upsert_weight(user_id, date.unwrap_or_else(Self::today), weight_kg)
    }

    pub fn get_weight(&self, user_id: &str, date: NaiveDate) -> Result<Option<WeightEntry>> {
        validate_user_id(user_id)?;
        self.db.get_weight(user_id, date)
    }

    /// Entries from the last `days` days (all when `None` or when the window
    /// reaches past the calendar range), oldest first.
    pub fn get_weight_history(&self, user_id: &str, days: Option<i64>) -> Result<Vec<WeightEntry>> {
        validate_user_id(user_id)?;
        let since = match days {
            Some(n) if n < 0 => bail!("days must not be negative"),
            Some(n) => days_before(Self::today(), n),
            None => None,
        };
        self.db.get_weight_history(user_id, since)
    }

    pub fn delete_weight(&self, user_id: &str, id: i64) -> Result<()> {
        validate_user_id(user_id)?;
        self.db.delete_weight(user_id, id)
    }

    pub fn weight_trend(&self, user_id: &str) -> Result<Option<WeightTrend>> {
        let history = self.get_weight_history(user_id, None)?;
        let baseline = self.get_profile(user_id)?.and_then(|p| p.weight_kg);
        Ok(WeightTrend::from_history(&history, baseline))
    }

    // --- Plan generation ---

    pub fn generate_workout(
        &self,
        provider: &dyn PlanGenerator,
        user_id: &str,
        save: bool,
    ) -> Result<GeneratedWorkout> {
        let profile = self.generation_profile(user_id)?;
        tracing::info!(user_id, kind = PlanKind::Workout.as_str(), "generating plan");
        let value = provider.generate(PlanKind::Workout, &profile)?;
        let plan = generation::workout_from_value(value)?;
        let saved = if save {
            Some(self.db.insert_workout(user_id, &plan)?)
        } else {
            None
        };
        Ok(GeneratedWorkout { plan, saved })
    }

    pub fn generate_meal_plan(
        &self,
        provider: &dyn PlanGenerator,
        user_id: &str,
        save: bool,
    ) -> Result<GeneratedMealPlan> {
        let profile = self.generation_profile(user_id)?;
        tracing::info!(user_id, kind = PlanKind::MealPlan.as_str(), "generating plan");
        let value = provider.generate(PlanKind::MealPlan, &profile)?;
        let plan = generation::meal_plan_from_value(value)?;
        let saved = if save {
            self.db.insert_meals(user_id, &plan.meals)?
        } else {
            Vec::new()
        };
        Ok(GeneratedMealPlan { plan, saved })
    }

    pub fn list_workouts(&self, user_id: &str, limit: i64) -> Result<Vec<SavedWorkout>> {
        validate_user_id(user_id)?;
        self.db.list_workouts(user_id, limit)
    }

    pub fn list_meals(&self, user_id: &str, limit: i64) -> Result<Vec<SavedMeal>> {
        validate_user_id(user_id)?;
        self.db.list_meals(user_id, limit)
    }
}
