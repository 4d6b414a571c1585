use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// --- Habit types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HabitType {
    Water,
    Sleep,
    Smoking,
    Wellness,
}

pub const HABIT_TYPES: &[&str] = &["water", "sleep", "smoking", "wellness"];

impl HabitType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Water => "water",
            Self::Sleep => "sleep",
            Self::Smoking => "smoking",
            Self::Wellness => "wellness",
        }
    }

    /// Capitalised label used in analytics output ("Water", "Sleep", ...).
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Water => "Water",
            Self::Sleep => "Sleep",
            Self::Smoking => "Smoking",
            Self::Wellness => "Wellness",
        }
    }
}

impl fmt::Display for HabitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HabitType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "water" => Ok(Self::Water),
            "sleep" => Ok(Self::Sleep),
            "smoking" => Ok(Self::Smoking),
            "wellness" => Ok(Self::Wellness),
            _ => bail!(
                "Invalid habit type '{s}'. Must be one of: {}",
                HABIT_TYPES.join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Habit {
    pub id: i64,
    pub user_id: String,
    #[serde(rename = "type")]
    pub habit_type: HabitType,
    pub target_value: f64,
    pub unit: String,
    pub current_streak: i64,
    pub best_streak: i64,
    pub last_logged_date: Option<NaiveDate>,
    pub created_at: String,
}

impl Habit {
    /// Streak as it should be shown on `today`: a chain whose last log is older
    /// than yesterday has already broken, even though the stored counter only
    /// resets on the next log.
    #[must_use]
    pub fn active_streak(&self, today: NaiveDate) -> i64 {
        match self.last_logged_date {
            Some(last) if last == today || Some(last) == today.pred_opt() => self.current_streak,
            _ => 0,
        }
    }

    #[must_use]
    pub fn is_completed_by(&self, value: f64) -> bool {
        value >= self.target_value
    }
}

#[derive(Debug, Clone)]
pub struct NewHabit {
    pub habit_type: HabitType,
    pub target_value: f64,
    pub unit: String,
}

/// Habits every user starts with.
#[must_use]
pub fn default_habits() -> Vec<NewHabit> {
    vec![
        NewHabit {
            habit_type: HabitType::Water,
            target_value: 8.0,
            unit: "glasses".to_string(),
        },
        NewHabit {
            habit_type: HabitType::Sleep,
            target_value: 8.0,
            unit: "hours".to_string(),
        },
        NewHabit {
            habit_type: HabitType::Smoking,
            target_value: 0.0,
            unit: "cigarettes".to_string(),
        },
    ]
}

#[derive(Debug, Clone, Serialize)]
pub struct HabitLog {
    pub id: i64,
    pub user_id: String,
    pub habit_id: i64,
    pub date: NaiveDate,
    pub value: f64,
    pub created_at: String,
    pub updated_at: String,
}

/// Result of recording a habit value: the stored log, the habit with its
/// updated streak fields, and the badge earned by this log, if any.
#[derive(Debug, Clone, Serialize)]
pub struct HabitLogOutcome {
    pub log: HabitLog,
    pub habit: Habit,
    pub badge: Option<Badge>,
}

// --- Badges ---

#[derive(Debug, Clone, Serialize)]
pub struct Badge {
    pub id: i64,
    pub user_id: String,
    pub habit_id: i64,
    pub badge_type: String,
    pub badge_name: String,
    pub description: String,
    pub earned_at: String,
}

// --- Weight tracking types ---

#[derive(Debug, Clone, Serialize)]
pub struct WeightEntry {
    pub id: i64,
    pub user_id: String,
    pub date: NaiveDate,
    pub weight_kg: f64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeightTrend {
    pub latest_kg: f64,
    pub previous_kg: f64,
    pub change_kg: f64,
}

impl WeightTrend {
    /// Compare the two most recent entries of a date-ascending history.
    /// Falls back to `baseline_kg` (usually the profile weight) when fewer
    /// than two entries exist.
    #[must_use]
    pub fn from_history(entries: &[WeightEntry], baseline_kg: Option<f64>) -> Option<Self> {
        let latest = entries.last().map(|e| e.weight_kg).or(baseline_kg)?;
        let previous = if entries.len() > 1 {
            entries[entries.len() - 2].weight_kg
        } else {
            baseline_kg.unwrap_or(latest)
        };
        Some(Self {
            latest_kg: latest,
            previous_kg: previous,
            change_kg: latest - previous,
        })
    }
}

// --- Profile types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    WeightLoss,
    MuscleGain,
    Maintain,
    GeneralFitness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DietPreference {
    #[default]
    None,
    Vegetarian,
    Vegan,
    Keto,
    Paleo,
    Mediterranean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutDifficulty {
    Beginner,
    Intermediate,
    Advanced,
}

/// String conversions for the profile enums. `NAMES` must match the serde
/// spelling so the database, CLI, and JSON API agree.
macro_rules! serde_str_enum {
    ($($ty:ty => $kind:literal),* $(,)?) => {
        $(
            impl $ty {
                #[must_use]
                pub fn as_str(self) -> &'static str {
                    <$ty>::ALL
                        .iter()
                        .zip(<$ty>::NAMES)
                        .find(|(v, _)| **v == self)
                        .map_or("", |(_, name)| *name)
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl FromStr for $ty {
                type Err = anyhow::Error;

                fn from_str(s: &str) -> Result<Self> {
                    let lower = s.to_lowercase();
                    <$ty>::ALL
                        .iter()
                        .zip(<$ty>::NAMES)
                        .find(|(_, name)| **name == lower)
                        .map(|(v, _)| *v)
                        .ok_or_else(|| {
                            anyhow::anyhow!(
                                "Invalid {} '{s}'. Must be one of: {}",
                                $kind,
                                <$ty>::NAMES.join(", ")
                            )
                        })
                }
            }
        )*
    };
}

impl Gender {
    const ALL: &'static [Self] = &[Self::Male, Self::Female, Self::Other];
    const NAMES: &'static [&'static str] = &["male", "female", "other"];
}

impl Goal {
    const ALL: &'static [Self] = &[
        Self::WeightLoss,
        Self::MuscleGain,
        Self::Maintain,
        Self::GeneralFitness,
    ];
    const NAMES: &'static [&'static str] =
        &["weight_loss", "muscle_gain", "maintain", "general_fitness"];

    /// Human-readable goal used in prompts ("weight loss").
    #[must_use]
    pub fn phrase(self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl DietPreference {
    const ALL: &'static [Self] = &[
        Self::None,
        Self::Vegetarian,
        Self::Vegan,
        Self::Keto,
        Self::Paleo,
        Self::Mediterranean,
    ];
    const NAMES: &'static [&'static str] = &[
        "none",
        "vegetarian",
        "vegan",
        "keto",
        "paleo",
        "mediterranean",
    ];
}

impl WorkoutDifficulty {
    const ALL: &'static [Self] = &[Self::Beginner, Self::Intermediate, Self::Advanced];
    const NAMES: &'static [&'static str] = &["beginner", "intermediate", "advanced"];
}

serde_str_enum!(
    Gender => "gender",
    Goal => "goal",
    DietPreference => "diet preference",
    WorkoutDifficulty => "difficulty",
);

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub user_id: String,
    pub full_name: Option<String>,
    pub gender: Option<Gender>,
    pub age: Option<i64>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub goal: Option<Goal>,
    pub diet_preference: DietPreference,
    pub created_at: String,
    pub updated_at: String,
}

impl Profile {
    /// The subset of the profile the plan generator needs, if every required
    /// field has been filled in.
    #[must_use]
    pub fn generation_profile(&self) -> Option<GenerationProfile> {
        Some(GenerationProfile {
            gender: self.gender?,
            age: self.age?,
            weight: self.weight_kg?,
            goal: self.goal?,
            diet_preference: Some(self.diet_preference),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfile {
    pub full_name: Option<String>,
    pub gender: Option<Gender>,
    pub age: Option<i64>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub goal: Option<Goal>,
    pub diet_preference: Option<DietPreference>,
}

impl UpdateProfile {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.gender.is_none()
            && self.age.is_none()
            && self.weight_kg.is_none()
            && self.height_cm.is_none()
            && self.goal.is_none()
            && self.diet_preference.is_none()
    }
}

pub fn validate_profile_update(update: &UpdateProfile) -> Result<()> {
    if let Some(age) = update.age {
        if !(1..=150).contains(&age) {
            bail!("Age must be between 1 and 150");
        }
    }
    if let Some(w) = update.weight_kg {
        validate_weight(w)?;
    }
    if update.height_cm.is_some_and(|h| !h.is_finite() || h <= 0.0) {
        bail!("Height must be greater than 0");
    }
    Ok(())
}

// --- Generation types ---

/// Profile fields sent to the plan generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationProfile {
    pub gender: Gender,
    pub age: i64,
    pub weight: f64,
    pub goal: Goal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diet_preference: Option<DietPreference>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub name: String,
    #[serde(default)]
    pub sets: Option<i64>,
    #[serde(default)]
    pub reps: Option<i64>,
    #[serde(default)]
    pub rest_seconds: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutPlan {
    pub name: String,
    pub difficulty: WorkoutDifficulty,
    pub duration_minutes: i64,
    #[serde(default)]
    pub total_calories: Option<f64>,
    /// Exercises exactly as the generator returned them.
    #[serde(default = "empty_array")]
    pub exercises: Value,
}

fn empty_array() -> Value {
    Value::Array(Vec::new())
}

impl WorkoutPlan {
    /// Exercises readable as [`Exercise`]; entries of any other shape are skipped.
    #[must_use]
    pub fn exercise_list(&self) -> Vec<Exercise> {
        self.exercises
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| Exercise::deserialize(v).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedMeal {
    pub name: String,
    pub meal_type: String,
    pub calories: f64,
    #[serde(default)]
    pub protein: Option<f64>,
    #[serde(default)]
    pub carbs: Option<f64>,
    #[serde(default)]
    pub fats: Option<f64>,
    #[serde(default)]
    pub ingredients: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealPlan {
    pub meals: Vec<GeneratedMeal>,
}

// --- History types ---

#[derive(Debug, Clone, Serialize)]
pub struct SavedWorkout {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub difficulty: WorkoutDifficulty,
    pub duration_minutes: i64,
    pub total_calories: Option<f64>,
    pub exercises: serde_json::Value,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedMeal {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub meal_type: String,
    pub calories: f64,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fats: Option<f64>,
    pub ingredients: serde_json::Value,
    pub created_at: String,
}

// --- Analytics types ---

#[derive(Debug, Clone, Serialize)]
pub struct DayActivity {
    pub date: NaiveDate,
    pub day: String,
    pub completed: i64,
    pub logged: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekActivity {
    pub week: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub completed: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRate {
    pub name: String,
    pub value: i64,
    pub completed: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HabitAnalytics {
    pub weekly: Vec<DayActivity>,
    pub monthly: Vec<WeekActivity>,
    pub completion: Vec<CompletionRate>,
}

/// A habit log joined with the habit fields analytics needs.
#[derive(Debug, Clone)]
pub struct HabitLogRecord {
    pub date: NaiveDate,
    pub habit_id: i64,
    pub value: f64,
    pub habit_type: HabitType,
    pub target_value: f64,
}

// --- Validation ---

pub fn validate_habit_value(value: f64) -> Result<()> {
    if !value.is_finite() {
        bail!("Habit value must be a number");
    }
    if value < 0.0 {
        bail!("Habit value must not be negative");
    }
    Ok(())
}

pub fn validate_weight(weight_kg: f64) -> Result<()> {
    if !weight_kg.is_finite() || weight_kg <= 0.0 {
        bail!("Weight must be greater than 0");
    }
    Ok(())
}

pub fn validate_new_habit(habit: &NewHabit) -> Result<()> {
    if !habit.target_value.is_finite() || habit.target_value < 0.0 {
        bail!("Target value must not be negative");
    }
    if habit.unit.trim().is_empty() {
        bail!("Unit must not be empty");
    }
    Ok(())
}

pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        bail!("User id must not be empty");
    }
    if user_id.len() > 128 {
        bail!("User id must be at most 128 characters");
    }
    Ok(())
}

/// The date `days` days before `today`, or `None` when that lies outside the
/// calendar range, which callers treat as "all history".
#[must_use]
pub fn days_before(today: NaiveDate, days: i64) -> Option<NaiveDate> {
    TimeDelta::try_days(days).and_then(|delta| today.checked_sub_signed(delta))
}

/// A habit log dated before the habit's most recent log.
#[derive(Debug, thiserror::Error)]
#[error("Cannot log {habit_type} for {date}: habit was already logged on {last}")]
pub struct BackfillError {
    pub habit_type: HabitType,
    pub date: NaiveDate,
    pub last: NaiveDate,
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("Invalid date '{s}'. Use YYYY-MM-DD"))
}
