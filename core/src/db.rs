use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use rusqlite::{Connection, OptionalExtension, params, types::Type};

use crate::badges::{self, Milestone};
use crate::models::{
    BackfillError, Badge, GeneratedMeal, Habit, HabitLog, HabitLogOutcome, HabitLogRecord, NewHabit, Profile,
    SavedMeal, SavedWorkout, UpdateProfile, WeightEntry, WorkoutPlan, default_habits,
    validate_habit_value, validate_new_habit, validate_profile_update, validate_weight,
};
use crate::streak;

const DATE_FMT: &str = "%Y-%m-%d";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS profiles (
                    user_id TEXT PRIMARY KEY NOT NULL,
                    full_name TEXT,
                    gender TEXT,
                    age INTEGER,
                    weight_kg REAL,
                    height_cm REAL,
                    goal TEXT,
                    diet_preference TEXT NOT NULL DEFAULT 'none',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS habits (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    habit_type TEXT NOT NULL,
                    target_value REAL NOT NULL,
                    unit TEXT NOT NULL,
                    current_streak INTEGER NOT NULL DEFAULT 0 CHECK (current_streak >= 0),
                    best_streak INTEGER NOT NULL DEFAULT 0 CHECK (best_streak >= current_streak),
                    last_logged_date TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS habit_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    habit_id INTEGER NOT NULL REFERENCES habits(id),
                    date TEXT NOT NULL,
                    value REAL NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE (user_id, habit_id, date)
                );

                CREATE TABLE IF NOT EXISTS badges (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    habit_id INTEGER NOT NULL REFERENCES habits(id),
                    badge_type TEXT NOT NULL,
                    badge_name TEXT NOT NULL,
                    description TEXT NOT NULL,
                    earned_at TEXT NOT NULL,
                    UNIQUE (user_id, habit_id, badge_type)
                );

                CREATE TABLE IF NOT EXISTS weight_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    date TEXT NOT NULL,
                    weight_kg REAL NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE (user_id, date)
                );

                CREATE TABLE IF NOT EXISTS workouts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    difficulty TEXT NOT NULL,
                    duration_minutes INTEGER NOT NULL,
                    total_calories REAL,
                    exercises TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS meals (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    meal_type TEXT NOT NULL,
                    calories REAL NOT NULL,
                    protein REAL,
                    carbs REAL,
                    fats REAL,
                    ingredients TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_habits_user ON habits(user_id);
                CREATE INDEX IF NOT EXISTS idx_habit_logs_user_date ON habit_logs(user_id, date);
                CREATE INDEX IF NOT EXISTS idx_badges_user ON badges(user_id);
                CREATE INDEX IF NOT EXISTS idx_workouts_user ON workouts(user_id);
                CREATE INDEX IF NOT EXISTS idx_meals_user ON meals(user_id);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn parse_column<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
    where
        T: FromStr<Err = anyhow::Error>,
    {
        let s: String = row.get(idx)?;
        s.parse()
            .map_err(|e: anyhow::Error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
    }

    fn date_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
        let s: String = row.get(idx)?;
        NaiveDate::parse_from_str(&s, DATE_FMT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    fn json_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<serde_json::Value> {
        let s: String = row.get(idx)?;
        serde_json::from_str(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    // Expects columns:
    // 0: id, 1: user_id, 2: habit_type, 3: target_value, 4: unit,
    // 5: current_streak, 6: best_streak, 7: last_logged_date, 8: created_at
    fn habit_from_row(row: &rusqlite::Row) -> rusqlite::Result<Habit> {
        let last_logged_date = match row.get::<_, Option<String>>(7)? {
            Some(_) => Some(Self::date_column(row, 7)?),
            None => None,
        };
        Ok(Habit {
            id: row.get(0)?,
            user_id: row.get(1)?,
            habit_type: Self::parse_column(row, 2)?,
            target_value: row.get(3)?,
            unit: row.get(4)?,
            current_streak: row.get(5)?,
            best_streak: row.get(6)?,
            last_logged_date,
            created_at: row.get(8)?,
        })
    }

    fn habit_log_from_row(row: &rusqlite::Row) -> rusqlite::Result<HabitLog> {
        Ok(HabitLog {
            id: row.get(0)?,
            user_id: row.get(1)?,
            habit_id: row.get(2)?,
            date: Self::date_column(row, 3)?,
            value: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn badge_from_row(row: &rusqlite::Row) -> rusqlite::Result<Badge> {
        Ok(Badge {
            id: row.get(0)?,
            user_id: row.get(1)?,
            habit_id: row.get(2)?,
            badge_type: row.get(3)?,
            badge_name: row.get(4)?,
            description: row.get(5)?,
            earned_at: row.get(6)?,
        })
    }

    fn weight_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<WeightEntry> {
        Ok(WeightEntry {
            id: row.get(0)?,
            user_id: row.get(1)?,
            date: Self::date_column(row, 2)?,
            weight_kg: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn profile_from_row(row: &rusqlite::Row) -> rusqlite::Result<Profile> {
        let gender = match row.get::<_, Option<String>>(2)? {
            Some(_) => Some(Self::parse_column(row, 2)?),
            None => None,
        };
        let goal = match row.get::<_, Option<String>>(6)? {
            Some(_) => Some(Self::parse_column(row, 6)?),
            None => None,
        };
        Ok(Profile {
            user_id: row.get(0)?,
            full_name: row.get(1)?,
            gender,
            age: row.get(3)?,
            weight_kg: row.get(4)?,
            height_cm: row.get(5)?,
            goal,
            diet_preference: Self::parse_column(row, 7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    // --- Profiles ---

    pub fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        self.conn
            .query_row(
                "SELECT user_id, full_name, gender, age, weight_kg, height_cm, goal,
                        diet_preference, created_at, updated_at
                 FROM profiles WHERE user_id = ?1",
                params![user_id],
                Self::profile_from_row,
            )
            .optional()
            .context("Failed to load profile")
    }

    /// Create the profile if missing, otherwise overwrite only the fields set
    /// in `update`.
    pub fn upsert_profile(&self, user_id: &str, update: &UpdateProfile) -> Result<Profile> {
        validate_profile_update(update)?;
        let now = Local::now().to_rfc3339();
        let existing = self.get_profile(user_id)?;

        let full_name = update
            .full_name
            .clone()
            .or_else(|| existing.as_ref().and_then(|p| p.full_name.clone()));
        let gender = update.gender.or(existing.as_ref().and_then(|p| p.gender));
        let age = update.age.or(existing.as_ref().and_then(|p| p.age));
        let weight_kg = update
            .weight_kg
            .or(existing.as_ref().and_then(|p| p.weight_kg));
        let height_cm = update
            .height_cm
            .or(existing.as_ref().and_then(|p| p.height_cm));
        let goal = update.goal.or(existing.as_ref().and_then(|p| p.goal));
        let diet = update
            .diet_preference
            .or(existing.as_ref().map(|p| p.diet_preference))
            .unwrap_or_default();

        self.conn.execute(
            "INSERT INTO profiles (user_id, full_name, gender, age, weight_kg, height_cm, goal, diet_preference, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             ON CONFLICT(user_id) DO UPDATE SET
                full_name = excluded.full_name,
                gender = excluded.gender,
                age = excluded.age,
                weight_kg = excluded.weight_kg,
                height_cm = excluded.height_cm,
                goal = excluded.goal,
                diet_preference = excluded.diet_preference,
                updated_at = excluded.updated_at",
            params![
                user_id,
                full_name,
                gender.map(|g| g.as_str()),
                age,
                weight_kg,
                height_cm,
                goal.map(|g| g.as_str()),
                diet.as_str(),
                now,
            ],
        )?;
        self.get_profile(user_id)?
            .context("Profile not found after upsert")
    }

    // --- Habits ---

    pub fn insert_habit(&self, user_id: &str, habit: &NewHabit) -> Result<Habit> {
        validate_new_habit(habit)?;
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO habits (user_id, habit_type, target_value, unit, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                habit.habit_type.as_str(),
                habit.target_value,
                habit.unit,
                now
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_habit(user_id, id)
    }

    pub fn find_habit(&self, user_id: &str, id: i64) -> Result<Option<Habit>> {
        let habit = self
            .conn
            .query_row(
                "SELECT id, user_id, habit_type, target_value, unit, current_streak,
                        best_streak, last_logged_date, created_at
                 FROM habits WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                Self::habit_from_row,
            )
            .optional()?;
        Ok(habit)
    }

    pub fn get_habit(&self, user_id: &str, id: i64) -> Result<Habit> {
        self.find_habit(user_id, id)?
            .with_context(|| format!("Habit {id} not found"))
    }

    pub fn list_habits(&self, user_id: &str) -> Result<Vec<Habit>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, habit_type, target_value, unit, current_streak,
                    best_streak, last_logged_date, created_at
             FROM habits WHERE user_id = ?1 ORDER BY id",
        )?;
        let habits = stmt
            .query_map(params![user_id], Self::habit_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(habits)
    }

    /// List a user's habits, creating the default set the first time the user
    /// has none.
    pub fn ensure_default_habits(&self, user_id: &str) -> Result<Vec<Habit>> {
        let tx = self.conn.unchecked_transaction()?;
        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM habits WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        if count == 0 {
            for habit in default_habits() {
                self.insert_habit(user_id, &habit)?;
            }
            tracing::info!(user_id, "created default habits");
        }
        tx.commit()?;
        self.list_habits(user_id)
    }

    // --- Habit logs ---

    /// Record `value` for a habit on `date` and advance the habit's streak.
    ///
    /// The log upsert and the streak update commit together. The milestone
    /// badge is awarded afterwards; if that insert fails the error is returned
    /// but the committed streak stays.
    pub fn log_habit(
        &self,
        user_id: &str,
        habit_id: i64,
        date: NaiveDate,
        value: f64,
    ) -> Result<HabitLogOutcome> {
        validate_habit_value(value)?;

        let tx = self.conn.unchecked_transaction()?;
        let habit = self.get_habit(user_id, habit_id)?;
        if let Some(last) = habit.last_logged_date {
            if date < last {
                return Err(BackfillError {
                    habit_type: habit.habit_type,
                    date,
                    last,
                }
                .into());
            }
        }

        let now = Local::now().to_rfc3339();
        let date_str = date.format(DATE_FMT).to_string();
        tx.execute(
            "INSERT INTO habit_logs (user_id, habit_id, date, value, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(user_id, habit_id, date) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![user_id, habit_id, date_str, value, now],
        )?;

        let update = streak::evaluate(
            habit.current_streak,
            habit.best_streak,
            habit.last_logged_date,
            date,
        );
        tx.execute(
            "UPDATE habits SET current_streak = ?1, best_streak = ?2, last_logged_date = ?3
             WHERE id = ?4",
            params![update.current_streak, update.best_streak, date_str, habit_id],
        )?;
        tx.commit()?;

        tracing::debug!(
            user_id,
            habit_id,
            %date,
            current_streak = update.current_streak,
            best_streak = update.best_streak,
            "habit logged"
        );

        let log = self
            .get_habit_log(user_id, habit_id, date)?
            .context("Habit log not found after upsert")?;
        let habit = self.get_habit(user_id, habit_id)?;
        let badge = badges::award_if_eligible(self, user_id, habit_id, update.current_streak)?;

        Ok(HabitLogOutcome { log, habit, badge })
    }

    pub fn get_habit_log(
        &self,
        user_id: &str,
        habit_id: i64,
        date: NaiveDate,
    ) -> Result<Option<HabitLog>> {
        let date_str = date.format(DATE_FMT).to_string();
        self.conn
            .query_row(
                "SELECT id, user_id, habit_id, date, value, created_at, updated_at
                 FROM habit_logs WHERE user_id = ?1 AND habit_id = ?2 AND date = ?3",
                params![user_id, habit_id, date_str],
                Self::habit_log_from_row,
            )
            .optional()
            .context("Failed to load habit log")
    }

    pub fn get_habit_logs_for_date(&self, user_id: &str, date: NaiveDate) -> Result<Vec<HabitLog>> {
        let date_str = date.format(DATE_FMT).to_string();
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, habit_id, date, value, created_at, updated_at
             FROM habit_logs WHERE user_id = ?1 AND date = ?2 ORDER BY habit_id",
        )?;
        let logs = stmt
            .query_map(params![user_id, date_str], Self::habit_log_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    /// Habit logs on or after `since`, joined with their habit's type and
    /// target, oldest first.
    pub fn get_habit_log_records_since(
        &self,
        user_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<HabitLogRecord>> {
        let since_str = since.format(DATE_FMT).to_string();
        let mut stmt = self.conn.prepare(
            "SELECT hl.date, hl.habit_id, hl.value, h.habit_type, h.target_value
             FROM habit_logs hl
             JOIN habits h ON hl.habit_id = h.id
             WHERE hl.user_id = ?1 AND hl.date >= ?2
             ORDER BY hl.date, hl.habit_id",
        )?;
        let records = stmt
            .query_map(params![user_id, since_str], |row| {
                Ok(HabitLogRecord {
                    date: Self::date_column(row, 0)?,
                    habit_id: row.get(1)?,
                    value: row.get(2)?,
                    habit_type: Self::parse_column(row, 3)?,
                    target_value: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    // --- Badges ---

    /// Insert the milestone badge unless one already exists for this
    /// (user, habit, badge type). Returns `None` when it already existed or
    /// when the habit does not belong to `user_id`.
    pub fn insert_badge_if_absent(
        &self,
        user_id: &str,
        habit_id: i64,
        milestone: &Milestone,
    ) -> Result<Option<Badge>> {
        let now = Local::now().to_rfc3339();
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO badges (user_id, habit_id, badge_type, badge_name, description, earned_at)
                 SELECT ?1, ?2, ?3, ?4, ?5, ?6
                 WHERE EXISTS (SELECT 1 FROM habits WHERE id = ?2 AND user_id = ?1)",
                params![
                    user_id,
                    habit_id,
                    milestone.badge_type,
                    milestone.name,
                    milestone.description,
                    now
                ],
            )
            .context("Failed to record badge")?;
        if inserted == 0 {
            return Ok(None);
        }
        let id = self.conn.last_insert_rowid();
        let badge = self.conn.query_row(
            "SELECT id, user_id, habit_id, badge_type, badge_name, description, earned_at
             FROM badges WHERE id = ?1",
            params![id],
            Self::badge_from_row,
        )?;
        Ok(Some(badge))
    }

    pub fn list_badges(&self, user_id: &str) -> Result<Vec<Badge>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, habit_id, badge_type, badge_name, description, earned_at
             FROM badges WHERE user_id = ?1 ORDER BY earned_at DESC, id DESC",
        )?;
        let badges = stmt
            .query_map(params![user_id], Self::badge_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(badges)
    }

    // --- Weight ---

    pub fn upsert_weight(&self, user_id: &str, date: NaiveDate, weight_kg: f64) -> Result<WeightEntry> {
        validate_weight(weight_kg)?;
        let now = Local::now().to_rfc3339();
        let date_str = date.format(DATE_FMT).to_string();
        self.conn.execute(
            "INSERT INTO weight_logs (user_id, date, weight_kg, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(user_id, date) DO UPDATE SET
                weight_kg = excluded.weight_kg,
                updated_at = excluded.updated_at",
            params![user_id, date_str, weight_kg, now],
        )?;
        self.get_weight(user_id, date)?
            .context("Weight entry not found after upsert")
    }

    pub fn get_weight(&self, user_id: &str, date: NaiveDate) -> Result<Option<WeightEntry>> {
        let date_str = date.format(DATE_FMT).to_string();
        self.conn
            .query_row(
                "SELECT id, user_id, date, weight_kg, created_at, updated_at
                 FROM weight_logs WHERE user_id = ?1 AND date = ?2",
                params![user_id, date_str],
                Self::weight_entry_from_row,
            )
            .optional()
            .context("Failed to load weight entry")
    }

    /// Weight entries on or after `since` (all entries when `None`), oldest first.
    pub fn get_weight_history(
        &self,
        user_id: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<WeightEntry>> {
        let since_str = since.map(|d| d.format(DATE_FMT).to_string());
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, date, weight_kg, created_at, updated_at
             FROM weight_logs
             WHERE user_id = ?1 AND (?2 IS NULL OR date >= ?2)
             ORDER BY date",
        )?;
        let entries = stmt
            .query_map(params![user_id, since_str], Self::weight_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn delete_weight(&self, user_id: &str, id: i64) -> Result<()> {
        let rows = self.conn.execute(
            "DELETE FROM weight_logs WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if rows == 0 {
            bail!("Weight entry not found");
        }
        Ok(())
    }

    // --- Plan history ---

    pub fn insert_workout(&self, user_id: &str, plan: &WorkoutPlan) -> Result<SavedWorkout> {
        let now = Local::now().to_rfc3339();
        let exercises = plan.exercises.to_string();
        self.conn.execute(
            "INSERT INTO workouts (user_id, name, difficulty, duration_minutes, total_calories, exercises, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user_id,
                plan.name,
                plan.difficulty.as_str(),
                plan.duration_minutes,
                plan.total_calories,
                exercises,
                now
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                "SELECT id, user_id, name, difficulty, duration_minutes, total_calories, exercises, created_at
                 FROM workouts WHERE id = ?1",
                params![id],
                Self::workout_from_row,
            )
            .context("Workout not found after insert")
    }

    pub fn list_workouts(&self, user_id: &str, limit: i64) -> Result<Vec<SavedWorkout>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, name, difficulty, duration_minutes, total_calories, exercises, created_at
             FROM workouts WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let workouts = stmt
            .query_map(params![user_id, limit], Self::workout_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(workouts)
    }

    fn workout_from_row(row: &rusqlite::Row) -> rusqlite::Result<SavedWorkout> {
        Ok(SavedWorkout {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            difficulty: Self::parse_column(row, 3)?,
            duration_minutes: row.get(4)?,
            total_calories: row.get(5)?,
            exercises: Self::json_column(row, 6)?,
            created_at: row.get(7)?,
        })
    }

    pub fn insert_meal(&self, user_id: &str, meal: &GeneratedMeal) -> Result<SavedMeal> {
        let now = Local::now().to_rfc3339();
        let ingredients = serde_json::to_string(&meal.ingredients)?;
        self.conn.execute(
            "INSERT INTO meals (user_id, name, meal_type, calories, protein, carbs, fats, ingredients, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                user_id,
                meal.name,
                meal.meal_type,
                meal.calories,
                meal.protein,
                meal.carbs,
                meal.fats,
                ingredients,
                now
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                "SELECT id, user_id, name, meal_type, calories, protein, carbs, fats, ingredients, created_at
                 FROM meals WHERE id = ?1",
                params![id],
                Self::meal_from_row,
            )
            .context("Meal not found after insert")
    }

    /// Save every meal of a plan, or none of them.
    pub fn insert_meals(&self, user_id: &str, meals: &[GeneratedMeal]) -> Result<Vec<SavedMeal>> {
        let tx = self.conn.unchecked_transaction()?;
        let saved = meals
            .iter()
            .map(|meal| self.insert_meal(user_id, meal))
            .collect::<Result<Vec<_>>>()?;
        tx.commit()?;
        Ok(saved)
    }

    pub fn list_meals(&self, user_id: &str, limit: i64) -> Result<Vec<SavedMeal>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, name, meal_type, calories, protein, carbs, fats, ingredients, created_at
             FROM meals WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let meals = stmt
            .query_map(params![user_id, limit], Self::meal_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(meals)
    }

    fn meal_from_row(row: &rusqlite::Row) -> rusqlite::Result<SavedMeal> {
        Ok(SavedMeal {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            meal_type: row.get(3)?,
            calories: row.get(4)?,
            protein: row.get(5)?,
            carbs: row.get(6)?,
            fats: row.get(7)?,
            ingredients: Self::json_column(row, 8)?,
            created_at: row.get(9)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        DietPreference, Gender, Goal, HabitType, WorkoutDifficulty,
    };

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FMT).unwrap()
    }

    fn water(db: &Database, user_id: &str) -> Habit {
        db.insert_habit(
            user_id,
            &NewHabit {
                habit_type: HabitType::Water,
                target_value: 8.0,
                unit: "glasses".to_string(),
            },
        )
        .unwrap()
    }

    fn count(db: &Database, sql: &str) -> i64 {
        db.conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    /// Log `habit` once a day from `start` for `days` days.
    fn log_days(db: &Database, habit: &Habit, start: &str, days: i64) {
        let start = d(start);
        for i in 0..days {
            db.log_habit(&habit.user_id, habit.id, start + chrono::Duration::days(i), 8.0)
                .unwrap();
        }
    }

    #[test]
    fn test_migration_sets_user_version() {
        let db = Database::open_in_memory().unwrap();
        let version: i64 = db
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_open_on_disk_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fittrack.db");
        {
            let db = Database::open(&path).unwrap();
            water(&db, "u1");
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_habits("u1").unwrap().len(), 1);
    }

    #[test]
    fn test_ensure_default_habits_runs_once() {
        let db = Database::open_in_memory().unwrap();
        let habits = db.ensure_default_habits("u1").unwrap();
        assert_eq!(habits.len(), 3);
        assert_eq!(habits[0].habit_type, HabitType::Water);
        assert_eq!(habits[1].unit, "hours");
        assert!(habits.iter().all(|h| h.current_streak == 0 && h.last_logged_date.is_none()));

        let again = db.ensure_default_habits("u1").unwrap();
        assert_eq!(again.len(), 3);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM habits"), 3);
    }

    #[test]
    fn test_ensure_default_habits_skips_users_with_habits() {
        let db = Database::open_in_memory().unwrap();
        water(&db, "u1");
        assert_eq!(db.ensure_default_habits("u1").unwrap().len(), 1);
    }

    #[test]
    fn test_get_habit_scoped_to_user() {
        let db = Database::open_in_memory().unwrap();
        let habit = water(&db, "u1");
        assert!(db.get_habit("u1", habit.id).is_ok());
        assert!(db.get_habit("u2", habit.id).is_err());
        assert!(db.log_habit("u2", habit.id, d("2024-01-01"), 1.0).is_err());
    }

    #[test]
    fn test_insert_habit_rejects_negative_target() {
        let db = Database::open_in_memory().unwrap();
        let result = db.insert_habit(
            "u1",
            &NewHabit {
                habit_type: HabitType::Wellness,
                target_value: -1.0,
                unit: "minutes".to_string(),
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_first_log_starts_streak() {
        let db = Database::open_in_memory().unwrap();
        let habit = water(&db, "u1");
        let outcome = db.log_habit("u1", habit.id, d("2024-01-01"), 5.0).unwrap();
        assert_eq!(outcome.habit.current_streak, 1);
        assert_eq!(outcome.habit.best_streak, 1);
        assert_eq!(outcome.habit.last_logged_date, Some(d("2024-01-01")));
        assert!((outcome.log.value - 5.0).abs() < f64::EPSILON);
        assert!(outcome.badge.is_none());
    }

    #[test]
    fn test_relog_same_day_overwrites_value() {
        let db = Database::open_in_memory().unwrap();
        let habit = water(&db, "u1");
        db.log_habit("u1", habit.id, d("2024-01-01"), 3.0).unwrap();
        let outcome = db.log_habit("u1", habit.id, d("2024-01-01"), 6.0).unwrap();

        assert_eq!(count(&db, "SELECT COUNT(*) FROM habit_logs"), 1);
        assert!((outcome.log.value - 6.0).abs() < f64::EPSILON);
        assert_eq!(outcome.habit.current_streak, 1);
    }

    #[test]
    fn test_week_streak_awards_badge_once() {
        let db = Database::open_in_memory().unwrap();
        let habit = water(&db, "u1");
        log_days(&db, &habit, "2023-12-31", 6);

        let before = db.get_habit("u1", habit.id).unwrap();
        assert_eq!(before.current_streak, 6);
        assert_eq!(before.best_streak, 6);
        assert_eq!(before.last_logged_date, Some(d("2024-01-05")));

        let outcome = db.log_habit("u1", habit.id, d("2024-01-06"), 8.0).unwrap();
        assert_eq!(outcome.habit.current_streak, 7);
        assert_eq!(outcome.habit.best_streak, 7);
        assert_eq!(outcome.badge.as_ref().unwrap().badge_type, "streak_7");

        // Same-day relog keeps the streak and grants nothing
        let outcome = db.log_habit("u1", habit.id, d("2024-01-06"), 9.0).unwrap();
        assert_eq!(outcome.habit.current_streak, 7);
        assert!(outcome.badge.is_none());

        let types: Vec<String> = db
            .list_badges("u1")
            .unwrap()
            .into_iter()
            .map(|b| b.badge_type)
            .collect();
        assert_eq!(types.len(), 2);
        assert!(types.contains(&"streak_3".to_string()));
        assert!(types.contains(&"streak_7".to_string()));
    }

    #[test]
    fn test_gap_resets_streak_keeps_best() {
        let db = Database::open_in_memory().unwrap();
        let habit = water(&db, "u1");
        log_days(&db, &habit, "2023-12-30", 3);

        let outcome = db.log_habit("u1", habit.id, d("2024-01-10"), 8.0).unwrap();
        assert_eq!(outcome.habit.current_streak, 1);
        assert_eq!(outcome.habit.best_streak, 3);
    }

    #[test]
    fn test_rebuilt_streak_does_not_reaward() {
        let db = Database::open_in_memory().unwrap();
        let habit = water(&db, "u1");
        log_days(&db, &habit, "2024-01-01", 3);
        assert_eq!(db.list_badges("u1").unwrap().len(), 1);

        // Skip a day, then rebuild to 3
        log_days(&db, &habit, "2024-01-05", 3);
        let habit = db.get_habit("u1", habit.id).unwrap();
        assert_eq!(habit.current_streak, 3);
        assert_eq!(db.list_badges("u1").unwrap().len(), 1);
    }

    #[test]
    fn test_backfill_rejected_without_changes() {
        let db = Database::open_in_memory().unwrap();
        let habit = water(&db, "u1");
        db.log_habit("u1", habit.id, d("2024-01-05"), 8.0).unwrap();

        let err = db
            .log_habit("u1", habit.id, d("2024-01-03"), 8.0)
            .unwrap_err();
        assert!(err.to_string().contains("already logged"));
        let backfill = err.downcast_ref::<BackfillError>().unwrap();
        assert_eq!(backfill.last, d("2024-01-05"));
        assert_eq!(count(&db, "SELECT COUNT(*) FROM habit_logs"), 1);
        let habit = db.get_habit("u1", habit.id).unwrap();
        assert_eq!(habit.last_logged_date, Some(d("2024-01-05")));
    }

    #[test]
    fn test_negative_value_rejected() {
        let db = Database::open_in_memory().unwrap();
        let habit = water(&db, "u1");
        assert!(db.log_habit("u1", habit.id, d("2024-01-05"), -2.0).is_err());
        assert_eq!(count(&db, "SELECT COUNT(*) FROM habit_logs"), 0);
    }

    #[test]
    fn test_badge_unique_constraint_holds() {
        let db = Database::open_in_memory().unwrap();
        let habit = water(&db, "u1");
        let m = crate::badges::milestone_for(3).unwrap();
        assert!(db.insert_badge_if_absent("u1", habit.id, m).unwrap().is_some());
        assert!(db.insert_badge_if_absent("u1", habit.id, m).unwrap().is_none());
        assert_eq!(count(&db, "SELECT COUNT(*) FROM badges"), 1);
    }

    #[test]
    fn test_badge_requires_habit_owner() {
        let db = Database::open_in_memory().unwrap();
        let habit = water(&db, "u1");
        let m = crate::badges::milestone_for(7).unwrap();
        assert!(db.insert_badge_if_absent("u2", habit.id, m).unwrap().is_none());
        assert!(db.insert_badge_if_absent("u1", 9999, m).unwrap().is_none());
        assert_eq!(count(&db, "SELECT COUNT(*) FROM badges"), 0);
    }

    #[test]
    fn test_find_habit_missing_is_none() {
        let db = Database::open_in_memory().unwrap();
        let habit = water(&db, "u1");
        assert!(db.find_habit("u1", habit.id).unwrap().is_some());
        assert!(db.find_habit("u2", habit.id).unwrap().is_none());
        assert!(db.find_habit("u1", 9999).unwrap().is_none());
    }

    #[test]
    fn test_logs_for_date_and_records_since() {
        let db = Database::open_in_memory().unwrap();
        let habits = db.ensure_default_habits("u1").unwrap();
        db.log_habit("u1", habits[0].id, d("2024-01-01"), 8.0).unwrap();
        db.log_habit("u1", habits[1].id, d("2024-01-02"), 6.0).unwrap();
        db.log_habit("u1", habits[0].id, d("2024-01-02"), 4.0).unwrap();

        let logs = db.get_habit_logs_for_date("u1", d("2024-01-02")).unwrap();
        assert_eq!(logs.len(), 2);
        assert!(db.get_habit_logs_for_date("u2", d("2024-01-02")).unwrap().is_empty());

        let records = db.get_habit_log_records_since("u1", d("2024-01-02")).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].habit_type, HabitType::Water);
        assert_eq!(records[1].habit_type, HabitType::Sleep);
        assert!((records[1].target_value - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_upsert_weight_replaces_existing_for_same_date() {
        let db = Database::open_in_memory().unwrap();
        let first = db.upsert_weight("u1", d("2024-01-05"), 80.0).unwrap();
        let second = db.upsert_weight("u1", d("2024-01-05"), 79.4).unwrap();

        assert_eq!(first.id, second.id);
        assert!((second.weight_kg - 79.4).abs() < f64::EPSILON);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM weight_logs"), 1);
    }

    #[test]
    fn test_upsert_weight_separate_users() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_weight("u1", d("2024-01-05"), 80.0).unwrap();
        db.upsert_weight("u2", d("2024-01-05"), 60.0).unwrap();
        assert_eq!(count(&db, "SELECT COUNT(*) FROM weight_logs"), 2);
        let u2 = db.get_weight("u2", d("2024-01-05")).unwrap().unwrap();
        assert!((u2.weight_kg - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_upsert_weight_rejects_zero() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.upsert_weight("u1", d("2024-01-05"), 0.0).is_err());
    }

    #[test]
    fn test_get_weight_returns_none_for_missing_date() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_weight("u1", d("2024-01-05")).unwrap().is_none());
    }

    #[test]
    fn test_weight_history_ordered_and_filtered() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_weight("u1", d("2024-01-03"), 79.0).unwrap();
        db.upsert_weight("u1", d("2024-01-01"), 80.0).unwrap();
        db.upsert_weight("u1", d("2024-01-02"), 79.5).unwrap();

        let all = db.get_weight_history("u1", None).unwrap();
        let dates: Vec<NaiveDate> = all.iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![d("2024-01-01"), d("2024-01-02"), d("2024-01-03")]);

        let recent = db.get_weight_history("u1", Some(d("2024-01-02"))).unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn test_delete_weight() {
        let db = Database::open_in_memory().unwrap();
        let entry = db.upsert_weight("u1", d("2024-01-03"), 79.0).unwrap();
        assert!(db.delete_weight("u2", entry.id).is_err());
        db.delete_weight("u1", entry.id).unwrap();
        assert!(db.get_weight("u1", d("2024-01-03")).unwrap().is_none());
        assert!(db.delete_weight("u1", entry.id).is_err());
    }

    #[test]
    fn test_profile_upsert_merges_fields() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_profile("u1").unwrap().is_none());

        let created = db
            .upsert_profile(
                "u1",
                &UpdateProfile {
                    gender: Some(Gender::Female),
                    age: Some(31),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(created.diet_preference, DietPreference::None);
        assert!(created.generation_profile().is_none());

        let updated = db
            .upsert_profile(
                "u1",
                &UpdateProfile {
                    weight_kg: Some(62.5),
                    goal: Some(Goal::MuscleGain),
                    diet_preference: Some(DietPreference::Vegan),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.gender, Some(Gender::Female));
        assert_eq!(updated.age, Some(31));
        assert_eq!(updated.goal, Some(Goal::MuscleGain));
        assert_eq!(updated.diet_preference, DietPreference::Vegan);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.generation_profile().is_some());
    }

    #[test]
    fn test_profile_upsert_validates() {
        let db = Database::open_in_memory().unwrap();
        let result = db.upsert_profile(
            "u1",
            &UpdateProfile {
                age: Some(200),
                ..Default::default()
            },
        );
        assert!(result.is_err());
        assert!(db.get_profile("u1").unwrap().is_none());
    }

    #[test]
    fn test_workout_history() {
        let db = Database::open_in_memory().unwrap();
        let plan = WorkoutPlan {
            name: "Push Day".to_string(),
            difficulty: WorkoutDifficulty::Intermediate,
            duration_minutes: 50,
            total_calories: Some(400.0),
            exercises: serde_json::json!([
                {"name": "Bench Press", "sets": 4, "reps": 8, "rest_seconds": 90}
            ]),
        };
        db.insert_workout("u1", &plan).unwrap();
        let second = db.insert_workout("u1", &plan).unwrap();

        let list = db.list_workouts("u1", 10).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, second.id);
        assert_eq!(list[0].difficulty, WorkoutDifficulty::Intermediate);
        assert_eq!(list[0].exercises[0]["name"], "Bench Press");
        assert!(db.list_workouts("u2", 10).unwrap().is_empty());
    }

    #[test]
    fn test_workout_exercises_stored_verbatim() {
        let db = Database::open_in_memory().unwrap();
        let plan: WorkoutPlan = serde_json::from_value(serde_json::json!({
            "name": "Legs",
            "difficulty": "advanced",
            "duration_minutes": 60,
            "exercises": [
                {"name": "Squat", "sets": 5, "reps": 5, "weight_kg": 100, "notes": "belt"},
                {"name": "Lunge", "reps": "12 each leg"}
            ]
        }))
        .unwrap();
        db.insert_workout("u1", &plan).unwrap();

        let saved = &db.list_workouts("u1", 1).unwrap()[0];
        assert_eq!(saved.exercises, plan.exercises);
        assert_eq!(saved.exercises[0]["weight_kg"], 100);
        assert_eq!(saved.exercises[0]["notes"], "belt");
        assert!(saved.exercises[1].get("sets").is_none());
        assert!(saved.exercises[1].get("rest_seconds").is_none());
    }

    #[test]
    fn test_meal_history() {
        let db = Database::open_in_memory().unwrap();
        let meal = GeneratedMeal {
            name: "Oatmeal".to_string(),
            meal_type: "breakfast".to_string(),
            calories: 350.0,
            protein: Some(12.0),
            carbs: Some(60.0),
            fats: None,
            ingredients: vec!["oats".to_string(), "milk".to_string()],
        };
        let saved = db.insert_meal("u1", &meal).unwrap();
        assert_eq!(saved.ingredients[1], "milk");
        assert!(saved.fats.is_none());
        assert_eq!(db.list_meals("u1", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_insert_meals_is_all_or_nothing() {
        let db = Database::open_in_memory().unwrap();
        let meal = |name: &str, calories: f64| GeneratedMeal {
            name: name.to_string(),
            meal_type: "lunch".to_string(),
            calories,
            protein: None,
            carbs: None,
            fats: None,
            ingredients: Vec::new(),
        };

        // SQLite stores NaN as NULL, which the NOT NULL calories column rejects
        let result = db.insert_meals("u1", &[meal("Salad", 300.0), meal("Broken", f64::NAN)]);
        assert!(result.is_err());
        assert!(db.list_meals("u1", 10).unwrap().is_empty());

        let saved = db
            .insert_meals("u1", &[meal("Salad", 300.0), meal("Soup", 200.0)])
            .unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(db.list_meals("u1", 10).unwrap().len(), 2);
    }
}
