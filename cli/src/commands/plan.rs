use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use fittrack_core::generation::PlanGenerator;
use fittrack_core::service::FitTrackService;

use super::helpers::{fmt_amount, print_json, truncate};

fn opt_amount(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), fmt_amount)
}

pub(crate) fn cmd_workout_generate(
    svc: &FitTrackService,
    generator: &dyn PlanGenerator,
    user: &str,
    save: bool,
    json: bool,
) -> Result<()> {
    eprintln!("Generating workout...");
    let result = svc.generate_workout(generator, user, save)?;

    if json {
        return print_json(&result);
    }

    let plan = &result.plan;
    println!(
        "{} ({}, {} min, ~{} kcal)",
        plan.name,
        plan.difficulty,
        plan.duration_minutes,
        opt_amount(plan.total_calories)
    );

    #[derive(Tabled)]
    struct ExerciseRow {
        #[tabled(rename = "#")]
        n: usize,
        #[tabled(rename = "Exercise")]
        name: String,
        #[tabled(rename = "Sets")]
        sets: String,
        #[tabled(rename = "Reps")]
        reps: String,
        #[tabled(rename = "Rest")]
        rest: String,
    }

    let rows: Vec<ExerciseRow> = plan
        .exercise_list()
        .iter()
        .enumerate()
        .map(|(i, e)| ExerciseRow {
            n: i + 1,
            name: truncate(&e.name, 40),
            sets: e.sets.map_or_else(|| "-".to_string(), |s| s.to_string()),
            reps: e.reps.map_or_else(|| "-".to_string(), |r| r.to_string()),
            rest: e.rest_seconds.map_or_else(|| "-".to_string(), |r| format!("{r}s")),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..5)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    if let Some(ref saved) = result.saved {
        println!("Saved as workout #{}", saved.id);
    }

    Ok(())
}

pub(crate) fn cmd_meal_generate(
    svc: &FitTrackService,
    generator: &dyn PlanGenerator,
    user: &str,
    save: bool,
    json: bool,
) -> Result<()> {
    eprintln!("Generating meal plan...");
    let result = svc.generate_meal_plan(generator, user, save)?;

    if json {
        return print_json(&result);
    }

    let mut total = 0.0;
    for meal in &result.plan.meals {
        total += meal.calories;
        println!(
            "{:<10} {} ({} kcal, P {} / C {} / F {})",
            meal.meal_type,
            meal.name,
            fmt_amount(meal.calories),
            opt_amount(meal.protein),
            opt_amount(meal.carbs),
            opt_amount(meal.fats)
        );
        if !meal.ingredients.is_empty() {
            println!("           {}", meal.ingredients.join(", "));
        }
    }
    println!("Total: {} kcal", fmt_amount(total));

    if !result.saved.is_empty() {
        println!("Saved {} meal(s)", result.saved.len());
    }

    Ok(())
}

pub(crate) fn cmd_workout_history(
    svc: &FitTrackService,
    user: &str,
    limit: i64,
    json: bool,
) -> Result<()> {
    let workouts = svc.list_workouts(user, limit)?;

    if json {
        print_json(&workouts)?;
    } else if workouts.is_empty() {
        eprintln!("No saved workouts. Use `fittrack workout generate --save` to keep one.");
    } else {
        #[derive(Tabled)]
        struct WorkoutRow {
            #[tabled(rename = "ID")]
            id: i64,
            #[tabled(rename = "Name")]
            name: String,
            #[tabled(rename = "Difficulty")]
            difficulty: String,
            #[tabled(rename = "Minutes")]
            minutes: i64,
            #[tabled(rename = "Exercises")]
            exercises: usize,
            #[tabled(rename = "Created")]
            created: String,
        }

        let rows: Vec<WorkoutRow> = workouts
            .iter()
            .map(|w| WorkoutRow {
                id: w.id,
                name: truncate(&w.name, 30),
                difficulty: w.difficulty.to_string(),
                minutes: w.duration_minutes,
                exercises: w.exercises.as_array().map_or(0, Vec::len),
                created: w.created_at.chars().take(10).collect(),
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(3..5)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    Ok(())
}

pub(crate) fn cmd_meal_history(
    svc: &FitTrackService,
    user: &str,
    limit: i64,
    json: bool,
) -> Result<()> {
    let meals = svc.list_meals(user, limit)?;

    if json {
        print_json(&meals)?;
    } else if meals.is_empty() {
        eprintln!("No saved meals. Use `fittrack meal generate --save` to keep a plan.");
    } else {
        #[derive(Tabled)]
        struct MealRow {
            #[tabled(rename = "ID")]
            id: i64,
            #[tabled(rename = "Meal")]
            meal_type: String,
            #[tabled(rename = "Name")]
            name: String,
            #[tabled(rename = "Calories")]
            calories: String,
            #[tabled(rename = "Created")]
            created: String,
        }

        let rows: Vec<MealRow> = meals
            .iter()
            .map(|m| MealRow {
                id: m.id,
                meal_type: m.meal_type.clone(),
                name: truncate(&m.name, 30),
                calories: fmt_amount(m.calories),
                created: m.created_at.chars().take(10).collect(),
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    Ok(())
}
