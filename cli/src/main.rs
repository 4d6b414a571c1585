mod commands;
mod config;
mod gateway;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    ProfileArgs, cmd_badges, cmd_habit_add, cmd_habit_list, cmd_habit_log, cmd_habit_today,
    cmd_meal_generate, cmd_meal_history, cmd_profile_set, cmd_profile_show, cmd_stats,
    cmd_weight_delete, cmd_weight_history, cmd_weight_log, cmd_weight_show, cmd_workout_generate,
    cmd_workout_history,
};
use crate::config::Config;
use crate::gateway::GatewayClient;
use fittrack_core::service::FitTrackService;

#[derive(Parser)]
#[command(
    name = "fittrack",
    version,
    about = "Track habits, streaks, and weight, and generate workout and meal plans"
)]
struct Cli {
    /// User to act as
    #[arg(long, global = true, env = "FITTRACK_USER", default_value = "local")]
    user: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or edit your profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Manage and log daily habits
    Habit {
        #[command(subcommand)]
        command: HabitCommands,
    },
    /// List earned streak badges
    Badges {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show habit activity for the last 30 days
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Track body weight
    Weight {
        #[command(subcommand)]
        command: WeightCommands,
    },
    /// Generate and review workouts
    Workout {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Generate and review meal plans
    Meal {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (use 0.0.0.0 for LAN access)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show the current profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create or update profile fields
    Set {
        /// Full name
        #[arg(long)]
        name: Option<String>,
        /// Gender: male, female, other
        #[arg(long)]
        gender: Option<String>,
        /// Age in years
        #[arg(long)]
        age: Option<i64>,
        /// Body weight
        #[arg(long)]
        weight: Option<f64>,
        /// Unit for --weight: kg or lbs
        #[arg(short, long, default_value = "kg")]
        unit: String,
        /// Height in cm
        #[arg(long)]
        height: Option<f64>,
        /// Goal: weight_loss, muscle_gain, maintain, general_fitness
        #[arg(long)]
        goal: Option<String>,
        /// Diet: none, vegetarian, vegan, keto, paleo, mediterranean
        #[arg(long)]
        diet: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum HabitCommands {
    /// List habits with their streaks
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a habit
    Add {
        /// Habit type: water, sleep, smoking, wellness
        habit_type: String,
        /// Daily target value
        target: f64,
        /// Unit label (e.g. glasses, hours, minutes)
        unit: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record a value for a habit
    Log {
        /// Habit ID or type (e.g. 3 or water)
        habit: String,
        /// Value for the day
        value: f64,
        /// Date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show progress for a day (default: today)
    Today {
        /// Date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum WeightCommands {
    /// Log a weight entry
    Log {
        /// Weight value (number)
        value: f64,
        /// Unit: kg or lbs (default: kg)
        #[arg(short, long, default_value = "kg")]
        unit: String,
        /// Date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show weight for a specific date (default: today)
    Show {
        /// Date (YYYY-MM-DD or today/yesterday, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show weight history
    History {
        /// Number of days to show (default: all)
        #[arg(short, long)]
        days: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a weight entry by ID
    Delete {
        /// Weight entry ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Generate a new plan from your profile
    Generate {
        /// Save the generated plan to history
        #[arg(long)]
        save: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show saved plans, newest first
    History {
        /// Maximum number of entries
        #[arg(short, long, default_value = "20")]
        limit: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Logs go to stderr. `RUST_LOG` overrides the default level, which is
/// `info` for the server and `warn` for one-shot commands.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(if matches!(cli.command, Commands::Serve { .. }) {
        "info"
    } else {
        "warn"
    });

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let gateway = GatewayClient::new(config.gateway.clone())?;
    let user = cli.user.as_str();

    let svc = FitTrackService::new(&config.db_path)?;

    match cli.command {
        Commands::Profile { command } => match command {
            ProfileCommands::Show { json } => cmd_profile_show(&svc, user, json),
            ProfileCommands::Set {
                name,
                gender,
                age,
                weight,
                unit,
                height,
                goal,
                diet,
                json,
            } => cmd_profile_set(
                &svc,
                user,
                ProfileArgs {
                    name,
                    gender,
                    age,
                    weight,
                    unit,
                    height,
                    goal,
                    diet,
                },
                json,
            ),
        },
        Commands::Habit { command } => match command {
            HabitCommands::List { json } => cmd_habit_list(&svc, user, json),
            HabitCommands::Add {
                habit_type,
                target,
                unit,
                json,
            } => cmd_habit_add(&svc, user, &habit_type, target, &unit, json),
            HabitCommands::Log {
                habit,
                value,
                date,
                json,
            } => cmd_habit_log(&svc, user, &habit, value, date, json),
            HabitCommands::Today { date, json } => cmd_habit_today(&svc, user, date, json),
        },
        Commands::Badges { json } => cmd_badges(&svc, user, json),
        Commands::Stats { json } => cmd_stats(&svc, user, json),
        Commands::Weight { command } => match command {
            WeightCommands::Log {
                value,
                unit,
                date,
                json,
            } => cmd_weight_log(&svc, user, value, &unit, date, json),
            WeightCommands::Show { date, json } => cmd_weight_show(&svc, user, date, json),
            WeightCommands::History { days, json } => cmd_weight_history(&svc, user, days, json),
            WeightCommands::Delete { id, json } => cmd_weight_delete(&svc, user, id, json),
        },
        Commands::Workout { command } => match command {
            PlanCommands::Generate { save, json } => {
                cmd_workout_generate(&svc, &gateway, user, save, json)
            }
            PlanCommands::History { limit, json } => cmd_workout_history(&svc, user, limit, json),
        },
        Commands::Meal { command } => match command {
            PlanCommands::Generate { save, json } => {
                cmd_meal_generate(&svc, &gateway, user, save, json)
            }
            PlanCommands::History { limit, json } => cmd_meal_history(&svc, user, limit, json),
        },
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                Some(config.load_or_create_api_key()?.0)
            };
            server::start_server(svc.into_database(), gateway, port, &bind, api_key).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_habit_log_with_global_user() {
        let cli = Cli::try_parse_from([
            "fittrack", "habit", "log", "water", "6", "--date", "yesterday", "--user", "alice",
        ])
        .unwrap();
        assert_eq!(cli.user, "alice");
        match cli.command {
            Commands::Habit {
                command:
                    HabitCommands::Log {
                        habit, value, date, ..
                    },
            } => {
                assert_eq!(habit, "water");
                assert!((value - 6.0).abs() < f64::EPSILON);
                assert_eq!(date.as_deref(), Some("yesterday"));
            }
            _ => panic!("expected habit log"),
        }
    }

    #[test]
    fn plan_history_defaults_limit() {
        let cli = Cli::try_parse_from(["fittrack", "meal", "history"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Meal {
                command: PlanCommands::History { limit: 20, .. }
            }
        ));
    }
}
