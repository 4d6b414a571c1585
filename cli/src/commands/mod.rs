mod habit;
mod helpers;
mod plan;
mod profile;
mod stats;
mod weight;

pub(crate) use habit::{cmd_badges, cmd_habit_add, cmd_habit_list, cmd_habit_log, cmd_habit_today};
pub(crate) use plan::{
    cmd_meal_generate, cmd_meal_history, cmd_workout_generate, cmd_workout_history,
};
pub(crate) use profile::{ProfileArgs, cmd_profile_set, cmd_profile_show};
pub(crate) use stats::cmd_stats;
pub(crate) use weight::{cmd_weight_delete, cmd_weight_history, cmd_weight_log, cmd_weight_show};
