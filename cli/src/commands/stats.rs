use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use fittrack_core::service::FitTrackService;

use super::helpers::print_json;

pub(crate) fn cmd_stats(svc: &FitTrackService, user: &str, json: bool) -> Result<()> {
    let analytics = svc.analytics(user, FitTrackService::today())?;

    if json {
        return print_json(&analytics);
    }

    #[derive(Tabled)]
    struct CountRow {
        #[tabled(rename = "Period")]
        label: String,
        #[tabled(rename = "Completed")]
        completed: i64,
        #[tabled(rename = "Logged")]
        logged: i64,
    }

    let weekly: Vec<CountRow> = analytics
        .weekly
        .iter()
        .map(|d| CountRow {
            label: format!("{} {}", d.day, d.date.format("%m-%d")),
            completed: d.completed,
            logged: d.logged,
        })
        .collect();

    let monthly: Vec<CountRow> = analytics
        .monthly
        .iter()
        .map(|w| CountRow {
            label: format!("{} ({})", w.week, w.start.format("%m-%d")),
            completed: w.completed,
            logged: w.total,
        })
        .collect();

    println!("Last 7 days");
    println!(
        "{}",
        Table::new(&weekly)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..3)).with(Alignment::right()))
    );
    println!("\nLast 4 weeks");
    println!(
        "{}",
        Table::new(&monthly)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..3)).with(Alignment::right()))
    );

    if analytics.completion.is_empty() {
        eprintln!("\nNo habit logs in the last 30 days.");
    } else {
        println!("\nCompletion (30 days)");
        for rate in &analytics.completion {
            println!(
                "  {:<10} {:>3}%  ({}/{})",
                rate.name, rate.value, rate.completed, rate.total
            );
        }
    }

    Ok(())
}
