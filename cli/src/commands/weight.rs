use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use fittrack_core::service::FitTrackService;

use super::helpers::{LBS_PER_KG, json_error, parse_date, print_json, weight_to_kg};

pub(crate) fn cmd_weight_log(
    svc: &FitTrackService,
    user: &str,
    value: f64,
    unit: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let weight_kg = weight_to_kg(value, unit)?;
    if !unit.eq_ignore_ascii_case("kg") {
        eprintln!("Converting {value:.1} {unit} → {weight_kg:.2} kg");
    }

    let date = parse_date(date)?;
    let result = svc.log_weight(user, Some(date), weight_kg)?;

    if json {
        print_json(&result)?;
    } else {
        println!(
            "Logged {:.1} kg ({:.1} lbs) for {}",
            result.weight_kg,
            result.weight_kg * LBS_PER_KG,
            result.date.format("%Y-%m-%d")
        );
        if let Some(trend) = svc.weight_trend(user)? {
            if trend.change_kg.abs() >= 0.05 {
                println!("  Change: {:+.1} kg", trend.change_kg);
            }
        }
    }

    Ok(())
}

pub(crate) fn cmd_weight_show(
    svc: &FitTrackService,
    user: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;

    if let Some(e) = svc.get_weight(user, date)? {
        if json {
            print_json(&e)?;
        } else {
            println!(
                "{}: {:.1} kg ({:.1} lbs)",
                e.date.format("%Y-%m-%d"),
                e.weight_kg,
                e.weight_kg * LBS_PER_KG
            );
        }
    } else {
        let message = format!("No weight entry for {}", date.format("%Y-%m-%d"));
        if json {
            println!("{}", json_error(&message));
        } else {
            eprintln!("{message}");
        }
    }

    Ok(())
}

pub(crate) fn cmd_weight_history(
    svc: &FitTrackService,
    user: &str,
    days: Option<u32>,
    json: bool,
) -> Result<()> {
    let entries = svc.get_weight_history(user, days.map(i64::from))?;

    if json {
        print_json(&entries)?;
    } else if entries.is_empty() {
        eprintln!("No weight entries found. Use `fittrack weight log` to record your weight.");
    } else {
        #[derive(Tabled)]
        struct WeightRow {
            #[tabled(rename = "ID")]
            id: i64,
            #[tabled(rename = "Date")]
            date: String,
            #[tabled(rename = "Weight (kg)")]
            kg: String,
            #[tabled(rename = "Weight (lbs)")]
            lbs: String,
        }

        let rows: Vec<WeightRow> = entries
            .iter()
            .map(|e| WeightRow {
                id: e.id,
                date: e.date.format("%Y-%m-%d").to_string(),
                kg: format!("{:.1}", e.weight_kg),
                lbs: format!("{:.1}", e.weight_kg * LBS_PER_KG),
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(2..4)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    Ok(())
}

pub(crate) fn cmd_weight_delete(svc: &FitTrackService, user: &str, id: i64, json: bool) -> Result<()> {
    svc.delete_weight(user, id)?;

    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted weight entry {id}");
    }

    Ok(())
}
