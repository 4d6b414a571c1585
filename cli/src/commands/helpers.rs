use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;

use fittrack_core::models::HabitType;

pub(crate) const LBS_PER_KG: f64 = 2.20462;
const KG_PER_LB: f64 = 0.453_592;

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday")),
        },
    }
}

/// Convert a weight in `unit` (kg or lbs) to kilograms.
pub(crate) fn weight_to_kg(value: f64, unit: &str) -> Result<f64> {
    if !value.is_finite() || value <= 0.0 {
        bail!("Weight must be greater than 0");
    }
    match unit.to_lowercase().as_str() {
        "kg" => Ok(value),
        "lbs" | "lb" => Ok(no_neg_zero(value * KG_PER_LB)),
        _ => bail!("Invalid unit '{unit}'. Use 'kg' or 'lbs'"),
    }
}

/// A habit named on the command line, either by id or by type.
#[derive(Debug, PartialEq)]
pub(crate) enum HabitRef {
    Id(i64),
    Type(HabitType),
}

pub(crate) fn parse_habit_ref(s: &str) -> Result<HabitRef> {
    if let Ok(id) = s.parse::<i64>() {
        return Ok(HabitRef::Id(id));
    }
    s.parse::<HabitType>()
        .map(HabitRef::Type)
        .with_context(|| format!("'{s}' is neither a habit id nor a habit type"))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

/// Format a number without a trailing ".0" for whole values.
pub(crate) fn fmt_amount(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_none() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(None).unwrap(), today);
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday".to_string())).unwrap(),
            today - chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2024-01-15".to_string())).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date(Some("nope".to_string())).is_err());
        assert!(parse_date(Some("2024-02-30".to_string())).is_err());
    }

    #[test]
    fn test_weight_to_kg() {
        assert!((weight_to_kg(80.0, "kg").unwrap() - 80.0).abs() < f64::EPSILON);
        assert!((weight_to_kg(100.0, "LBS").unwrap() - 45.3592).abs() < 1e-6);
        assert!(weight_to_kg(80.0, "stone").is_err());
        assert!(weight_to_kg(0.0, "kg").is_err());
        assert!(weight_to_kg(-5.0, "lbs").is_err());
    }

    #[test]
    fn test_parse_habit_ref() {
        assert_eq!(parse_habit_ref("12").unwrap(), HabitRef::Id(12));
        assert_eq!(
            parse_habit_ref("Sleep").unwrap(),
            HabitRef::Type(HabitType::Sleep)
        );
        assert!(parse_habit_ref("jogging").is_err());
    }

    #[test]
    fn test_json_error() {
        let s = json_error("No weight entry for 2024-01-01");
        let v: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["error"], "No weight entry for 2024-01-01");
    }

    #[test]
    fn test_fmt_amount() {
        assert_eq!(fmt_amount(8.0), "8");
        assert_eq!(fmt_amount(7.5), "7.5");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Crème fraîche bowl", 10), "Crème f...");
        assert_eq!(truncate("Müsli", 10), "Müsli");
    }

    #[test]
    fn test_no_neg_zero() {
        assert_eq!(no_neg_zero(-0.0).to_bits(), 0.0_f64.to_bits());
        assert_eq!(no_neg_zero(-3.0), -3.0);
    }
}
