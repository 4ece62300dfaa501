//! Built-in tools offered to models when a model config enables them.
//!
//! Every tool is a pure function of its JSON arguments and the current time.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Roughly ten thousand years.
const MAX_SHIFT_DAYS: u64 = 3_650_000;

/// A tool definition in provider-agnostic format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments.
    pub parameters: Value,
}

/// Definitions of every built-in tool.
pub fn builtin_tool_defs() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "getCurrentDate".into(),
            description: "Get the current date".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "format": {
                        "type": "string",
                        "description": "The format to return the date in, e.g. \"YYYY-MM-DD\""
                    }
                },
                "required": ["format"]
            }),
        },
        ToolDef {
            name: "dateCalculation".into(),
            description: "Calculate the difference between two dates or add/subtract days from a given date".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "startDate": {
                        "type": "string",
                        "description": "The start date in YYYY-MM-DD format"
                    },
                    "endDate": {
                        "type": "string",
                        "description": "The end date in YYYY-MM-DD format"
                    },
                    "daysToAdd": {
                        "type": "number",
                        "description": "The number of days to add to the start date"
                    },
                    "daysToSubtract": {
                        "type": "number",
                        "description": "The number of days to subtract from the start date"
                    }
                },
                "required": ["startDate"]
            }),
        },
        ToolDef {
            name: "getCurrentTime".into(),
            description: "Get the current time".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "format": {
                        "type": "string",
                        "description": "The format to return the time in, e.g. \"12-hour\" or \"24-hour\"",
                        "enum": ["12-hour", "24-hour"]
                    }
                },
                "required": ["format"]
            }),
        },
        ToolDef {
            name: "calculateBMI".into(),
            description: "Calculate the Body Mass Index (BMI) based on height and weight".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "height": { "type": "number", "description": "The height in meters" },
                    "weight": { "type": "number", "description": "The weight in kilograms" }
                },
                "required": ["height", "weight"]
            }),
        },
    ]
}

/// Run a tool by name. `None` for unknown tools.
pub fn execute(name: &str, args: &Value) -> Option<String> {
    execute_at(name, args, Utc::now())
}

fn execute_at(name: &str, args: &Value, now: DateTime<Utc>) -> Option<String> {
    debug!("[tools] {name} {args}");
    let output = match name {
        "getCurrentDate" => current_date(args, now),
        "getCurrentTime" => current_time(args, now),
        "dateCalculation" => date_calculation(args),
        "calculateBMI" => bmi(args),
        _ => return None,
    };
    Some(output)
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

/// Whole days from a numeric argument; zero counts as absent.
fn days_arg(args: &Value, key: &str) -> Option<i64> {
    args.get(key)
        .and_then(Value::as_f64)
        .map(|d| d as i64)
        .filter(|d| *d != 0)
}

fn current_date(args: &Value, now: DateTime<Utc>) -> String {
    let format = str_arg(args, "format").unwrap_or("YYYY-MM-DD");
    format
        .replacen("YYYY", &now.year().to_string(), 1)
        .replacen("MM", &format!("{:02}", now.month()), 1)
        .replacen("DD", &format!("{:02}", now.day()), 1)
}

fn current_time(args: &Value, now: DateTime<Utc>) -> String {
    let (h, m, s) = (now.hour(), now.minute(), now.second());
    if str_arg(args, "format") == Some("12-hour") {
        let ampm = if h >= 12 { "pm" } else { "am" };
        let h12 = if h % 12 == 0 { 12 } else { h % 12 };
        format!("{h12}:{m}:{s} {ampm}")
    } else {
        format!("{h}:{m}:{s}")
    }
}

fn date_calculation(args: &Value) -> String {
    let Some(raw_start) = str_arg(args, "startDate") else {
        return "Please provide a start date in YYYY-MM-DD format.".into();
    };
    let Ok(start) = NaiveDate::parse_from_str(raw_start, "%Y-%m-%d") else {
        return format!("The start date {raw_start} is not in YYYY-MM-DD format.");
    };

    if let Some(raw_end) = str_arg(args, "endDate") {
        return match NaiveDate::parse_from_str(raw_end, "%Y-%m-%d") {
            Ok(end) => {
                let days = end.signed_duration_since(start).num_days().abs();
                format!("The difference between {raw_start} and {raw_end} is {days} days.")
            }
            Err(_) => format!("The end date {raw_end} is not in YYYY-MM-DD format."),
        };
    }

    if let Some(days) = days_arg(args, "daysToAdd") {
        return match shift(start, days) {
            Some(date) => format!("The new date after adding {days} days is {date}."),
            None => "The resulting date is out of range.".into(),
        };
    }

    if let Some(days) = days_arg(args, "daysToSubtract") {
        return match shift(start, -days) {
            Some(date) => format!("The new date after subtracting {days} days is {date}."),
            None => "The resulting date is out of range.".into(),
        };
    }

    "Please provide either an end date, days to add, or days to subtract.".into()
}

fn shift(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    if days.unsigned_abs() > MAX_SHIFT_DAYS {
        return None;
    }
    date.checked_add_signed(Duration::days(days))
}

fn bmi(args: &Value) -> String {
    let height = args.get("height").and_then(Value::as_f64);
    let weight = args.get("weight").and_then(Value::as_f64);
    match (height, weight) {
        (Some(height), Some(weight)) if height > 0.0 => {
            let bmi = weight / (height * height);
            format!(
                "The BMI for a height of {height} meters and a weight of {weight} kilograms is {bmi:.2}."
            )
        }
        _ => "Please provide a positive height in meters and a weight in kilograms.".into(),
    }
}
