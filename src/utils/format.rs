// Text helpers shared by the CLI renderers.
use chrono::{DateTime, Local};

pub fn format_currency(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${:.2}", amount.abs())
    } else {
        format!("${:.2}", amount)
    }
}

pub fn budget_label(budget: Option<f64>) -> String {
    match budget {
        Some(b) if b > 0.0 => format!("Budget: {}", format_currency(b)),
        _ => "Budget TBD".to_string(),
    }
}

/// `"pending"` -> `"Pending"`.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn format_date(raw: Option<&str>) -> String {
    match raw.and_then(|r| DateTime::parse_from_rfc3339(r).ok()) {
        Some(dt) => dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        None => "No date".to_string(),
    }
}
