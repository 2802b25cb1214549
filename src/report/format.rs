//! Number, currency and date formatting for the printed report.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::models::ProcurementItem;

/// Total for one line: amount plus its proportional tax.
pub fn item_total(amount: f64, tax_percentage: f64) -> f64 {
    let amount = if amount.is_finite() { amount } else { 0.0 };
    let tax = if tax_percentage.is_finite() {
        tax_percentage
    } else {
        0.0
    };
    amount + (amount * tax) / 100.0
}

/// Sum of every line total, computed from coerced numerics.
pub fn grand_total(items: &[ProcurementItem]) -> f64 {
    items
        .iter()
        .map(|item| item_total(item.amount(), item.tax()))
        .sum()
}

/// Format a rupee amount with Indian digit grouping, e.g. `₹12,34,567.80`.
pub fn format_inr(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let fixed = format!("{:.2}", value.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}₹{}.{}", sign, group_indian(whole), fraction)
}

/// Group an unsigned digit string as `xx,xx,xxx`.
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }

    let (head, last_three) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();

    format!("{},{}", groups.join(","), last_three)
}

/// Shortest plain rendering of a number (`12.5`, `1200`, `0`).
pub fn format_plain_number(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    // normalises -0.0
    format!("{}", value + 0.0)
}

/// Parse the date shapes the upstream layer sends (`YYYY-MM-DD`, RFC 3339,
/// or a naive SQL timestamp).
pub fn parse_report_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|stamp| stamp.date())
}

/// Indian short date (`5/3/2025`), falling back to the raw text when unparsable.
pub fn format_report_date(raw: &str) -> String {
    match parse_report_date(raw) {
        Some(date) => date.format("%-d/%-m/%Y").to_string(),
        None => raw.trim().to_string(),
    }
}

pub fn format_generated_at(generated_at: NaiveDateTime) -> String {
    generated_at.format("%-d/%-m/%Y, %H:%M").to_string()
}
