//! Common helpers for report output: escaping and download filenames.

use chrono::NaiveDate;

use super::models::VendorInfo;

/// Escape text for safe interpolation into HTML element content or attributes.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Sanitize a string for use in filenames: every non-alphanumeric ASCII
/// character becomes `_`.
pub fn sanitize_filename(name: &str, fallback: &str) -> String {
    let result: String = name
        .trim()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect();

    if result.is_empty() {
        return fallback.to_string();
    }

    result
}

/// Download name for a vendor report, e.g.
/// `vendor_procurement_Shree_Granites_2025-03-05.pdf`.
pub fn report_filename(vendor: &VendorInfo, date: NaiveDate) -> String {
    let vendor_name = sanitize_filename(vendor.identity().unwrap_or_default(), "vendor");
    format!(
        "vendor_procurement_{}_{}.pdf",
        vendor_name,
        date.format("%Y-%m-%d")
    )
}
