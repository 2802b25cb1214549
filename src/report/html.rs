//! HTML rendering of the vendor procurement report.
//!
//! The output is handed to the print engine as-is, so it must be a complete,
//! self-contained document with inline styles and no external requests.

use chrono::NaiveDateTime;

use super::common::escape_html;
use super::format::{
    format_generated_at, format_inr, format_plain_number, format_report_date, grand_total,
    item_total,
};
use super::models::{finite_or_zero, non_blank, ProcurementItem, ReportPayload, ReportStats};

pub const REPORT_TITLE: &str = "Vendor Procurement Report";
pub const NO_DATA_MESSAGE: &str = "No procurement items found for the specified criteria";
const NOT_AVAILABLE: &str = "N/A";

const STYLESHEET: &str = r#"
@page { size: A4; margin: 20mm 15mm 20mm 15mm; }
body { font-family: Arial, sans-serif; font-size: 11px; line-height: 1.3; margin: 0; padding: 0; }
.header { text-align: center; margin-bottom: 20px; border-bottom: 2px solid #333; padding-bottom: 15px; }
.header h1 { margin: 0; color: #333; font-size: 20px; }
.header .date { margin-top: 8px; color: #666; font-size: 10px; }
.vendor-info { background-color: #f8f9fa; padding: 15px; margin-bottom: 20px; border-radius: 5px; }
.vendor-info h2 { margin-top: 0; color: #333; border-bottom: 1px solid #ddd; padding-bottom: 8px; font-size: 14px; }
.vendor-details { display: grid; grid-template-columns: 1fr 1fr; gap: 15px; }
.vendor-details div { margin-bottom: 6px; font-size: 10px; }
.filters, .stats { padding: 12px; margin-bottom: 15px; border-radius: 5px; }
.filters { background-color: #e3f2fd; }
.stats { background-color: #f1f8e9; }
.filters h3, .stats h3 { margin-top: 0; color: #1976d2; font-size: 12px; }
table { width: 100%; border-collapse: collapse; margin-top: 15px; font-size: 9px; }
th, td { border: 1px solid #ddd; padding: 6px 4px; text-align: left; }
th { background-color: #f5f5f5; font-weight: bold; color: #333; font-size: 8px; }
tr:nth-child(even) { background-color: #f9f9f9; }
.amount { text-align: right; font-weight: bold; }
.total-row { background-color: #e8f5e8 !important; font-weight: bold; }
.no-data { text-align: center; padding: 30px; color: #666; }
@media print {
  .header { page-break-after: avoid; }
  table { page-break-inside: auto; }
  tr { page-break-inside: avoid; }
}
"#;

/// Render the complete report document.
///
/// Deterministic for a given payload and `generated_at`; the timestamp is the
/// only input that does not come from the payload.
pub fn render_report(payload: &ReportPayload, generated_at: NaiveDateTime) -> String {
    let mut html = String::with_capacity(4096 + payload.items.len() * 512);

    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", REPORT_TITLE));
    html.push_str(&format!("<style>{}</style>\n", STYLESHEET));
    html.push_str("</head>\n<body>\n");

    html.push_str(&format!(
        "<div class=\"header\">\n<h1>{}</h1>\n<div class=\"date\">Generated on: {}</div>\n</div>\n",
        REPORT_TITLE,
        format_generated_at(generated_at)
    ));

    push_vendor_block(&mut html, payload);
    push_filters_block(&mut html, payload);
    if let Some(stats) = &payload.stats {
        push_stats_block(&mut html, stats);
    }

    if payload.items.is_empty() {
        html.push_str(&format!(
            "<div class=\"no-data\">\n<h3>{}</h3>\n</div>\n",
            NO_DATA_MESSAGE
        ));
    } else {
        push_items_table(&mut html, &payload.items);
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn or_na(value: &Option<String>) -> String {
    escape_html(non_blank(value).unwrap_or(NOT_AVAILABLE))
}

fn detail(label: &str, value: &Option<String>) -> String {
    format!("<div><strong>{}:</strong> {}</div>\n", label, or_na(value))
}

fn push_vendor_block(html: &mut String, payload: &ReportPayload) {
    let vendor = &payload.vendor;

    html.push_str("<div class=\"vendor-info\">\n<h2>Vendor Information</h2>\n");
    html.push_str("<div class=\"vendor-details\">\n<div>\n");
    html.push_str(&detail("Company Name", &vendor.company_name));
    html.push_str(&detail("Contact Person", &vendor.contact_person));
    html.push_str(&detail("Phone Number", &vendor.phone_number));
    html.push_str(&detail("Email ID", &vendor.email_address));
    html.push_str("</div>\n<div>\n");
    html.push_str(&detail("City", &vendor.city));
    html.push_str(&detail("State", &vendor.state));
    html.push_str(&detail("GST Number", &vendor.gst_number));
    html.push_str(&detail("Complete Address", &vendor.complete_address));
    html.push_str("</div>\n</div>\n</div>\n");
}

/// Human-readable descriptors for every filter that is set.
pub fn applied_filters(payload: &ReportPayload) -> Vec<String> {
    let filters = &payload.filters;
    let mut applied = Vec::new();

    if let Some(start) = non_blank(&filters.start_date) {
        applied.push(format!("From: {}", escape_html(&format_report_date(start))));
    }
    if let Some(end) = non_blank(&filters.end_date) {
        applied.push(format!("To: {}", escape_html(&format_report_date(end))));
    }
    if let Some(stone_type) = non_blank(&filters.stone_type) {
        applied.push(format!("Stone Type: {}", escape_html(stone_type)));
    }
    if let Some(stone_name) = non_blank(&filters.stone_name) {
        applied.push(format!("Stone Name: {}", escape_html(stone_name)));
    }

    applied
}

fn push_filters_block(html: &mut String, payload: &ReportPayload) {
    if payload.filters.is_empty() {
        return;
    }
    let applied = applied_filters(payload);

    html.push_str(&format!(
        "<div class=\"filters\">\n<h3>Applied Filters</h3>\n<div>{}</div>\n</div>\n",
        applied.join(" | ")
    ));
}

fn push_stats_block(html: &mut String, stats: &ReportStats) {
    html.push_str("<div class=\"stats\">\n<h3>Summary</h3>\n<div>");
    html.push_str(&format!(
        "Total Items: {} | Total Quantity: {} | Total Amount: {} | Avg GST: {}%",
        format_plain_number(finite_or_zero(stats.total_items)),
        format_plain_number(finite_or_zero(stats.total_quantity)),
        format_inr(finite_or_zero(stats.total_amount)),
        format_plain_number(round2(finite_or_zero(stats.avg_tax_percentage))),
    ));
    html.push_str("</div>\n</div>\n");
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `L x W x T` from whichever dimensions are present.
pub fn format_dimensions(item: &ProcurementItem) -> String {
    let dims: Vec<String> = [item.length_mm, item.width_mm, item.thickness_mm]
        .into_iter()
        .flatten()
        .filter(|value| value.is_finite())
        .map(format_plain_number)
        .collect();

    if dims.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        dims.join(" x ")
    }
}

fn format_stone(item: &ProcurementItem) -> String {
    let name = non_blank(&item.stone_name).unwrap_or("Unknown");
    let kind = non_blank(&item.stone_type).unwrap_or("Unknown");
    escape_html(&format!("{}/{}", name, kind))
}

fn format_quantity(item: &ProcurementItem) -> String {
    let quantity = format_plain_number(finite_or_zero(item.quantity));
    match non_blank(&item.units) {
        Some(units) => format!("{} {}", quantity, escape_html(units)),
        None => quantity,
    }
}

fn push_items_table(html: &mut String, items: &[ProcurementItem]) {
    html.push_str(concat!(
        "<table>\n<thead>\n<tr>",
        "<th>S.No.</th><th>Stone Name/Type</th><th>Dimensions (mm)</th><th>Quantity</th>",
        "<th>Date</th><th>Item Amount</th><th>GST %</th><th>Total (After GST)</th>",
        "</tr>\n</thead>\n<tbody>\n"
    ));

    for (index, item) in items.iter().enumerate() {
        let amount = item.amount();
        let tax = item.tax();
        let date = non_blank(&item.created_at)
            .map(|raw| escape_html(&format_report_date(raw)))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        html.push_str(&format!(
            concat!(
                "<tr class=\"item-row\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>",
                "<td class=\"amount\">{}</td><td>{}%</td><td class=\"amount\">{}</td></tr>\n"
            ),
            index + 1,
            format_stone(item),
            format_dimensions(item),
            format_quantity(item),
            date,
            format_inr(amount),
            format_plain_number(tax),
            format_inr(item_total(amount, tax)),
        ));
    }

    html.push_str(&format!(
        concat!(
            "<tr class=\"total-row\"><td colspan=\"7\"><strong>GRAND TOTAL</strong></td>",
            "<td class=\"amount\"><strong>{}</strong></td></tr>\n"
        ),
        format_inr(grand_total(items))
    ));
    html.push_str("</tbody>\n</table>\n");
}
