use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Vendor identity block printed at the top of the report.
///
/// Upstream records arrive either straight from SQL (`snake_case`) or from the
/// API layer (`camelCase`), so both spellings are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VendorInfo {
    #[serde(default, alias = "company_name")]
    pub company_name: Option<String>,
    #[serde(default, alias = "contact_person")]
    pub contact_person: Option<String>,
    #[serde(default, alias = "phone_number")]
    pub phone_number: Option<String>,
    #[serde(default, alias = "email_address")]
    pub email_address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, alias = "gst_number")]
    pub gst_number: Option<String>,
    #[serde(default, alias = "complete_address")]
    pub complete_address: Option<String>,
}

impl VendorInfo {
    /// Company name when present and not blank.
    pub fn identity(&self) -> Option<&str> {
        self.company_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// One procured stone line.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcurementItem {
    #[serde(default, alias = "stone_name")]
    pub stone_name: Option<String>,
    #[serde(default, alias = "stone_type")]
    pub stone_type: Option<String>,
    #[serde(default, alias = "length_mm", deserialize_with = "lenient_number")]
    pub length_mm: Option<f64>,
    #[serde(default, alias = "width_mm", deserialize_with = "lenient_number")]
    pub width_mm: Option<f64>,
    #[serde(default, alias = "thickness_mm", deserialize_with = "lenient_number")]
    pub thickness_mm: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default, alias = "item_amount", deserialize_with = "lenient_number")]
    pub item_amount: Option<f64>,
    #[serde(default, alias = "tax_percentage", deserialize_with = "lenient_number")]
    pub tax_percentage: Option<f64>,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<String>,
}

impl ProcurementItem {
    /// Item amount coerced to a finite number; missing or garbage is zero.
    pub fn amount(&self) -> f64 {
        finite_or_zero(self.item_amount)
    }

    /// Tax percentage coerced to a finite number; missing or garbage is zero.
    pub fn tax(&self) -> f64 {
        finite_or_zero(self.tax_percentage)
    }
}

/// Aggregates computed upstream over the filtered item set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportStats {
    #[serde(default, alias = "total_items", deserialize_with = "lenient_number")]
    pub total_items: Option<f64>,
    #[serde(default, alias = "total_quantity", deserialize_with = "lenient_number")]
    pub total_quantity: Option<f64>,
    #[serde(default, alias = "total_amount", deserialize_with = "lenient_number")]
    pub total_amount: Option<f64>,
    #[serde(
        default,
        alias = "avg_tax_percentage",
        deserialize_with = "lenient_number"
    )]
    pub avg_tax_percentage: Option<f64>,
}

/// Filters the upstream query applied; echoed in the report header.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportFilters {
    #[serde(default, alias = "start_date")]
    pub start_date: Option<String>,
    #[serde(default, alias = "end_date")]
    pub end_date: Option<String>,
    #[serde(default, alias = "stone_type")]
    pub stone_type: Option<String>,
    #[serde(default, alias = "stone_name")]
    pub stone_name: Option<String>,
}

impl ReportFilters {
    pub fn is_empty(&self) -> bool {
        [
            &self.start_date,
            &self.end_date,
            &self.stone_type,
            &self.stone_name,
        ]
        .iter()
        .all(|value| non_blank(value).is_none())
    }
}

/// Everything the renderer needs to produce one vendor procurement report.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    pub vendor: VendorInfo,
    #[serde(default)]
    pub items: Vec<ProcurementItem>,
    #[serde(default)]
    pub stats: Option<ReportStats>,
    #[serde(default)]
    pub filters: ReportFilters,
}

pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

pub(crate) fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|number| number.is_finite()).unwrap_or(0.0)
}

/// Coerce a loosely typed JSON value to a finite number.
///
/// Numbers pass through, numeric strings are parsed, everything else is `None`.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_number))
}
