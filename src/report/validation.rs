//! Input validation for report payloads.
//!
//! Errors carry the offending field plus a hint so the HTTP layer can hand
//! them straight back to the procurement UI.

use std::fmt;

use super::format::parse_report_date;
use super::models::{non_blank, ReportPayload};

/// Validation error with a field path and an optional fix-it hint.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Create error for empty required field
    pub fn empty_field(field: &str, label: &str) -> Self {
        Self::new(field, format!("{} is required", label))
            .with_suggestion(format!("Provide a non-empty {}", label.to_lowercase()))
    }

    pub fn invalid_date_range(field: &str) -> Self {
        Self::new(field, "End date must not be before start date")
            .with_suggestion("Swap the dates or widen the range")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, ". {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors with formatted output.
#[derive(Debug, Default)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn to_message(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Ok if no errors, Err with the joined message otherwise.
    pub fn into_result(self) -> Result<(), String> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.to_message())
        }
    }
}

/// Trait for validating request objects.
pub trait Validator {
    fn validate(&self) -> Result<(), String>;
}

/// Validate that a string is present and not blank.
pub fn validate_required(
    value: &Option<String>,
    field: &str,
    label: &str,
    errors: &mut ValidationErrors,
) {
    if non_blank(value).is_none() {
        errors.add(ValidationError::empty_field(field, label));
    }
}

impl Validator for ReportPayload {
    fn validate(&self) -> Result<(), String> {
        let mut errors = ValidationErrors::new();

        validate_required(
            &self.vendor.company_name,
            "vendor.companyName",
            "Company name",
            &mut errors,
        );

        let start = non_blank(&self.filters.start_date).and_then(parse_report_date);
        let end = non_blank(&self.filters.end_date).and_then(parse_report_date);
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                errors.add(ValidationError::invalid_date_range("filters.endDate"));
            }
        }

        errors.into_result()
    }
}
