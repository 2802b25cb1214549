//! Report module - turns a vendor procurement payload into a printable HTML
//! document.
//!
//! Everything here is pure: no I/O, no shared state. The PDF queue calls
//! [`render_report`] right before handing the document to the print engine.

pub mod common;
pub mod format;
pub mod html;
pub mod models;
pub mod validation;

pub use common::report_filename;
pub use format::{format_inr, grand_total, item_total};
pub use html::{render_report, NO_DATA_MESSAGE, REPORT_TITLE};
pub use models::{ProcurementItem, ReportFilters, ReportPayload, ReportStats, VendorInfo};
pub use validation::Validator;
