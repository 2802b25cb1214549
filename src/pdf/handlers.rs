use actix_web::{http::header, web, HttpResponse, Responder};
use chrono::Local;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::RenderError;
use super::service::QueueStatus;
use crate::report::{
    report_filename, ProcurementItem, ReportFilters, ReportPayload, ReportStats, VendorInfo,
};
use crate::{AppState, ErrorResponse};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePdfRequest {
    #[serde(default)]
    pub vendor: Option<VendorInfo>,
    #[serde(default)]
    pub items: Option<Vec<ProcurementItem>>,
    #[serde(default)]
    pub stats: Option<ReportStats>,
    #[serde(default)]
    pub filters: Option<ReportFilters>,
    /// Required to be `true` for reports above the large-report threshold.
    #[serde(default)]
    pub confirm_large_report: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct QueueStatusResponse {
    pub success: bool,
    pub data: QueueStatus,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

fn error_response(error: &RenderError) -> HttpResponse {
    HttpResponse::build(error.status_code())
        .json(ErrorResponse::new(error.kind(), &error.user_message()))
}

#[utoipa::path(
    post,
    path = "/api/vendor-procurement/pdf",
    tag = "Vendor Procurement PDF",
    request_body = GeneratePdfRequest,
    responses(
        (status = 200, description = "Generated PDF report"),
        (status = 400, description = "Missing vendor or items, or unconfirmed large report", body = ErrorResponse),
        (status = 500, description = "Rendering failed", body = ErrorResponse),
        (status = 503, description = "Queue full, engine unavailable or shutting down", body = ErrorResponse),
        (status = 504, description = "Timed out in the queue or while rendering", body = ErrorResponse)
    )
)]
pub async fn generate_pdf(
    state: web::Data<AppState>,
    body: web::Json<GeneratePdfRequest>,
) -> impl Responder {
    let request = body.into_inner();

    let vendor = match request.vendor {
        Some(vendor) if vendor.identity().is_some() => vendor,
        _ => {
            return HttpResponse::BadRequest().json(ErrorResponse::bad_request(
                "Vendor information with a company name is required",
            ))
        }
    };

    let items = request.items.unwrap_or_default();
    if items.is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse::bad_request(
            "No procurement items to include in the report",
        ));
    }

    let threshold = state.pdf_queue.config().large_report_threshold;
    if items.len() > threshold && !request.confirm_large_report.unwrap_or(false) {
        log::info!(
            "Large PDF report ({} items) requested without confirmation",
            items.len()
        );
        return HttpResponse::BadRequest().json(ErrorResponse::new(
            "LargeReportConfirmationRequired",
            &format!(
                "This report has {} items and may take a while to generate. Resend with confirmLargeReport set to true to continue.",
                items.len()
            ),
        ));
    }

    let filename = report_filename(&vendor, Local::now().date_naive());
    let payload = ReportPayload {
        vendor,
        items,
        stats: request.stats,
        filters: request.filters.unwrap_or_default(),
    };

    match state.pdf_queue.enqueue(payload).await {
        Ok(pdf) => HttpResponse::Ok()
            .content_type("application/pdf")
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ))
            .body(pdf),
        Err(e) => {
            log::error!("PDF generation for {} failed: {}", filename, e);
            error_response(&e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/vendor-procurement/pdf/queue-status",
    tag = "Vendor Procurement PDF",
    responses(
        (status = 200, description = "Current render queue status", body = QueueStatusResponse)
    )
)]
pub async fn queue_status(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(QueueStatusResponse {
        success: true,
        data: state.pdf_queue.status(),
    })
}

#[utoipa::path(
    get,
    path = "/api/vendor-procurement/pdf/metrics",
    tag = "Vendor Procurement PDF",
    responses(
        (status = 200, description = "Render queue metrics in Prometheus text format"),
        (status = 500, description = "Metrics could not be encoded", body = ErrorResponse)
    )
)]
pub async fn render_metrics(state: web::Data<AppState>) -> impl Responder {
    match state.pdf_queue.metrics_text() {
        Ok(text) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(text),
        Err(e) => {
            log::error!("Failed to encode render metrics: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to encode metrics"))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses(
        (status = 200, description = "Server is running", body = HealthResponse)
    )
)]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "OK".to_string(),
        message: "Vendor procurement report server is running".to_string(),
    })
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/vendor-procurement/pdf").route(web::post().to(generate_pdf)))
        .service(
            web::resource("/vendor-procurement/pdf/queue-status")
                .route(web::get().to(queue_status)),
        )
        .service(
            web::resource("/vendor-procurement/pdf/metrics").route(web::get().to(render_metrics)),
        );
}
