use std::time::Duration;

use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod pdf;
pub mod report;
pub mod state;

pub use crate::state::AppState;

/// Time allowed on exit for closing the engine after the in-flight grace.
const ENGINE_CLOSE_ALLOWANCE: Duration = Duration::from_secs(5);

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }

    pub fn service_unavailable(message: &str) -> Self {
        Self::new("ServiceUnavailable", message)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::pdf::handlers::generate_pdf,
        crate::pdf::handlers::queue_status,
        crate::pdf::handlers::render_metrics,
        crate::pdf::handlers::health
    ),
    components(
        schemas(
            pdf::handlers::GeneratePdfRequest,
            pdf::handlers::QueueStatusResponse,
            pdf::handlers::HealthResponse,
            pdf::QueueStatus,
            report::VendorInfo,
            report::ProcurementItem,
            report::ReportStats,
            report::ReportFilters,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Vendor Procurement PDF", description = "Vendor procurement report PDF generation."),
        (name = "Health", description = "Liveness endpoint.")
    ),
    servers(
        (url = "http://127.0.0.1:5001", description = "Local development server")
    )
)]
pub struct ApiDoc;

/// Register every application route under `/api`.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api").configure(pdf::handlers::config));
}

pub async fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = config::AppConfig::from_env().context("invalid configuration")?;
    let bind_address = (config.server.host.clone(), config.server.port);
    let allowed_origins = config.server.allowed_origins.clone();
    let shutdown_limit = config.pdf.shutdown_grace + ENGINE_CLOSE_ALLOWANCE;

    let app_state = AppState::new(config).context("failed to register render metrics")?;
    let pdf_queue = app_state.pdf_queue.clone();
    let app_state = web::Data::new(app_state);

    let prometheus = PrometheusMetricsBuilder::new("procurement_report_server")
        .endpoint("/metrics")
        .build()
        .map_err(|e| anyhow::anyhow!("failed to create Prometheus metrics middleware: {}", e))?;

    log::info!(
        "Starting server at http://{}:{}",
        bind_address.0,
        bind_address.1
    );

    HttpServer::new(move || {
        let cors = allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .expose_headers(vec![header::CONTENT_DISPOSITION])
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus.clone())
            .wrap(cors)
            .app_data(app_state.clone())
            .configure(configure_api)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind(bind_address)?
    .run()
    .await?;

    log::info!("HTTP server stopped; draining PDF queue");
    if !pdf::shutdown_with_grace(&pdf_queue, shutdown_limit).await {
        log::warn!("Exiting with PDF work still outstanding");
    }

    Ok(())
}
