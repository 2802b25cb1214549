//! HTTP tests for the vendor procurement PDF routes.

mod common;

use std::sync::Arc;

use actix_web::{http::header, http::StatusCode, test, web, App};
use serde_json::{json, Value};

use common::{test_config, MockLauncher, Step};
use procurement_report_server::config::AppConfig;
use procurement_report_server::{configure_api, AppState};

fn app_state(launcher: &MockLauncher, large_report_threshold: usize) -> web::Data<AppState> {
    let mut config = AppConfig::default();
    config.pdf = test_config();
    config.pdf.large_report_threshold = large_report_threshold;
    web::Data::new(AppState::with_launcher(config, Arc::new(launcher.clone())).unwrap())
}

fn request_body(items: usize) -> Value {
    let items: Vec<Value> = (0..items)
        .map(|i| {
            json!({
                "stoneName": format!("Stone {}", i),
                "stoneType": "Marble",
                "itemAmount": "100",
                "taxPercentage": 18
            })
        })
        .collect();
    json!({
        "vendor": { "companyName": "Shree Granites & Co.", "city": "Jaipur" },
        "items": items,
        "filters": { "startDate": "2025-01-01" }
    })
}

#[actix_web::test]
async fn test_generate_pdf_returns_attachment() {
    let launcher = MockLauncher::new();
    let app = test::init_service(
        App::new()
            .app_data(app_state(&launcher, 1000))
            .configure(configure_api),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/vendor-procurement/pdf")
        .set_json(request_body(2))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap();
    assert_eq!(content_type.to_str().unwrap(), "application/pdf");
    let disposition = resp
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"vendor_procurement_Shree_Granites___Co__"));
    assert!(disposition.ends_with(".pdf\""));

    let body = test::read_body(resp).await;
    assert!(body.starts_with(b"%PDF-mock"));

    let rendered = launcher.state.rendered();
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].contains("Shree Granites &amp; Co."));
    assert!(rendered[0].contains("From: 1/1/2025"));
}

#[actix_web::test]
async fn test_generate_pdf_requires_items() {
    let launcher = MockLauncher::new();
    let app = test::init_service(
        App::new()
            .app_data(app_state(&launcher, 1000))
            .configure(configure_api),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/vendor-procurement/pdf")
        .set_json(request_body(0))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "BadRequest");
    assert_eq!(launcher.state.prints(), 0);
}

#[actix_web::test]
async fn test_generate_pdf_requires_vendor_name() {
    let launcher = MockLauncher::new();
    let app = test::init_service(
        App::new()
            .app_data(app_state(&launcher, 1000))
            .configure(configure_api),
    )
    .await;

    let mut body = request_body(1);
    body["vendor"] = json!({ "city": "Jaipur" });
    let req = test::TestRequest::post()
        .uri("/api/vendor-procurement/pdf")
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_large_report_needs_confirmation() {
    let launcher = MockLauncher::new();
    let app = test::init_service(
        App::new()
            .app_data(app_state(&launcher, 2))
            .configure(configure_api),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/vendor-procurement/pdf")
        .set_json(request_body(3))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "LargeReportConfirmationRequired");

    let mut confirmed = request_body(3);
    confirmed["confirmLargeReport"] = json!(true);
    let req = test::TestRequest::post()
        .uri("/api/vendor-procurement/pdf")
        .set_json(confirmed)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_render_errors_map_to_status_codes() {
    let launcher = MockLauncher::new();
    launcher.state.fail_next_launches(2);
    launcher.state.script([Step::Fail("invalid page range")]);
    let app = test::init_service(
        App::new()
            .app_data(app_state(&launcher, 1000))
            .configure(configure_api),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/vendor-procurement/pdf")
        .set_json(request_body(1))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "ResourceUnavailable");

    let req = test::TestRequest::post()
        .uri("/api/vendor-procurement/pdf")
        .set_json(request_body(1))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "RenderFailure");
    assert_eq!(body["message"], "PDF generation failed. Please try again.");
}

#[actix_web::test]
async fn test_shutting_down_queue_returns_503() {
    let launcher = MockLauncher::new();
    let state = app_state(&launcher, 1000);
    state.pdf_queue.shutdown().await;
    let app = test::init_service(App::new().app_data(state).configure(configure_api)).await;

    let req = test::TestRequest::post()
        .uri("/api/vendor-procurement/pdf")
        .set_json(request_body(1))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "ShuttingDown");
}

#[actix_web::test]
async fn test_queue_status_endpoint() {
    let launcher = MockLauncher::new();
    let app = test::init_service(
        App::new()
            .app_data(app_state(&launcher, 1000))
            .configure(configure_api),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/vendor-procurement/pdf/queue-status")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["queueLength"], 0);
    assert_eq!(body["data"]["maxQueueSize"], 100);
    assert_eq!(body["data"]["hasEngine"], false);
    assert_eq!(body["data"]["processing"], false);
}

#[actix_web::test]
async fn test_metrics_endpoint_exposes_job_counts() {
    let launcher = MockLauncher::new();
    let app = test::init_service(
        App::new()
            .app_data(app_state(&launcher, 1000))
            .configure(configure_api),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/vendor-procurement/pdf")
        .set_json(request_body(1))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/vendor-procurement/pdf/metrics")
        .to_request();
    let body = test::call_and_read_body(&app, req).await;
    let text = String::from_utf8_lossy(&body);

    assert!(text.contains("pdf_render_jobs_total{outcome=\"success\"} 1"));
    assert!(text.contains("pdf_engine_launches_total 1"));
}

#[actix_web::test]
async fn test_health_endpoint() {
    let launcher = MockLauncher::new();
    let app = test::init_service(
        App::new()
            .app_data(app_state(&launcher, 1000))
            .configure(configure_api),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "OK");
}
