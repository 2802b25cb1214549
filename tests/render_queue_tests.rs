//! Tests for the render queue: admission control, FIFO service, deadline
//! eviction and single-flight rendering.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{payload, test_config, MockLauncher, Step};
use procurement_report_server::pdf::{PdfQueue, RenderError};
use procurement_report_server::report::NO_DATA_MESSAGE;

fn start(config: procurement_report_server::config::PdfQueueConfig) -> (PdfQueue, MockLauncher) {
    let launcher = MockLauncher::new();
    let queue = PdfQueue::start(config, Arc::new(launcher.clone())).unwrap();
    (queue, launcher)
}

#[tokio::test]
async fn test_concurrent_submissions_render_one_at_a_time() {
    let (queue, launcher) = start(test_config());
    launcher.state.script((0..10).map(|_| Step::Delay(Duration::from_millis(5))));

    let jobs = (0..10).map(|i| {
        let queue = queue.clone();
        tokio::spawn(async move { queue.enqueue(payload(&format!("Vendor {}", i))).await })
    });
    let results = futures::future::join_all(jobs).await;

    for result in results {
        let pdf = result.unwrap().unwrap();
        assert!(pdf.starts_with(b"%PDF-mock"));
    }
    assert_eq!(launcher.state.prints(), 10);
    assert_eq!(launcher.state.max_concurrent(), 1);
    assert_eq!(launcher.state.launches(), 1);
}

#[tokio::test]
async fn test_requests_are_served_in_submission_order() {
    let (queue, launcher) = start(test_config());
    let names = ["Vendor Alpha", "Vendor Bravo", "Vendor Charlie", "Vendor Delta"];

    let tickets: Vec<_> = names
        .iter()
        .map(|name| queue.submit(payload(name)).unwrap())
        .collect();
    for ticket in tickets {
        ticket.await.unwrap();
    }

    assert_eq!(launcher.state.rendered_order(&names), names.to_vec());
}

#[tokio::test]
async fn test_submission_beyond_capacity_fails_immediately() {
    let (queue, _launcher) = start(test_config());

    // Nothing yields between submissions, so the worker has not dequeued yet.
    let tickets: Vec<_> = (0..100)
        .map(|i| queue.submit(payload(&format!("Vendor {}", i))).unwrap())
        .collect();

    match queue.submit(payload("Vendor 101")) {
        Err(RenderError::QueueFull { capacity }) => assert_eq!(capacity, 100),
        Err(other) => panic!("expected QueueFull, got {}", other),
        Ok(_) => panic!("101st submission should be rejected"),
    }
    assert_eq!(queue.status().queue_length, 100);
    assert_eq!(queue.metrics().outcome_count("QueueFull"), 1);

    drop(tickets);
    queue.shutdown().await;
}

#[tokio::test]
async fn test_expired_request_is_evicted_without_disturbing_order() {
    let mut config = test_config();
    config.request_timeout = Duration::from_millis(400);
    let (queue, launcher) = start(config);
    launcher
        .state
        .script([Step::Delay(Duration::from_millis(600))]);

    let first = queue.submit(payload("Vendor Alpha")).unwrap();
    let expiring = queue.submit(payload("Vendor Bravo")).unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    let third = queue.submit(payload("Vendor Charlie")).unwrap();
    let fourth = queue.submit(payload("Vendor Delta")).unwrap();

    match expiring.await {
        Err(RenderError::RequestTimeout { waited }) => {
            assert!(waited >= Duration::from_millis(400))
        }
        Err(other) => panic!("expected RequestTimeout, got {}", other),
        Ok(_) => panic!("expired request should not be rendered"),
    }
    assert_eq!(queue.status().queue_length, 2);

    first.await.unwrap();
    third.await.unwrap();
    fourth.await.unwrap();

    let names = ["Vendor Alpha", "Vendor Bravo", "Vendor Charlie", "Vendor Delta"];
    assert_eq!(
        launcher.state.rendered_order(&names),
        vec!["Vendor Alpha", "Vendor Charlie", "Vendor Delta"]
    );
    assert_eq!(queue.metrics().outcome_count("RequestTimeout"), 1);
}

#[tokio::test]
async fn test_abandoned_request_is_skipped() {
    let (queue, launcher) = start(test_config());
    launcher
        .state
        .script([Step::Delay(Duration::from_millis(100))]);

    let first = queue.submit(payload("Vendor Alpha")).unwrap();
    let abandoned = queue.submit(payload("Vendor Bravo")).unwrap();
    let last = queue.submit(payload("Vendor Charlie")).unwrap();
    drop(abandoned);

    first.await.unwrap();
    last.await.unwrap();

    let names = ["Vendor Alpha", "Vendor Bravo", "Vendor Charlie"];
    assert_eq!(
        launcher.state.rendered_order(&names),
        vec!["Vendor Alpha", "Vendor Charlie"]
    );
    assert_eq!(queue.metrics().outcome_count("abandoned"), 1);
}

#[tokio::test]
async fn test_payload_without_vendor_identity_is_rejected() {
    let (queue, launcher) = start(test_config());
    let mut missing_vendor = payload("placeholder");
    missing_vendor.vendor.company_name = Some("   ".to_string());

    match queue.submit(missing_vendor) {
        Err(RenderError::InvalidPayload(message)) => {
            assert!(message.contains("Company name"))
        }
        Err(other) => panic!("expected InvalidPayload, got {}", other),
        Ok(_) => panic!("payload without a company name should be rejected"),
    }
    assert_eq!(queue.status().queue_length, 0);
    assert_eq!(launcher.state.launch_attempts(), 0);
}

#[tokio::test]
async fn test_empty_item_list_renders_no_data_block() {
    let (queue, launcher) = start(test_config());
    let mut empty = payload("Vendor Empty");
    empty.items.clear();

    queue.enqueue(empty).await.unwrap();

    let rendered = launcher.state.rendered();
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].contains(NO_DATA_MESSAGE));
    assert!(!rendered[0].contains("GRAND TOTAL"));
}

#[tokio::test]
async fn test_status_reflects_engine_after_render() {
    let (queue, _launcher) = start(test_config());

    let initial = queue.status();
    assert!(!initial.has_engine);
    assert_eq!(initial.engine_generation, None);
    assert_eq!(initial.max_queue_size, 100);

    queue.enqueue(payload("Vendor Alpha")).await.unwrap();
    queue.enqueue(payload("Vendor Bravo")).await.unwrap();

    let status = queue.status();
    assert!(status.has_engine);
    assert!(status.engine_connected);
    assert_eq!(status.engine_generation, Some(1));
    assert_eq!(status.pdf_count, 2);
    assert_eq!(status.queue_length, 0);
    assert!(!status.shutting_down);
    assert_eq!(queue.metrics().outcome_count("success"), 2);
}

#[tokio::test]
async fn test_queue_status_serializes_in_camel_case() {
    let (queue, _launcher) = start(test_config());
    let json = serde_json::to_value(queue.status()).unwrap();

    for key in [
        "queueLength",
        "maxQueueSize",
        "processing",
        "hasEngine",
        "engineConnected",
        "lastActivity",
        "pdfCount",
        "engineGeneration",
    ] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
}

#[tokio::test]
async fn test_out_of_range_request_timeout_rejects_without_panicking() {
    let mut config = test_config();
    config.request_timeout = Duration::from_secs(u64::MAX);
    let (queue, launcher) = start(config);

    match queue.submit(payload("Overflow Stones")) {
        Err(RenderError::ResourceUnavailable(_)) => {}
        Err(other) => panic!("expected ResourceUnavailable, got {}", other.kind()),
        Ok(_) => panic!("submit should be rejected"),
    }
    assert_eq!(queue.status().queue_length, 0);
    assert_eq!(launcher.state.prints(), 0);
}
