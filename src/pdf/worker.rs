//! Serialized worker loop.
//!
//! Exactly one loop drains the queue at a time, so the shared engine never
//! sees two concurrent renders. The loop is started on demand by
//! [`trigger`] and exits once the queue is empty.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;

use super::error::RenderError;
use super::queue::{QueuedRequest, RenderResult};
use super::service::Shared;
use crate::report::{render_report, ReportPayload};

const MAX_ATTEMPTS: u32 = 2;

/// Start the worker loop unless one is already running.
pub(crate) fn trigger(shared: &Arc<Shared>) {
    if shared
        .processing
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok()
    {
        shared.runtime.spawn(run_worker(shared.clone()));
    }
}

async fn run_worker(shared: Arc<Shared>) {
    log::debug!("PDF worker started");

    loop {
        drain_queue(&shared).await;

        shared.processing.store(false, Ordering::SeqCst);
        shared.idle.notify_waiters();

        // A submit that saw `processing == true` just before the store above
        // relies on this re-check to get its request serviced.
        if shared.queue.is_empty() || shared.shutdown.is_cancelled() {
            break;
        }
        if shared
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            break;
        }
    }

    log::debug!("PDF worker idle");
}

async fn drain_queue(shared: &Shared) {
    while let Some(request) = shared.queue.pop_front() {
        shared.metrics.set_queue_depth(shared.queue.len());
        process_request(shared, request).await;

        if !shared.queue.is_empty() && !shared.shutdown.is_cancelled() {
            tokio::time::sleep(shared.config.inter_job_delay).await;
        }
    }
}

async fn process_request(shared: &Shared, request: QueuedRequest) {
    if request.is_abandoned() {
        log::info!("Skipping PDF request {}: caller stopped waiting", request.id);
        shared.metrics.record_outcome("abandoned");
        return;
    }

    if shared.shutdown.is_cancelled() {
        shared.metrics.record_outcome(RenderError::ShuttingDown.kind());
        request.respond(Err(RenderError::ShuttingDown));
        return;
    }

    log::info!(
        "Processing PDF request {} ({} items, waited {:?})",
        request.id,
        request.payload.items.len(),
        request.waited()
    );

    let started = Instant::now();
    let result = tokio::select! {
        result = execute(shared, &request.payload) => result,
        _ = shutdown_grace_expired(shared) => {
            log::warn!(
                "PDF request {} still rendering after the shutdown grace period; abandoning it",
                request.id
            );
            Err(RenderError::ShuttingDown)
        }
    };
    let elapsed = started.elapsed();
    shared.metrics.observe_render(elapsed);

    match &result {
        Ok(pdf) => {
            log::info!(
                "PDF request {} completed in {:?} ({} bytes)",
                request.id,
                elapsed,
                pdf.len()
            );
            shared.metrics.record_outcome("success");
        }
        Err(e) => {
            log::error!("PDF request {} failed after {:?}: {}", request.id, elapsed, e);
            shared.metrics.record_outcome(e.kind());
        }
    }

    let id = request.id;
    if !request.respond(result) {
        log::warn!("PDF request {} finished but its caller is gone", id);
    }
}

/// Render one payload, retrying a transient failure once.
async fn execute(shared: &Shared, payload: &ReportPayload) -> RenderResult {
    let html = render_report(payload, Local::now().naive_local());

    let mut attempt = 1;
    loop {
        match render_once(shared, &html).await {
            Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                log::warn!(
                    "Render attempt {}/{} failed with a transient error, retrying in {:?}: {}",
                    attempt,
                    MAX_ATTEMPTS,
                    shared.config.retry_backoff,
                    e
                );
                tokio::time::sleep(shared.config.retry_backoff).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

async fn render_once(shared: &Shared, html: &str) -> RenderResult {
    let mut lease = shared.resources.ensure_ready().await?;
    lease.render(html).await
}

/// Resolves once shutdown has begun and the grace period has run out.
async fn shutdown_grace_expired(shared: &Shared) {
    shared.shutdown.cancelled().await;
    tokio::time::sleep(shared.config.shutdown_grace).await;
}
