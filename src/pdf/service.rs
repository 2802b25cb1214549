//! PDF queue facade.
//!
//! [`PdfQueue`] is the cloneable handle the rest of the application holds.
//! It owns the shared state that the worker loop, the idle reaper and the
//! shutdown coordinator operate on.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Notify};
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;
use uuid::Uuid;

use super::engine::EngineLauncher;
use super::error::RenderError;
use super::janitor;
use super::metrics::RenderMetrics;
use super::queue::{RenderQueue, RenderResult};
use super::resource::{ResourceManager, ResourceSettings};
use super::worker;
use crate::config::PdfQueueConfig;
use crate::report::{ReportPayload, Validator};

/// State shared by the queue handle and its background tasks.
pub(crate) struct Shared {
    pub(crate) config: PdfQueueConfig,
    pub(crate) queue: RenderQueue,
    pub(crate) resources: ResourceManager,
    /// True while a worker loop is running. Only one may run at a time.
    pub(crate) processing: AtomicBool,
    /// Signalled whenever the worker loop goes idle.
    pub(crate) idle: Notify,
    pub(crate) shutdown: CancellationToken,
    pub(crate) metrics: Arc<RenderMetrics>,
    /// Runtime that started the queue. Background tasks are spawned here so
    /// they outlive whichever HTTP worker happened to submit the request.
    pub(crate) runtime: Handle,
}

/// Snapshot returned by the queue-status endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub queue_length: usize,
    pub max_queue_size: usize,
    pub processing: bool,
    pub has_engine: bool,
    pub engine_connected: bool,
    pub last_activity: DateTime<Utc>,
    pub pdf_count: u64,
    pub engine_generation: Option<u64>,
    pub shutting_down: bool,
}

/// Handle to the PDF render queue.
#[derive(Clone)]
pub struct PdfQueue {
    pub(crate) shared: Arc<Shared>,
}

impl PdfQueue {
    /// Build the queue and start its idle reaper. Must be called from within a
    /// tokio runtime. No engine is launched until the first job arrives.
    pub fn start(
        config: PdfQueueConfig,
        launcher: Arc<dyn EngineLauncher>,
    ) -> Result<Self, prometheus::Error> {
        let metrics = Arc::new(RenderMetrics::new()?);
        let settings = ResourceSettings {
            launch_timeout: config.launch_timeout,
            render_timeout: config.render_timeout,
            max_before_restart: config.max_before_restart.max(1),
            idle_timeout: config.idle_timeout,
            retry_backoff: config.retry_backoff,
        };

        let shared = Arc::new(Shared {
            queue: RenderQueue::new(config.max_queue_size, config.request_timeout),
            resources: ResourceManager::new(launcher, settings, metrics.clone()),
            processing: AtomicBool::new(false),
            idle: Notify::new(),
            shutdown: CancellationToken::new(),
            metrics,
            runtime: Handle::current(),
            config,
        });

        janitor::spawn_idle_reaper(&shared);

        log::info!(
            "PDF render queue started (capacity {}, request timeout {:?}, render timeout {:?}, restart after {} renders)",
            shared.config.max_queue_size,
            shared.config.request_timeout,
            shared.config.render_timeout,
            shared.config.max_before_restart
        );

        Ok(Self { shared })
    }

    /// Queue a render and return a ticket that resolves with the PDF bytes.
    ///
    /// Admission is decided synchronously: a full queue, a shutdown in
    /// progress or a payload without vendor identity is rejected right here
    /// and never enters the queue.
    pub fn submit(&self, payload: ReportPayload) -> Result<RenderTicket, RenderError> {
        let shared = &self.shared;

        if shared.shutdown.is_cancelled() {
            return Err(RenderError::ShuttingDown);
        }

        payload.validate().map_err(RenderError::InvalidPayload)?;

        if payload.items.len() > shared.config.large_report_threshold {
            log::warn!(
                "Large PDF report requested for '{}': {} items",
                payload.vendor.identity().unwrap_or_default(),
                payload.items.len()
            );
        }

        let admission = match shared.queue.push(payload) {
            Ok(admission) => admission,
            Err(e) => {
                log::warn!("PDF request rejected: {}", e);
                shared.metrics.record_outcome(e.kind());
                return Err(e);
            }
        };

        let timer = shared.runtime.spawn(expire_at_deadline(
            Arc::downgrade(shared),
            admission.id,
            admission.deadline,
        ));
        shared.queue.attach_timer(admission.id, timer.abort_handle());
        shared.metrics.set_queue_depth(shared.queue.len());

        log::info!(
            "PDF request {} queued (position {})",
            admission.id,
            admission.queue_length
        );

        worker::trigger(shared);

        Ok(RenderTicket {
            id: admission.id,
            receiver: admission.receiver,
        })
    }

    /// Submit and wait for the result.
    pub async fn enqueue(&self, payload: ReportPayload) -> RenderResult {
        self.submit(payload)?.await
    }

    pub fn status(&self) -> QueueStatus {
        let shared = &self.shared;
        let engine = shared.resources.status();
        QueueStatus {
            queue_length: shared.queue.len(),
            max_queue_size: shared.queue.capacity(),
            processing: shared.processing.load(Ordering::SeqCst),
            has_engine: engine.has_engine,
            engine_connected: engine.engine_connected,
            last_activity: engine.last_activity,
            pdf_count: engine.pdf_count,
            engine_generation: engine.engine_generation,
            shutting_down: shared.shutdown.is_cancelled(),
        }
    }

    pub fn config(&self) -> &PdfQueueConfig {
        &self.shared.config
    }

    pub fn metrics(&self) -> &RenderMetrics {
        &self.shared.metrics
    }

    pub fn metrics_text(&self) -> prometheus::Result<String> {
        self.shared.metrics.gather_text()
    }

    /// Run one idle check now instead of waiting for the reaper's next tick.
    pub async fn reap_idle_engine(&self) -> bool {
        janitor::reap_idle(&self.shared).await
    }

    pub fn resources(&self) -> &ResourceManager {
        &self.shared.resources
    }
}

/// Future side of an accepted render request.
///
/// Dropping the ticket abandons the request: if it is still queued when the
/// worker reaches it, it is skipped without rendering.
pub struct RenderTicket {
    id: Uuid,
    receiver: oneshot::Receiver<RenderResult>,
}

impl RenderTicket {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Future for RenderTicket {
    type Output = RenderResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|received| match received {
            Ok(result) => result,
            // responder dropped without an answer: the queue went away
            Err(_) => Err(RenderError::ShuttingDown),
        })
    }
}

async fn expire_at_deadline(shared: Weak<Shared>, id: Uuid, deadline: std::time::Instant) {
    tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;

    let Some(shared) = shared.upgrade() else {
        return;
    };
    let Some(request) = shared.queue.evict(id) else {
        return;
    };

    let waited = request.waited();
    log::warn!(
        "PDF request {} timed out after {:?} in the queue",
        request.id,
        waited
    );
    let error = RenderError::RequestTimeout { waited };
    shared.metrics.record_outcome(error.kind());
    shared.metrics.set_queue_depth(shared.queue.len());
    request.respond(Err(error));
}
