//! Shutdown coordinator.
//!
//! Order matters: stop admission, reject everything still queued, give the
//! in-flight job its grace period, then release the engine.

use std::sync::atomic::Ordering;
use std::time::Duration;

use super::error::RenderError;
use super::service::{PdfQueue, Shared};

impl PdfQueue {
    /// Stop the queue. Safe to call more than once and from several tasks.
    pub async fn shutdown(&self) {
        let shared = &self.shared;
        let first_call = !shared.shutdown.is_cancelled();
        shared.shutdown.cancel();

        if first_call {
            log::info!("Shutting down PDF render queue");
        }

        let rejected = shared.queue.close_and_drain();
        if !rejected.is_empty() {
            log::info!("Rejecting {} queued PDF requests", rejected.len());
        }
        for request in rejected {
            shared.metrics.record_outcome(RenderError::ShuttingDown.kind());
            request.respond(Err(RenderError::ShuttingDown));
        }
        shared.metrics.set_queue_depth(0);

        wait_until_idle(shared).await;
        shared.resources.close().await;

        if first_call {
            log::info!("PDF render queue stopped");
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }
}

/// Run [`PdfQueue::shutdown`] but give up waiting after `limit`.
///
/// Returns false if the limit was hit. Used on process exit, where a stuck
/// engine must not keep the process alive.
pub async fn shutdown_with_grace(queue: &PdfQueue, limit: Duration) -> bool {
    match tokio::time::timeout(limit, queue.shutdown()).await {
        Ok(()) => true,
        Err(_) => {
            log::warn!("PDF queue shutdown did not complete within {:?}", limit);
            false
        }
    }
}

async fn wait_until_idle(shared: &Shared) {
    loop {
        let notified = shared.idle.notified();
        tokio::pin!(notified);
        // register before checking so a notify between check and await is not lost
        notified.as_mut().enable();

        if !shared.processing.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }
}
