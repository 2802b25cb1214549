//! Periodic idle check that releases the engine when nothing needs it.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use super::service::Shared;

const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(10);

pub(crate) fn spawn_idle_reaper(shared: &Arc<Shared>) {
    let weak = Arc::downgrade(shared);
    let token = shared.shutdown.clone();
    let period = shared.config.idle_check_interval.max(MIN_CHECK_INTERVAL);

    shared.runtime.spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let Some(shared) = weak.upgrade() else {
                break;
            };
            reap_idle(&shared).await;
        }

        log::debug!("Idle engine reaper stopped");
    });
}

pub(crate) async fn reap_idle(shared: &Shared) -> bool {
    shared
        .resources
        .shutdown_if_idle(
            shared.queue.is_empty(),
            shared.processing.load(Ordering::SeqCst),
        )
        .await
}
