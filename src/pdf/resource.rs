//! Lifecycle of the single shared render engine.
//!
//! The engine sits in an async mutex slot. Whoever holds an [`EngineLease`]
//! has exclusive use of it; in practice that is only ever the worker loop.
//! Status reads never wait on the slot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use utoipa::ToSchema;

use super::engine::{EngineLauncher, RenderEngine};
use super::error::RenderError;
use super::metrics::RenderMetrics;

const LAUNCH_ATTEMPTS: u32 = 2;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Timing and recycling limits for the engine.
#[derive(Debug, Clone)]
pub struct ResourceSettings {
    pub launch_timeout: Duration,
    pub render_timeout: Duration,
    pub max_before_restart: u64,
    pub idle_timeout: Duration,
    pub retry_backoff: Duration,
}

struct EngineSlot {
    engine: Box<dyn RenderEngine>,
    generation: u64,
    /// Successful renders since this engine was launched.
    renders: u64,
}

struct Activity {
    has_engine: bool,
    connected: bool,
    generation: Option<u64>,
    pdf_count: u64,
    last_activity: Instant,
    last_activity_at: DateTime<Utc>,
}

impl Activity {
    fn touch(&mut self) {
        self.last_activity = Instant::now();
        self.last_activity_at = Utc::now();
    }
}

/// Read-only view of the engine for status reporting.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    pub has_engine: bool,
    pub engine_connected: bool,
    pub engine_generation: Option<u64>,
    pub pdf_count: u64,
    pub last_activity: DateTime<Utc>,
}

pub struct ResourceManager {
    launcher: Arc<dyn EngineLauncher>,
    settings: ResourceSettings,
    metrics: Arc<RenderMetrics>,
    slot: AsyncMutex<Option<EngineSlot>>,
    activity: Mutex<Activity>,
    generations: AtomicU64,
}

impl ResourceManager {
    pub fn new(
        launcher: Arc<dyn EngineLauncher>,
        settings: ResourceSettings,
        metrics: Arc<RenderMetrics>,
    ) -> Self {
        Self {
            launcher,
            settings,
            metrics,
            slot: AsyncMutex::new(None),
            activity: Mutex::new(Activity {
                has_engine: false,
                connected: false,
                generation: None,
                pdf_count: 0,
                last_activity: Instant::now(),
                last_activity_at: Utc::now(),
            }),
            generations: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &ResourceSettings {
        &self.settings
    }

    /// Take exclusive use of a healthy engine, launching one if needed.
    ///
    /// A missing or disconnected engine is replaced. Launching is bounded by
    /// the launch timeout and retried once before giving up with
    /// [`RenderError::ResourceUnavailable`].
    pub async fn ensure_ready(&self) -> Result<EngineLease<'_>, RenderError> {
        let mut slot = self.slot.lock().await;

        let healthy = slot
            .as_ref()
            .map(|current| current.engine.is_connected())
            .unwrap_or(false);

        if !healthy {
            if let Some(stale) = slot.take() {
                log::warn!(
                    "Render engine #{} is disconnected; replacing it",
                    stale.generation
                );
                self.discard(stale, "disconnected").await;
            }

            let engine = self.launch_with_retry().await?;
            let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
            log::info!("Render engine #{} launched", generation);

            *slot = Some(EngineSlot {
                engine,
                generation,
                renders: 0,
            });

            let mut activity = self.activity.lock();
            activity.has_engine = true;
            activity.connected = true;
            activity.generation = Some(generation);
            activity.pdf_count = 0;
            activity.touch();
        }

        Ok(EngineLease {
            manager: self,
            slot,
        })
    }

    async fn launch_with_retry(&self) -> Result<Box<dyn RenderEngine>, RenderError> {
        let mut last_error = String::new();

        for attempt in 1..=LAUNCH_ATTEMPTS {
            match tokio::time::timeout(self.settings.launch_timeout, self.launcher.launch()).await
            {
                Ok(Ok(engine)) => {
                    self.metrics.engine_launched();
                    return Ok(engine);
                }
                Ok(Err(e)) => last_error = e.message,
                Err(_) => {
                    last_error = format!(
                        "engine launch exceeded {:?}",
                        self.settings.launch_timeout
                    )
                }
            }

            log::error!(
                "Render engine launch attempt {}/{} failed: {}",
                attempt,
                LAUNCH_ATTEMPTS,
                last_error
            );
            if attempt < LAUNCH_ATTEMPTS {
                tokio::time::sleep(self.settings.retry_backoff).await;
            }
        }

        Err(RenderError::ResourceUnavailable(last_error))
    }

    /// Close the current engine even if healthy; the next lease launches a
    /// fresh one.
    pub async fn recycle(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(current) = slot.take() {
            log::info!("Recycling render engine #{}", current.generation);
            self.discard(current, "recycle").await;
        }
    }

    /// Close the engine when nothing needs it and it has sat unused for longer
    /// than the idle timeout. Returns whether an engine was closed.
    pub async fn shutdown_if_idle(&self, queue_empty: bool, processing: bool) -> bool {
        if !queue_empty || processing {
            return false;
        }

        // Held by the worker means busy, not idle.
        let Ok(mut slot) = self.slot.try_lock() else {
            return false;
        };
        if slot.is_none() {
            return false;
        }

        let idle_for = self.activity.lock().last_activity.elapsed();
        if idle_for <= self.settings.idle_timeout {
            return false;
        }

        if let Some(current) = slot.take() {
            log::info!(
                "Closing render engine #{} after {:?} idle",
                current.generation,
                idle_for
            );
            self.discard(current, "idle").await;
        }
        true
    }

    /// Release the engine unconditionally. Safe to call repeatedly.
    pub async fn close(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(current) = slot.take() {
            log::info!("Closing render engine #{}", current.generation);
            self.discard(current, "shutdown").await;
        }
    }

    pub fn status(&self) -> ResourceStatus {
        // Ask the engine directly when the worker isn't using it.
        let live_connected = self.slot.try_lock().ok().map(|slot| {
            slot.as_ref()
                .map(|current| current.engine.is_connected())
                .unwrap_or(false)
        });

        let activity = self.activity.lock();
        ResourceStatus {
            has_engine: activity.has_engine,
            engine_connected: live_connected.unwrap_or(activity.connected),
            engine_generation: activity.generation,
            pdf_count: activity.pdf_count,
            last_activity: activity.last_activity_at,
        }
    }

    async fn discard(&self, current: EngineSlot, reason: &str) {
        {
            let mut activity = self.activity.lock();
            activity.has_engine = false;
            activity.connected = false;
            activity.generation = None;
            activity.pdf_count = 0;
        }
        self.metrics.engine_discarded(reason);
        best_effort_close(current.engine, reason).await;
    }
}

/// Close an engine, logging and swallowing any failure.
///
/// Used on every release path: by the time an engine is closed the jobs that
/// used it are already settled, so a failed close cannot affect a result.
pub async fn best_effort_close(engine: Box<dyn RenderEngine>, reason: &str) {
    match tokio::time::timeout(CLOSE_TIMEOUT, engine.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::warn!("Ignoring error while closing render engine ({}): {}", reason, e),
        Err(_) => log::warn!(
            "Render engine close ({}) did not finish within {:?}; abandoning it",
            reason,
            CLOSE_TIMEOUT
        ),
    }
}

/// Exclusive use of the shared engine for the duration of one render.
pub struct EngineLease<'a> {
    manager: &'a ResourceManager,
    slot: MutexGuard<'a, Option<EngineSlot>>,
}

impl EngineLease<'_> {
    pub fn generation(&self) -> Option<u64> {
        self.slot.as_ref().map(|current| current.generation)
    }

    pub fn is_connected(&self) -> bool {
        self.slot
            .as_ref()
            .map(|current| current.engine.is_connected())
            .unwrap_or(false)
    }

    /// Print `html` on the leased engine, racing the render timeout.
    ///
    /// A hang or a disconnect poisons the engine so the next lease launches a
    /// new one. Hitting the recycle threshold closes the engine after the
    /// result is in hand.
    pub async fn render(&mut self, html: &str) -> Result<Vec<u8>, RenderError> {
        let manager = self.manager;
        let budget = manager.settings.render_timeout;

        let (outcome, connected, generation) = {
            let Some(current) = self.slot.as_ref() else {
                return Err(RenderError::ResourceUnavailable(
                    "render engine was released".to_string(),
                ));
            };
            let outcome = tokio::time::timeout(budget, current.engine.print_pdf(html)).await;
            (outcome, current.engine.is_connected(), current.generation)
        };

        match outcome {
            Err(_) => {
                log::error!(
                    "Render on engine #{} exceeded {:?}; discarding the engine",
                    generation,
                    budget
                );
                self.poison("hang").await;
                Err(RenderError::RenderTimeout { budget })
            }
            Ok(Err(e)) => {
                log::error!("Render on engine #{} failed: {}", generation, e);
                if !connected {
                    self.poison("disconnected").await;
                }
                Err(RenderError::from_engine(&e))
            }
            Ok(Ok(pdf)) => {
                let renders = match self.slot.as_mut() {
                    Some(current) => {
                        current.renders += 1;
                        current.renders
                    }
                    None => 0,
                };
                {
                    let mut activity = manager.activity.lock();
                    activity.pdf_count = renders;
                    activity.touch();
                }

                if renders >= manager.settings.max_before_restart {
                    log::info!(
                        "Render engine #{} reached {} renders; recycling",
                        generation,
                        renders
                    );
                    self.release("recycle").await;
                }
                Ok(pdf)
            }
        }
    }

    async fn poison(&mut self, reason: &str) {
        self.release(reason).await;
    }

    async fn release(&mut self, reason: &str) {
        if let Some(current) = self.slot.take() {
            self.manager.discard(current, reason).await;
        }
    }
}
