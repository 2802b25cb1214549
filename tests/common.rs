//! Shared helpers for the PDF queue integration tests.
//!
//! `MockLauncher` hands out `MockEngine`s that follow a script of steps and
//! record everything the queue asks of them.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use procurement_report_server::config::PdfQueueConfig;
use procurement_report_server::pdf::{EngineError, EngineLauncher, RenderEngine};
use procurement_report_server::report::{ProcurementItem, ReportPayload, VendorInfo};

/// What the next `print_pdf` call does.
#[derive(Debug, Clone)]
pub enum Step {
    /// Return a PDF right away.
    Ok,
    /// Return a PDF after the given delay.
    Delay(Duration),
    /// Never return.
    Hang,
    /// Fail with a render error, engine stays connected.
    Fail(&'static str),
    /// Fail and report the engine as disconnected.
    Disconnect(&'static str),
}

/// Counters and script shared by the launcher and every engine it created.
#[derive(Default)]
pub struct MockState {
    steps: Mutex<VecDeque<Step>>,
    launch_failures: AtomicUsize,
    launch_delay: Mutex<Option<Duration>>,
    pub launch_attempts: AtomicUsize,
    pub launches: AtomicUsize,
    pub closes: AtomicUsize,
    pub prints: AtomicUsize,
    active: AtomicUsize,
    pub max_concurrent: AtomicUsize,
    rendered: Mutex<Vec<String>>,
}

impl MockState {
    pub fn script(&self, steps: impl IntoIterator<Item = Step>) {
        self.steps.lock().extend(steps);
    }

    pub fn fail_next_launches(&self, count: usize) {
        self.launch_failures.store(count, Ordering::SeqCst);
    }

    pub fn delay_launches(&self, delay: Duration) {
        *self.launch_delay.lock() = Some(delay);
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn launch_attempts(&self) -> usize {
        self.launch_attempts.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn prints(&self) -> usize {
        self.prints.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }

    /// HTML documents handed to the engine, in order.
    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().clone()
    }

    /// For each rendered document, the first of `names` it contains.
    pub fn rendered_order(&self, names: &[&'static str]) -> Vec<&'static str> {
        self.rendered()
            .iter()
            .filter_map(|html| names.iter().copied().find(|name| html.contains(name)))
            .collect()
    }

    fn next_step(&self) -> Step {
        self.steps.lock().pop_front().unwrap_or(Step::Ok)
    }
}

#[derive(Clone, Default)]
pub struct MockLauncher {
    pub state: Arc<MockState>,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl EngineLauncher for MockLauncher {
    async fn launch(&self) -> Result<Box<dyn RenderEngine>, EngineError> {
        self.state.launch_attempts.fetch_add(1, Ordering::SeqCst);

        let delay = *self.state.launch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let should_fail = self
            .state
            .launch_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(EngineError::launch("mock browser failed to start"));
        }

        let generation = self.state.launches.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(MockEngine {
            generation,
            connected: AtomicBool::new(true),
            state: self.state.clone(),
        }))
    }
}

pub struct MockEngine {
    generation: usize,
    connected: AtomicBool,
    state: Arc<MockState>,
}

/// Tracks concurrent prints; decrements even when the print future is dropped.
struct ActivePrint<'a>(&'a MockState);

impl<'a> ActivePrint<'a> {
    fn enter(state: &'a MockState) -> Self {
        let now = state.active.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_concurrent.fetch_max(now, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for ActivePrint<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl RenderEngine for MockEngine {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn print_pdf(&self, html: &str) -> Result<Vec<u8>, EngineError> {
        let _active = ActivePrint::enter(&self.state);
        self.state.prints.fetch_add(1, Ordering::SeqCst);
        self.state.rendered.lock().push(html.to_string());

        match self.state.next_step() {
            Step::Ok => {}
            Step::Delay(delay) => tokio::time::sleep(delay).await,
            Step::Hang => std::future::pending::<()>().await,
            Step::Fail(message) => return Err(EngineError::render(message)),
            Step::Disconnect(message) => {
                self.connected.store(false, Ordering::SeqCst);
                return Err(EngineError::disconnected(message));
            }
        }

        Ok(format!("%PDF-mock generation={}", self.generation).into_bytes())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.connected.store(false, Ordering::SeqCst);
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Generation of the engine that produced a mock PDF.
pub fn generation_of(pdf: &[u8]) -> usize {
    let text = String::from_utf8_lossy(pdf);
    text.rsplit('=')
        .next()
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

/// Queue settings scaled down for tests.
pub fn test_config() -> PdfQueueConfig {
    PdfQueueConfig {
        max_queue_size: 100,
        request_timeout: Duration::from_secs(5),
        render_timeout: Duration::from_secs(2),
        launch_timeout: Duration::from_secs(1),
        max_before_restart: 50,
        idle_timeout: Duration::from_secs(60),
        idle_check_interval: Duration::from_secs(60),
        inter_job_delay: Duration::from_millis(1),
        retry_backoff: Duration::from_millis(10),
        shutdown_grace: Duration::from_secs(1),
        large_report_threshold: 1000,
    }
}

pub fn item(name: &str, amount: f64, tax: f64) -> ProcurementItem {
    ProcurementItem {
        stone_name: Some(name.to_string()),
        stone_type: Some("Granite".to_string()),
        length_mm: Some(1200.0),
        width_mm: Some(600.0),
        thickness_mm: Some(20.0),
        quantity: Some(4.0),
        units: Some("slabs".to_string()),
        item_amount: Some(amount),
        tax_percentage: Some(tax),
        created_at: Some("2025-03-05".to_string()),
    }
}

pub fn payload(company: &str) -> ReportPayload {
    ReportPayload {
        vendor: VendorInfo {
            company_name: Some(company.to_string()),
            city: Some("Jaipur".to_string()),
            ..Default::default()
        },
        items: vec![item("Black Galaxy", 100.0, 18.0)],
        ..Default::default()
    }
}
