//! Headless Chromium print engine.
//!
//! One browser process is started per engine and kept alive across renders.
//! Every print opens its own tab, loads the report from a temporary file and
//! closes the tab again. Closing the engine drops the browser, which kills the
//! process.
//!
//! `headless_chrome` is a blocking client, so every call into it runs on the
//! blocking pool.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use parking_lot::Mutex;
use tempfile::tempdir;

use super::engine::{EngineError, EngineErrorKind, EngineLauncher, RenderEngine};

const INPUT_FILENAME: &str = "report.html";

/// Default for how long the browser connection may sit without traffic.
const DEFAULT_CONNECTION_IDLE: Duration = Duration::from_secs(60 * 60);

const BROWSER_ARGS: &[&str] = &[
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-extensions",
    "--disable-background-timer-throttling",
    "--disable-renderer-backgrounding",
    "--disable-backgrounding-occluded-windows",
];

/// Error text that means the browser itself is gone, not just this page.
const CONNECTION_LOST_MARKERS: &[&str] = &[
    "connection is closed",
    "Target closed",
    "browser has disconnected",
    "Browser process exited",
];

// A4 with 20mm top/bottom and 15mm side margins, in inches.
const A4_WIDTH_IN: f64 = 8.27;
const A4_HEIGHT_IN: f64 = 11.69;
const MARGIN_VERTICAL_IN: f64 = 0.79;
const MARGIN_HORIZONTAL_IN: f64 = 0.59;

/// Launches [`ChromiumEngine`]s from a browser binary.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    binary: PathBuf,
    connection_idle: Duration,
}

impl ChromiumLauncher {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            connection_idle: DEFAULT_CONNECTION_IDLE,
        }
    }

    /// How long the DevTools connection may stay silent before the client
    /// gives up on it. Must outlast the queue's own idle shutdown.
    pub fn with_connection_idle(mut self, connection_idle: Duration) -> Self {
        self.connection_idle = connection_idle;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Start a browser and return the concrete engine.
    pub async fn start(&self) -> Result<ChromiumEngine, EngineError> {
        let options = self.launch_options()?;
        let binary = self.binary.clone();

        // If the launch timeout fires first, the browser is dropped (and
        // killed) once this task finishes.
        let (browser, version) = tokio::task::spawn_blocking(move || {
            let browser = Browser::new(options).map_err(|e| {
                EngineError::launch(format!("failed to start {}: {}", binary.display(), e))
            })?;
            let version = browser
                .get_version()
                .map_err(|e| EngineError::launch(format!("browser did not answer: {}", e)))?
                .product;
            Ok::<_, EngineError>((browser, version))
        })
        .await
        .map_err(|e| EngineError::launch(format!("browser launch task failed: {}", e)))??;

        log::info!(
            "Chromium engine ready: {} (pid {:?})",
            version,
            browser.get_process_id()
        );

        Ok(ChromiumEngine {
            browser: Mutex::new(Some(Arc::new(browser))),
            version,
            connected: AtomicBool::new(true),
        })
    }

    fn launch_options(&self) -> Result<LaunchOptions<'static>, EngineError> {
        LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .path(Some(self.binary.clone()))
            .idle_browser_timeout(self.connection_idle)
            .args(BROWSER_ARGS.iter().map(OsStr::new).collect())
            .build()
            .map_err(|e| EngineError::launch(format!("invalid browser launch options: {}", e)))
    }
}

#[async_trait]
impl EngineLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn RenderEngine>, EngineError> {
        Ok(Box::new(self.start().await?))
    }
}

/// Print engine backed by one long-lived headless Chromium process.
pub struct ChromiumEngine {
    browser: Mutex<Option<Arc<Browser>>>,
    version: String,
    connected: AtomicBool,
}

impl ChromiumEngine {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn process_id(&self) -> Option<u32> {
        self.browser
            .lock()
            .as_ref()
            .and_then(|browser| browser.get_process_id())
    }

    fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl RenderEngine for ChromiumEngine {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.browser.lock().is_some()
    }

    async fn print_pdf(&self, html: &str) -> Result<Vec<u8>, EngineError> {
        let browser = match self.browser.lock().clone() {
            Some(browser) if self.connected.load(Ordering::SeqCst) => browser,
            _ => {
                return Err(EngineError::disconnected(
                    "Target page, context or browser has been closed",
                ))
            }
        };

        // Dropped with the future, so an abandoned render leaves no files.
        let work_dir = tempdir()
            .map_err(|e| EngineError::render(format!("failed to create temp dir: {}", e)))?;
        let input_path = work_dir.path().join(INPUT_FILENAME);
        tokio::fs::write(&input_path, html)
            .await
            .map_err(|e| EngineError::render(format!("failed to write report HTML: {}", e)))?;
        let url = format!("file://{}", input_path.display());

        let printed = tokio::task::spawn_blocking(move || print_in_new_tab(browser, &url))
            .await
            .map_err(|e| EngineError::render(format!("print task failed: {}", e)))?;

        match printed {
            Ok(pdf) if pdf.is_empty() => Err(EngineError::render("renderer produced an empty PDF")),
            Ok(pdf) => Ok(pdf),
            Err(err) => {
                if err.kind == EngineErrorKind::Disconnected {
                    self.mark_disconnected();
                }
                Err(err)
            }
        }
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.mark_disconnected();
        let browser = self.browser.lock().take();
        if let Some(browser) = browser {
            let pid = browser.get_process_id();
            // Dropping the last handle kills and reaps the process.
            tokio::task::spawn_blocking(move || drop(browser))
                .await
                .map_err(|e| EngineError::close(format!("failed to stop browser: {}", e)))?;
            log::debug!("Chromium engine closed (pid {:?})", pid);
        }
        Ok(())
    }
}

/// Open a tab, print the page at `url` and close the tab again.
///
/// The browser handle is released as soon as the tab exists so that closing
/// the engine is never held up by a render stuck inside the tab.
fn print_in_new_tab(browser: Arc<Browser>, url: &str) -> Result<Vec<u8>, EngineError> {
    let tab = browser
        .new_tab()
        .map_err(|e| classify(format!("failed to open tab: {}", e)))?;
    drop(browser);

    let printed = tab
        .navigate_to(url)
        .and_then(|tab| tab.wait_until_navigated())
        .and_then(|tab| tab.print_to_pdf(Some(print_options())));

    if let Err(e) = tab.close(false) {
        log::debug!("Failed to close render tab: {}", e);
    }

    printed.map_err(|e| classify(e.to_string()))
}

fn classify(message: String) -> EngineError {
    if is_connection_lost(&message) {
        EngineError::disconnected(message)
    } else {
        EngineError::render(message)
    }
}

fn is_connection_lost(message: &str) -> bool {
    CONNECTION_LOST_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

fn print_options() -> PrintToPdfOptions {
    PrintToPdfOptions {
        print_background: Some(true),
        paper_width: Some(A4_WIDTH_IN),
        paper_height: Some(A4_HEIGHT_IN),
        margin_top: Some(MARGIN_VERTICAL_IN),
        margin_bottom: Some(MARGIN_VERTICAL_IN),
        margin_left: Some(MARGIN_HORIZONTAL_IN),
        margin_right: Some(MARGIN_HORIZONTAL_IN),
        display_header_footer: Some(false),
        ..Default::default()
    }
}
