//! Application state shared by the HTTP handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::pdf::{ChromiumLauncher, EngineLauncher, PdfQueue};

const CONNECTION_IDLE_MARGIN: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub pdf_queue: PdfQueue,
    pub config: AppConfig,
}

impl AppState {
    /// Production state: a PDF queue backed by the configured Chromium binary.
    pub fn new(config: AppConfig) -> Result<Self, prometheus::Error> {
        // The DevTools connection must outlive the idle reaper, which closes
        // the browser on its own schedule.
        let connection_idle =
            config.pdf.idle_timeout + config.pdf.idle_check_interval + CONNECTION_IDLE_MARGIN;
        let launcher = Arc::new(
            ChromiumLauncher::new(config.server.chromium_path.clone())
                .with_connection_idle(connection_idle),
        );
        Self::with_launcher(config, launcher)
    }

    pub fn with_launcher(
        config: AppConfig,
        launcher: Arc<dyn EngineLauncher>,
    ) -> Result<Self, prometheus::Error> {
        let pdf_queue = PdfQueue::start(config.pdf.clone(), launcher)?;
        Ok(Self { pdf_queue, config })
    }
}
