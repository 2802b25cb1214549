//! Environment-driven configuration.
//!
//! Values come from the process environment after loading `.env` through
//! dotenvy. Unset variables fall back to defaults; set-but-unparsable ones are
//! an error so a typo never silently turns into a default.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Upper bound for every configured duration (30 days).
pub const MAX_DURATION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

/// Tuning knobs for the PDF render queue.
#[derive(Debug, Clone)]
pub struct PdfQueueConfig {
    pub max_queue_size: usize,
    /// How long a request may wait in the queue before it is evicted.
    pub request_timeout: Duration,
    /// Budget for a single render attempt against the engine.
    pub render_timeout: Duration,
    pub launch_timeout: Duration,
    /// Successful renders before the engine is proactively replaced.
    pub max_before_restart: u64,
    pub idle_timeout: Duration,
    pub idle_check_interval: Duration,
    pub inter_job_delay: Duration,
    pub retry_backoff: Duration,
    pub shutdown_grace: Duration,
    /// Item count above which the HTTP layer asks for explicit confirmation.
    pub large_report_threshold: usize,
}

impl Default for PdfQueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
            request_timeout: Duration::from_secs(60),
            render_timeout: Duration::from_secs(30),
            launch_timeout: Duration::from_secs(30),
            max_before_restart: 50,
            idle_timeout: Duration::from_secs(5 * 60),
            idle_check_interval: Duration::from_secs(60),
            inter_job_delay: Duration::from_millis(100),
            retry_backoff: Duration::from_millis(1000),
            shutdown_grace: Duration::from_secs(10),
            large_report_threshold: 1000,
        }
    }
}

impl PdfQueueConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            max_queue_size: env_or("PDF_MAX_QUEUE_SIZE", defaults.max_queue_size)?,
            request_timeout: env_secs("PDF_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            render_timeout: env_secs("PDF_RENDER_TIMEOUT_SECS", defaults.render_timeout)?,
            launch_timeout: env_secs("PDF_LAUNCH_TIMEOUT_SECS", defaults.launch_timeout)?,
            max_before_restart: env_or("PDF_MAX_BEFORE_RESTART", defaults.max_before_restart)?,
            idle_timeout: env_secs("PDF_IDLE_TIMEOUT_SECS", defaults.idle_timeout)?,
            idle_check_interval: env_secs(
                "PDF_IDLE_CHECK_INTERVAL_SECS",
                defaults.idle_check_interval,
            )?,
            inter_job_delay: env_millis("PDF_INTER_JOB_DELAY_MS", defaults.inter_job_delay)?,
            retry_backoff: env_millis("PDF_RETRY_BACKOFF_MS", defaults.retry_backoff)?,
            shutdown_grace: env_secs("PDF_SHUTDOWN_GRACE_SECS", defaults.shutdown_grace)?,
            large_report_threshold: env_or(
                "PDF_LARGE_REPORT_THRESHOLD",
                defaults.large_report_threshold,
            )?,
        })
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub chromium_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            allowed_origins: vec!["http://localhost:5174".to_string()],
            chromium_path: "chromium".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let allowed_origins = match env::var("CORS_ALLOWED_ORIGINS") {
            Ok(raw) => parse_origins(&raw),
            Err(_) => defaults.allowed_origins,
        };

        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or(defaults.host),
            port: env_or("SERVER_PORT", defaults.port)?,
            allowed_origins,
            chromium_path: env::var("CHROMIUM_PATH").unwrap_or(defaults.chromium_path),
        })
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub pdf: PdfQueueConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Ok(Self {
            server: ServerConfig::from_env()?,
            pdf: PdfQueueConfig::from_env()?,
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        name: name.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn env_or<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn env_secs(name: &str, default: Duration) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Ok(raw) => parse_duration(name, &raw, Duration::from_secs),
        Err(_) => Ok(default),
    }
}

fn env_millis(name: &str, default: Duration) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Ok(raw) => parse_duration(name, &raw, Duration::from_millis),
        Err(_) => Ok(default),
    }
}

/// Durations are added to `Instant`s at runtime, so anything past
/// [`MAX_DURATION`] is refused here instead of overflowing there.
fn parse_duration(
    name: &str,
    raw: &str,
    unit: fn(u64) -> Duration,
) -> Result<Duration, ConfigError> {
    let duration = unit(parse_value::<u64>(name, raw)?);
    if duration > MAX_DURATION {
        return Err(ConfigError::Invalid {
            name: name.to_string(),
            value: raw.to_string(),
            reason: format!("must not exceed {} seconds", MAX_DURATION.as_secs()),
        });
    }
    Ok(duration)
}
