use std::time::Duration;

use actix_web::http::StatusCode;
use thiserror::Error;

use super::engine::{EngineError, EngineErrorKind};

/// Message fragments that mark an engine failure as transient.
const RETRYABLE_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "connection",
    "network",
    "econnreset",
    "enotfound",
    "target page, context or browser has been closed",
    "browser has disconnected",
];

/// Errors surfaced to callers of the PDF queue.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("render queue is full ({capacity} pending)")]
    QueueFull { capacity: usize },
    #[error("render request waited {waited:?} in the queue without being serviced")]
    RequestTimeout { waited: Duration },
    #[error("render engine unavailable: {0}")]
    ResourceUnavailable(String),
    #[error("render exceeded its {budget:?} budget")]
    RenderTimeout { budget: Duration },
    #[error("render failed: {message}")]
    RenderFailure { message: String, retryable: bool },
    #[error("render queue is shutting down")]
    ShuttingDown,
    #[error("invalid report payload: {0}")]
    InvalidPayload(String),
}

impl RenderError {
    /// Classify an engine error raised while printing.
    pub fn from_engine(error: &EngineError) -> Self {
        let retryable =
            error.kind == EngineErrorKind::Disconnected || is_retryable_message(&error.message);
        RenderError::RenderFailure {
            message: error.message.clone(),
            retryable,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RenderError::RenderFailure {
                retryable: true,
                ..
            }
        )
    }

    /// Short machine-readable name used in HTTP bodies and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::QueueFull { .. } => "QueueFull",
            RenderError::RequestTimeout { .. } => "RequestTimeout",
            RenderError::ResourceUnavailable(_) => "ResourceUnavailable",
            RenderError::RenderTimeout { .. } => "RenderTimeout",
            RenderError::RenderFailure { .. } => "RenderFailure",
            RenderError::ShuttingDown => "ShuttingDown",
            RenderError::InvalidPayload(_) => "InvalidPayload",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RenderError::QueueFull { .. }
            | RenderError::ResourceUnavailable(_)
            | RenderError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            RenderError::RequestTimeout { .. } | RenderError::RenderTimeout { .. } => {
                StatusCode::GATEWAY_TIMEOUT
            }
            RenderError::RenderFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            RenderError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Caller-facing text. Engine internals stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            RenderError::QueueFull { .. } => {
                "PDF generation queue is full. Please try again later.".to_string()
            }
            RenderError::RequestTimeout { .. } => {
                "PDF generation request timed out while waiting in the queue. Please try again."
                    .to_string()
            }
            RenderError::ResourceUnavailable(_) => {
                "PDF generator is temporarily unavailable. Please try again shortly.".to_string()
            }
            RenderError::RenderTimeout { .. } => {
                "PDF generation timed out. Please try again with fewer items or a smaller date range."
                    .to_string()
            }
            RenderError::RenderFailure { message, .. } => {
                let lowered = message.to_lowercase();
                if lowered.contains("timeout") || lowered.contains("timed out") {
                    "PDF generation timed out. Please try again with fewer items or a smaller date range."
                        .to_string()
                } else if lowered.contains("memory") || lowered.contains("allocation") {
                    "Not enough memory to generate PDF. Please try with a smaller date range."
                        .to_string()
                } else if lowered.contains("closed") || lowered.contains("disconnected") {
                    "PDF generation was interrupted. Please try again.".to_string()
                } else {
                    "PDF generation failed. Please try again.".to_string()
                }
            }
            RenderError::ShuttingDown => {
                "Service is shutting down. Please try again later.".to_string()
            }
            RenderError::InvalidPayload(details) => details.clone(),
        }
    }
}

pub fn is_retryable_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    RETRYABLE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}
