//! Print engine abstraction.
//!
//! An engine is the expensive, stateful thing that turns HTML into PDF bytes
//! (a headless browser in production). The queue holds at most one of them and
//! never calls it from two places at once.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    Launch,
    Render,
    Close,
    Disconnected,
}

/// Error raised by an engine or its launcher.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn launch(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Launch, message)
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Render, message)
    }

    pub fn close(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Close, message)
    }

    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Disconnected, message)
    }
}

/// A live print engine instance.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Whether the engine is still usable. A disconnected engine is replaced,
    /// never reused.
    fn is_connected(&self) -> bool;

    /// Print a complete HTML document to PDF bytes.
    ///
    /// The returned future may be dropped mid-flight when the caller gives up
    /// waiting; implementations must release whatever the attempt holds when
    /// that happens.
    async fn print_pdf(&self, html: &str) -> Result<Vec<u8>, EngineError>;

    async fn close(&self) -> Result<(), EngineError>;
}

/// Creates engines on demand.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn RenderEngine>, EngineError>;
}
