//! PDF render queue.
//!
//! - `engine` - the print engine seam and its error type
//! - `chromium` - headless Chromium implementation of the engine
//! - `resource` - lifecycle of the single shared engine
//! - `queue` - bounded FIFO of pending requests
//! - `service` - the [`PdfQueue`] handle and submit/await contract
//! - `worker` - the serialized loop that drains the queue
//! - `janitor` - periodic idle engine release
//! - `shutdown` - shutdown coordinator
//! - `handlers` - HTTP routes

pub mod chromium;
pub mod engine;
pub mod error;
pub mod handlers;
mod janitor;
pub mod metrics;
pub mod queue;
pub mod resource;
pub mod service;
pub mod shutdown;
mod worker;

pub use chromium::ChromiumLauncher;
pub use engine::{EngineError, EngineErrorKind, EngineLauncher, RenderEngine};
pub use error::RenderError;
pub use service::{PdfQueue, QueueStatus, RenderTicket};
pub use shutdown::shutdown_with_grace;
