//! HTTP surface of the push server.
//!
//! Binds a GET handler on a configurable path (default `/events/:api`) that
//! hands every incoming request over to the `sse` broadcaster as a long-lived
//! `text/event-stream` response, and wraps the listener in a one-shot
//! `start` / `stop` lifecycle.

use std::sync::Arc;
use std::time::Duration;

pub mod error;
pub mod router;
pub mod server;
mod sse;

pub use error::{Error, WebErrorKind};
pub use server::{EventServer, ServerState, SseServer};

// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub sse_manager: Arc<::sse::Manager>,
    /// How long a push connection may go without a delivered frame before it is dropped.
    pub idle_timeout: Duration,
    /// Frames buffered per connection before it is considered lagging.
    pub channel_capacity: usize,
}
