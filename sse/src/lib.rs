//! Server-Sent Events (SSE) core: connection bookkeeping and broadcast.
//!
//! This crate knows nothing about HTTP. The web layer hands it one writable
//! stream per push connection and it takes care of the rest.
//!
//! # Architecture
//!
//! - **Monotonic ids**: every connection gets a `ConnectionId` from an atomic
//!   counter, starting at 1 and never reused.
//! - **Sharded registry**: live streams sit in a `DashMap`, so registrations and
//!   disconnects from many request tasks don't contend on a single lock.
//! - **Serialize once, write many**: a payload is turned into JSON once, framed,
//!   and the same bytes are handed to every stream.
//! - **Best effort**: writes never block. A stream that is gone or too far
//!   behind is dropped from the registry and the broadcast moves on.
//! - **Ephemeral messages**: nothing is buffered for clients that are not
//!   connected at the time of the broadcast.
//!
//! # Wire format
//!
//! ```text
//! id: 0
//! event: update
//! data: {"count":1}
//!
//! ```
//!
//! # Example: broadcasting an event
//!
//! ```rust
//! use sse::Manager;
//!
//! let manager: Manager = Manager::new();
//! // No connections yet, so this is a no-op
//! manager
//!     .push_new_data(&serde_json::json!({ "count": 1 }), "update")
//!     .unwrap();
//! manager.keepalive();
//! ```
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry, ConnectionId and the EventSink stream capability
//! - `manager`: Broadcast of data and keepalive frames (delegates to ConnectionRegistry)
//! - `message`: Wire-format framing
//! - `error`: Error and ErrorKind

pub mod connection;
pub mod error;
pub mod manager;
pub mod message;

pub use connection::{ChannelSink, ConnectionId, EventSink};
pub use error::{Error, ErrorKind};
pub use manager::Manager;
