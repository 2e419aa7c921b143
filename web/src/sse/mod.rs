//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for the push endpoint.
//! The core SSE infrastructure (Manager, ConnectionRegistry, framing)
//! lives in the `sse` crate so it can be exercised without HTTP.

pub mod handler;
