use crate::AppState;
use async_stream::stream;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use log::*;
use sse::message::STREAM_PREAMBLE;
use sse::{ChannelSink, ConnectionId, Manager};
use std::convert::Infallible;
use std::sync::Arc;

/// Deregisters its connection when the response body is dropped, which is
/// how hyper tells us the peer went away. Runs exactly once per connection.
struct ConnectionGuard {
    connection_id: ConnectionId,
    manager: Arc<Manager>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        debug!("SSE connection {} closed, cleaning up", self.connection_id);
        self.manager.unregister_connection(&self.connection_id);
    }
}

/// SSE handler that turns the request into a long-lived push stream.
pub(crate) async fn sse_handler(State(app_state): State<AppState>, uri: Uri) -> Response {
    debug!("Establishing SSE connection on {uri}");

    let (sink, mut rx) = ChannelSink::channel(app_state.channel_capacity);

    let Some(connection_id) = app_state.sse_manager.register_connection(sink) else {
        warn!("Rejecting SSE connection on {uri}: server is shutting down");
        return (StatusCode::SERVICE_UNAVAILABLE, "SERVICE UNAVAILABLE").into_response();
    };

    let guard = ConnectionGuard {
        connection_id,
        manager: Arc::clone(&app_state.sse_manager),
    };
    let idle_timeout = app_state.idle_timeout;

    // Frames arrive from the channel; the stream ends when the sink is closed
    // or nothing has been delivered for `idle_timeout`.
    let stream = stream! {
        let _guard = guard;
        yield Ok::<Bytes, Infallible>(Bytes::from_static(STREAM_PREAMBLE));

        loop {
            match tokio::time::timeout(idle_timeout, rx.recv()).await {
                Ok(Some(frame)) => yield Ok(frame),
                Ok(None) => break,
                Err(_) => {
                    info!("SSE connection {connection_id} idle for {idle_timeout:?}, dropping it");
                    break;
                }
            }
        }
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}
