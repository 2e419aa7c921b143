use crate::connection::{ChannelSink, ConnectionId, ConnectionRegistry, EventSink};
use crate::error::Error;
use crate::message::Frame;
use bytes::Bytes;
use log::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Broadcasts framed events to every registered connection.
pub struct Manager<S = ChannelSink> {
    registry: ConnectionRegistry<S>,
    // Held for the whole of a broadcast so frames of concurrent broadcasts never interleave.
    broadcast_lock: Mutex<()>,
    closed: AtomicBool,
}

impl<S: EventSink> Manager<S> {
    pub fn new() -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            broadcast_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// Register a new connection and return its unique ID.
    ///
    /// Returns `None` once `close_all` has run; the sink is closed right away.
    pub fn register_connection(&self, sink: S) -> Option<ConnectionId> {
        if self.is_closed() {
            sink.close();
            return None;
        }

        let connection_id = self.registry.register(sink);

        // close_all may have drained the registry between the check above and the insert
        if self.is_closed() {
            self.unregister_connection(&connection_id);
            return None;
        }

        info!("Registered new SSE connection {connection_id}");
        Some(connection_id)
    }

    /// Unregister a connection by ID, closing its stream. No-op for unknown ids.
    pub fn unregister_connection(&self, connection_id: &ConnectionId) {
        if let Some(sink) = self.registry.deregister(connection_id) {
            info!("Unregistering SSE connection {connection_id}");
            sink.close();
        }
    }

    /// Serialize `data` once and send it as `event` to every live connection.
    ///
    /// Fails without writing anything if the payload cannot be serialized or the
    /// event name cannot be framed.
    pub fn push_new_data<T: Serialize + ?Sized>(&self, data: &T, event: &str) -> Result<(), Error> {
        let frame = Frame::data(event, data).map_err(|e| {
            error!("Failed to frame SSE event {event:?}: {e}");
            e
        })?;

        self.broadcast(&frame);
        Ok(())
    }

    /// Send a heartbeat frame to every live connection.
    pub fn keepalive(&self) {
        self.broadcast(&Frame::keepalive());
    }

    /// Close every live connection and refuse new registrations.
    /// Returns the number of connections that were closed.
    pub fn close_all(&self) -> usize {
        let _guard = self
            .broadcast_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        self.closed.store(true, Ordering::SeqCst);

        let ids = self.registry.ids();
        let mut closed = 0;
        for connection_id in &ids {
            if let Some(sink) = self.registry.deregister(connection_id) {
                sink.close();
                closed += 1;
            }
        }

        info!("Closed {closed} SSE connection(s)");
        closed
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Broadcast a frame to all connections - O(n).
    /// Connections whose write fails are removed once the iteration is over.
    fn broadcast(&self, frame: &Frame) {
        let _guard = self
            .broadcast_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let bytes: Bytes = frame.to_bytes();
        let mut failed = Vec::new();

        self.registry.for_each(|connection_id, sink| {
            match sink.write(bytes.clone()) {
                Ok(()) => debug!(
                    "{} has just been sent to connection {connection_id}",
                    frame.event()
                ),
                Err(e) => {
                    warn!(
                        "Failed to send {} to connection {connection_id}: {e}. Connection will be cleaned up.",
                        frame.event()
                    );
                    failed.push(*connection_id);
                }
            }
        });

        for connection_id in &failed {
            self.unregister_connection(connection_id);
        }
    }
}

impl<S: EventSink> Default for Manager<S> {
    fn default() -> Self {
        Self::new()
    }
}
