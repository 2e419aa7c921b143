use crate::error::{Error, ErrorKind};
use bytes::Bytes;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Unique identifier for a connection, issued by the registry.
/// Ids start at 1 and are never reused for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Writable, closable output handle of one push connection.
pub trait EventSink: Send + Sync {
    /// Hands a fully framed event to the stream. Must not block: a stream that
    /// cannot take the frame right away reports an error instead.
    fn write(&self, frame: Bytes) -> Result<(), Error>;

    /// Ends the stream, signalling end-of-stream to the client.
    fn close(self);
}

/// Sink backed by a bounded channel whose receiving half feeds an HTTP response body.
#[derive(Debug)]
pub struct ChannelSink {
    sender: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    /// Creates a sink and the receiver the response body should drain.
    /// `capacity` is the number of frames buffered before the client counts as lagging.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn write(&self, frame: Bytes) -> Result<(), Error> {
        self.sender.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => Error::new(ErrorKind::SubscriberLagging),
            TrySendError::Closed(_) => Error::new(ErrorKind::SubscriberClosed),
        })
    }

    fn close(self) {
        // Dropping the only sender ends the receiving body stream.
        drop(self.sender);
    }
}

/// Registry of live subscriber streams keyed by a monotonically increasing id.
pub struct ConnectionRegistry<S> {
    next_id: AtomicU64,
    connections: DashMap<ConnectionId, S>,
}

impl<S: EventSink> ConnectionRegistry<S> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            connections: DashMap::new(),
        }
    }

    /// Register a new stream and return its id - O(1), never blocks on other registrations
    pub fn register(&self, sink: S) -> ConnectionId {
        let connection_id = ConnectionId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.connections.insert(connection_id, sink);
        connection_id
    }

    /// Remove a stream, handing it back to the caller. Removing an absent id is a no-op.
    pub fn deregister(&self, connection_id: &ConnectionId) -> Option<S> {
        self.connections
            .remove(connection_id)
            .map(|(_, sink)| sink)
    }

    /// Visit every stream currently present, in unspecified order.
    ///
    /// Each shard stays read-locked while it is visited, so an entry cannot be
    /// removed (and closed) while the visitor is writing to it. The visitor must
    /// not call back into the registry.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&ConnectionId, &S),
    {
        for entry in self.connections.iter() {
            visitor(entry.key(), entry.value());
        }
    }

    /// Ids of all streams currently present.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl<S: EventSink> Default for ConnectionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[derive(Debug, Default)]
    struct NullSink;

    impl EventSink for NullSink {
        fn write(&self, _frame: Bytes) -> Result<(), Error> {
            Ok(())
        }

        fn close(self) {}
    }

    #[test]
    fn first_id_is_one_and_ids_increase() {
        let registry = ConnectionRegistry::new();
        let first = registry.register(NullSink);
        let second = registry.register(NullSink);

        assert_eq!(first.as_u64(), 1);
        assert_eq!(second.as_u64(), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn ids_are_not_reused_after_deregistration() {
        let registry = ConnectionRegistry::new();
        let first = registry.register(NullSink);
        assert!(registry.deregister(&first).is_some());

        let second = registry.register(NullSink);
        assert_ne!(first, second);
        assert_eq!(second.as_u64(), 2);
    }

    #[test]
    fn deregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let keep = registry.register(NullSink);
        let gone = registry.register(NullSink);

        assert!(registry.deregister(&gone).is_some());
        assert!(registry.deregister(&gone).is_none());
        assert!(registry.deregister(&gone).is_none());

        assert_eq!(registry.ids(), vec![keep]);
    }

    #[test]
    fn for_each_skips_removed_entries() {
        let registry = ConnectionRegistry::new();
        let a = registry.register(NullSink);
        let b = registry.register(NullSink);
        let c = registry.register(NullSink);
        registry.deregister(&b);

        let mut visited = Vec::new();
        registry.for_each(|id, _| visited.push(*id));
        visited.sort();

        assert_eq!(visited, vec![a, c]);
    }

    #[test]
    fn concurrent_registrations_get_unique_ids() {
        let registry = Arc::new(ConnectionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    (0..50)
                        .map(|_| registry.register(NullSink))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let ids: HashSet<ConnectionId> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();

        assert_eq!(ids.len(), 400);
        assert_eq!(registry.len(), 400);
        assert_eq!(ids.iter().map(|id| id.as_u64()).max(), Some(400));
    }

    #[tokio::test]
    async fn channel_sink_reports_closed_and_full_streams() {
        let (sink, mut receiver) = ChannelSink::channel(1);
        sink.write(Bytes::from_static(b"one")).unwrap();

        let err = sink.write(Bytes::from_static(b"two")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SubscriberLagging);

        assert_eq!(receiver.recv().await, Some(Bytes::from_static(b"one")));
        drop(receiver);

        let err = sink.write(Bytes::from_static(b"three")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SubscriberClosed);
    }

    #[tokio::test]
    async fn closing_channel_sink_ends_the_stream() {
        let (sink, mut receiver) = ChannelSink::channel(4);
        sink.write(Bytes::from_static(b"last")).unwrap();
        sink.close();

        assert_eq!(receiver.recv().await, Some(Bytes::from_static(b"last")));
        assert_eq!(receiver.recv().await, None);
    }
}
