//! Error types for the `sse` layer.
use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for the connection registry and broadcaster.
/// `error_kind` classifies the failure, `source` holds the underlying error
/// (e.g. the `serde_json` error behind a failed payload serialization).
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Kinds of failures that can occur while framing or delivering events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The application payload could not be serialized to JSON.
    Serialization,
    /// The event name contains a line break and cannot be framed.
    InvalidEventName,
    /// The subscriber's stream has already been closed by the peer.
    SubscriberClosed,
    /// The subscriber is not draining its stream fast enough.
    SubscriberLagging,
}

impl Error {
    pub fn new(error_kind: ErrorKind) -> Self {
        Self {
            source: None,
            error_kind,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error_kind
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::Serialization => write!(f, "failed to serialize event payload"),
            ErrorKind::InvalidEventName => write!(f, "event name must not contain line breaks"),
            ErrorKind::SubscriberClosed => write!(f, "subscriber stream is closed"),
            ErrorKind::SubscriberLagging => write!(f, "subscriber stream is full"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "SSE Error: {}: {source}", self.error_kind),
            None => write!(f, "SSE Error: {}", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<ErrorKind> for Error {
    fn from(error_kind: ErrorKind) -> Self {
        Error::new(error_kind)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Serialization,
        }
    }
}
