//! Error types for the `web` layer.
use std::error::Error as StdError;
use std::fmt;

use crate::server::ServerState;

pub type Result<T> = core::result::Result<T, Error>;

/// Errors surfaced by the server lifecycle and the push operations.
/// Errors from the `sse` layer are translated into `WebErrorKind::Sse` and keep
/// the underlying error as `source`.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: WebErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum WebErrorKind {
    /// The listener could not be bound (port in use, insufficient privilege).
    Bind,
    /// The push endpoint path or the allowed origins are malformed.
    Configuration(String),
    /// The requested operation is not valid in the server's current state.
    InvalidState {
        operation: &'static str,
        state: ServerState,
    },
    /// The HTTP serve task ended with an error or panicked.
    Serve,
    Sse(sse::ErrorKind),
}

impl Error {
    pub fn kind(&self) -> &WebErrorKind {
        &self.error_kind
    }

    pub(crate) fn bind(err: std::io::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: WebErrorKind::Bind,
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Error {
            source: None,
            error_kind: WebErrorKind::Configuration(message.into()),
        }
    }

    pub(crate) fn invalid_state(operation: &'static str, state: ServerState) -> Self {
        Error {
            source: None,
            error_kind: WebErrorKind::InvalidState { operation, state },
        }
    }

    pub(crate) fn serve<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error {
            source: Some(Box::new(err)),
            error_kind: WebErrorKind::Serve,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            WebErrorKind::Bind => write!(f, "Web Error: failed to bind listener")?,
            WebErrorKind::Configuration(message) => {
                write!(f, "Web Error: invalid configuration: {message}")?
            }
            WebErrorKind::InvalidState { operation, state } => {
                write!(f, "Web Error: cannot {operation} a server that is {state:?}")?
            }
            WebErrorKind::Serve => write!(f, "Web Error: server task failed")?,
            WebErrorKind::Sse(kind) => write!(f, "Web Error: {kind}")?,
        }
        match &self.source {
            Some(source) => write!(f, " ({source})"),
            None => Ok(()),
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

// This is where we translate errors from the `sse` layer to the `web` layer.
impl From<sse::Error> for Error {
    fn from(err: sse::Error) -> Self {
        Error {
            error_kind: WebErrorKind::Sse(err.kind()),
            source: Some(Box::new(err)),
        }
    }
}
