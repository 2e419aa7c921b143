use crate::error::{Error, Result};
use crate::router::define_routes;
use crate::AppState;
use async_trait::async_trait;
use log::*;
use serde::Serialize;
use service::config::{Config, DEFAULT_CONNECTION_URL, DEFAULT_IDLE_TIMEOUT_SECS};
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Programmatic interface of a push server broadcasting payloads of type `T`.
#[async_trait]
pub trait EventServer<T>: Send + Sync {
    /// Begin accepting push connections. Completes once the listener is bound.
    async fn start(&self) -> Result<()>;

    /// Close every push connection and the listener. Completes once the
    /// listener has fully shut down.
    async fn stop(&self) -> Result<()>;

    /// Broadcast `data` as `event` to every connected client.
    fn push_new_data(&self, data: &T, event: &str) -> Result<()>;

    /// Broadcast a heartbeat to every connected client.
    fn keepalive(&self);
}

/// Externally visible lifecycle of a server instance: `Created -> Started -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Started,
    Stopped,
}

enum Lifecycle {
    Created,
    Started {
        local_addr: SocketAddr,
        shutdown: oneshot::Sender<()>,
        serve: JoinHandle<std::io::Result<()>>,
    },
    Stopped,
}

impl Lifecycle {
    fn state(&self) -> ServerState {
        match self {
            Lifecycle::Created => ServerState::Created,
            Lifecycle::Started { .. } => ServerState::Started,
            Lifecycle::Stopped => ServerState::Stopped,
        }
    }
}

/// HTTP server pushing Server-Sent Events to every client connected on
/// `connection_url`. One-shot: once stopped it cannot be started again.
pub struct SseServer<T> {
    interface: String,
    port: u16,
    connection_url: String,
    allowed_origins: Vec<String>,
    app_state: AppState,
    lifecycle: Mutex<Lifecycle>,
    _payload: PhantomData<fn(&T)>,
}

impl<T> SseServer<T> {
    /// Creates a server for `port`, accepting push connections on
    /// `connection_url` (default `/events/:api`) on all interfaces.
    pub fn new(port: u16, connection_url: Option<&str>) -> Self {
        Self {
            interface: "0.0.0.0".to_string(),
            port,
            connection_url: connection_url.unwrap_or(DEFAULT_CONNECTION_URL).to_string(),
            allowed_origins: Vec::new(),
            app_state: AppState {
                sse_manager: Arc::new(sse::Manager::new()),
                idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
                channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            },
            lifecycle: Mutex::new(Lifecycle::Created),
            _payload: PhantomData,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.port, Some(&config.connection_url))
            .with_interface(&config.interface)
            .with_idle_timeout(config.idle_timeout())
            .with_channel_capacity(config.channel_capacity)
            .with_allowed_origins(config.allowed_origins.clone())
    }

    pub fn with_interface(mut self, interface: &str) -> Self {
        self.interface = interface.to_string();
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.app_state.idle_timeout = idle_timeout;
        self
    }

    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.app_state.channel_capacity = channel_capacity;
        self
    }

    pub fn with_allowed_origins(mut self, allowed_origins: Vec<String>) -> Self {
        self.allowed_origins = allowed_origins;
        self
    }

    pub fn connection_url(&self) -> &str {
        &self.connection_url
    }

    /// Address the listener is bound to, once started. Useful when binding port 0.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.lifecycle.lock().await {
            Lifecycle::Started { local_addr, .. } => Some(*local_addr),
            _ => None,
        }
    }

    pub async fn state(&self) -> ServerState {
        self.lifecycle.lock().await.state()
    }

    /// Number of clients currently connected.
    pub fn connection_count(&self) -> usize {
        self.app_state.sse_manager.connection_count()
    }
}

#[async_trait]
impl<T: Serialize> EventServer<T> for SseServer<T> {
    async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if !matches!(*lifecycle, Lifecycle::Created) {
            return Err(Error::invalid_state("start", lifecycle.state()));
        }

        // Build the router first so a bad path or origin never leaves a bound port behind
        let router = define_routes(
            &self.connection_url,
            &self.allowed_origins,
            self.app_state.clone(),
        )?;

        let listener = TcpListener::bind((self.interface.as_str(), self.port))
            .await
            .map_err(|e| {
                error!(
                    "Failed to bind SSE server to {}:{}: {e}",
                    self.interface, self.port
                );
                Error::bind(e)
            })?;
        let local_addr = listener.local_addr().map_err(Error::bind)?;

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let serve = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!(
            "SSE server has started on {local_addr}, accepting connections on {}",
            self.connection_url
        );

        *lifecycle = Lifecycle::Started {
            local_addr,
            shutdown,
            serve,
        };
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        let (shutdown, serve) = match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Started {
                shutdown, serve, ..
            } => (shutdown, serve),
            other => {
                let state = other.state();
                *lifecycle = other;
                warn!("Ignoring stop request: SSE server is {state:?}");
                return Err(Error::invalid_state("stop", state));
            }
        };

        // Ending every stream first lets the graceful shutdown complete
        self.app_state.sse_manager.close_all();
        // The serve task only exits early on error, which the join below reports
        let _ = shutdown.send(());

        match serve.await {
            Ok(Ok(())) => {
                info!("SSE server has stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                error!("SSE server failed while shutting down: {e}");
                Err(Error::serve(e))
            }
            Err(e) => {
                error!("SSE server task did not complete: {e}");
                Err(Error::serve(e))
            }
        }
    }

    fn push_new_data(&self, data: &T, event: &str) -> Result<()> {
        self.app_state.sse_manager.push_new_data(data, event)?;
        Ok(())
    }

    fn keepalive(&self) {
        self.app_state.sse_manager.keepalive();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WebErrorKind;
    use serde_json::{json, Value};

    fn server() -> SseServer<Value> {
        SseServer::new(0, None).with_interface("127.0.0.1")
    }

    #[test]
    fn test_new_uses_default_path_and_idle_timeout() {
        let server = SseServer::<Value>::new(3201, None);
        assert_eq!(server.connection_url(), "/events/:api");
        assert_eq!(server.port, 3201);
        assert_eq!(server.app_state.idle_timeout, Duration::from_secs(10));

        let server = SseServer::<Value>::new(3201, Some("/stream"));
        assert_eq!(server.connection_url(), "/stream");
    }

    #[tokio::test]
    async fn test_lifecycle_moves_created_started_stopped() {
        let server = server();
        assert_eq!(server.state().await, ServerState::Created);
        assert!(server.local_addr().await.is_none());

        server.start().await.unwrap();
        assert_eq!(server.state().await, ServerState::Started);
        assert!(server.local_addr().await.is_some());

        server.stop().await.unwrap();
        assert_eq!(server.state().await, ServerState::Stopped);
        assert!(server.local_addr().await.is_none());
    }

    #[tokio::test]
    async fn test_stop_before_start_is_reported() {
        let server = server();
        let err = server.stop().await.unwrap_err();
        assert_eq!(
            err.kind(),
            &WebErrorKind::InvalidState {
                operation: "stop",
                state: ServerState::Created
            }
        );
        assert_eq!(server.state().await, ServerState::Created);
    }

    #[tokio::test]
    async fn test_double_start_and_double_stop_are_reported() {
        let server = server();
        server.start().await.unwrap();

        let err = server.start().await.unwrap_err();
        assert_eq!(
            err.kind(),
            &WebErrorKind::InvalidState {
                operation: "start",
                state: ServerState::Started
            }
        );

        server.stop().await.unwrap();
        let err = server.stop().await.unwrap_err();
        assert_eq!(
            err.kind(),
            &WebErrorKind::InvalidState {
                operation: "stop",
                state: ServerState::Stopped
            }
        );

        let err = server.start().await.unwrap_err();
        assert!(matches!(err.kind(), WebErrorKind::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_bind_failure_leaves_server_created() {
        let first = server();
        first.start().await.unwrap();
        let port = first.local_addr().await.unwrap().port();

        let second: SseServer<Value> = SseServer::new(port, None).with_interface("127.0.0.1");
        let err = second.start().await.unwrap_err();
        assert_eq!(err.kind(), &WebErrorKind::Bind);
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(second.state().await, ServerState::Created);

        first.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_path_fails_start() {
        let server: SseServer<Value> =
            SseServer::new(0, Some("events")).with_interface("127.0.0.1");
        let err = server.start().await.unwrap_err();
        assert!(matches!(err.kind(), WebErrorKind::Configuration(_)));
        assert_eq!(server.state().await, ServerState::Created);
    }

    #[tokio::test]
    async fn test_push_and_keepalive_without_clients_are_no_ops() {
        let server = server();
        server.push_new_data(&json!({ "count": 1 }), "update").unwrap();
        server.keepalive();

        server.start().await.unwrap();
        server.keepalive();
        server.stop().await.unwrap();

        server.push_new_data(&json!({ "count": 2 }), "update").unwrap();
        server.keepalive();
        assert_eq!(server.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_event_name_is_reported() {
        let server = server();
        let err = server.push_new_data(&json!(1), "two\nlines").unwrap_err();
        assert_eq!(
            err.kind(),
            &WebErrorKind::Sse(sse::ErrorKind::InvalidEventName)
        );
    }
}
