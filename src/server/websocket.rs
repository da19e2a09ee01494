//! WebSocket server implementation
//!
//! Listens on a configurable address, upgrades each TCP connection to a
//! WebSocket and runs an echo session for it on its own task.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::{debug, error, info, warn};

use super::connection::{Connection, ConnectionError, WsConnection};
use super::handler::ConnectionHandler;

/// Default port the socket client test suites connect to
pub const DEFAULT_PORT: u16 = 4444;

/// Default bind address
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Configuration for the WebSocket server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind: String,
    /// Port to listen on
    pub port: u16,
    /// Largest accepted message in bytes (transport default if unset)
    pub max_message_size: Option<usize>,
    /// Largest accepted frame in bytes (transport default if unset)
    pub max_frame_size: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BIND.to_string(), DEFAULT_PORT)
    }
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(bind: String, port: u16) -> Self {
        Self {
            bind,
            port,
            max_message_size: None,
            max_frame_size: None,
        }
    }

    /// Set the message size limit
    pub fn with_max_message_size(mut self, max_message_size: Option<usize>) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Set the frame size limit
    pub fn with_max_frame_size(mut self, max_frame_size: Option<usize>) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Transport settings for accepted connections
    pub fn websocket_config(&self) -> WebSocketConfig {
        let mut config = WebSocketConfig::default();
        if self.max_message_size.is_some() {
            config.max_message_size = self.max_message_size;
        }
        if self.max_frame_size.is_some() {
            config.max_frame_size = self.max_frame_size;
        }
        config
    }
}

/// Decrements the live session count when a session task ends
struct SessionGuard(Arc<AtomicUsize>);

impl SessionGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// WebSocket echo server
pub struct WebSocketServer {
    config: ServerConfig,
    handler: ConnectionHandler,
    active_sessions: Arc<AtomicUsize>,
    shutdown_tx: broadcast::Sender<()>,
}

impl WebSocketServer {
    /// Create a new WebSocket server
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            handler: ConnectionHandler::new(),
            active_sessions: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Number of sessions currently running
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    /// Trigger server shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(&self) -> anyhow::Result<()> {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener until shutdown.
    ///
    /// Each connection runs on its own task; a failing connection never
    /// stops the accept loop.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        info!("WebSocket echo server listening on ws://{}", listener.local_addr()?);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let handler = self.handler;
                            let ws_config = self.config.websocket_config();
                            let shutdown_rx = self.shutdown_tx.subscribe();
                            let guard = SessionGuard::enter(&self.active_sessions);

                            tokio::spawn(async move {
                                let _guard = guard;
                                if let Err(e) = handle_connection(stream, peer_addr, handler, ws_config, shutdown_rx).await {
                                    if e.is_peer_fault() {
                                        warn!("Connection error from {}: {}", peer_addr, e);
                                    } else {
                                        error!("Connection error from {}: {}", peer_addr, e);
                                    }
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        let remaining = self.active_sessions();
        if remaining > 0 {
            info!("Closing {} active sessions", remaining);
        }

        Ok(())
    }
}

/// Upgrade one TCP connection and run its echo session
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    handler: ConnectionHandler,
    ws_config: WebSocketConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), ConnectionError> {
    debug!("New TCP connection from {}", peer_addr);

    let mut path = None;
    let capture_path = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        path = Some(request.uri().path().to_string());
        Ok(response)
    };
    let ws_stream = accept_hdr_async_with_config(stream, capture_path, Some(ws_config)).await?;

    let mut conn = WsConnection::new(ws_stream).with_peer_addr(peer_addr);
    if let Some(path) = path {
        conn = conn.with_path(path);
    }
    debug!("Connection {} assigned to {}", conn.id(), peer_addr);

    let outcome = tokio::select! {
        result = handler.run(&mut conn) => Some(result),
        _ = shutdown_rx.recv() => None,
    };

    match outcome {
        Some(result) => {
            let summary = result?;
            debug!("Session {} echoed {} messages", summary.connection_id, summary.echoed);
        }
        None => {
            info!("Shutdown signal received, closing connection {}", conn.id());
            conn.close().await?;
        }
    }

    Ok(())
}
