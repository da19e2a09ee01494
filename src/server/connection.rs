//! Connection abstraction
//!
//! The echo handler talks to a [`Connection`] rather than to a WebSocket
//! stream directly. [`WsConnection`] is the transport-backed implementation
//! used by the server.

use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, error::CapacityError, error::ProtocolError};
use tokio_tungstenite::WebSocketStream;
use uuid::Uuid;

use super::protocol::Message;

/// Transport failures surfaced by `receive` and `send`.
///
/// A normal close by the peer is not an error; see [`Inbound::Closed`].
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Protocol violation: {0}")]
    Protocol(ProtocolError),

    #[error("Message too large: {0}")]
    Capacity(CapacityError),

    #[error("Invalid UTF-8 in text message")]
    Utf8,

    #[error("Transport error: {0}")]
    Transport(tungstenite::Error),
}

/// Result type for connection operations
pub type ConnectionResult<T> = Result<T, ConnectionError>;

impl ConnectionError {
    /// Whether the failure was caused by the remote side (misbehaving or
    /// vanished peer) rather than by this process.
    pub fn is_peer_fault(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ),
            Self::Protocol(_) | Self::Capacity(_) | Self::Utf8 => true,
            Self::Transport(_) => false,
        }
    }
}

impl From<tungstenite::Error> for ConnectionError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Io(e) => Self::Io(e),
            tungstenite::Error::Protocol(e) => Self::Protocol(e),
            tungstenite::Error::Capacity(e) => Self::Capacity(e),
            tungstenite::Error::Utf8 { .. } => Self::Utf8,
            other => Self::Transport(other),
        }
    }
}

/// Stable identity of one accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outcome of a single `receive`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A data message arrived
    Message(Message),
    /// The peer closed the connection
    Closed,
}

/// A full-duplex message channel handed to the echo handler.
///
/// `receive` and `send` are never called concurrently for the same
/// connection.
pub trait Connection {
    /// Identity used for log correlation
    fn id(&self) -> ConnectionId;

    /// Request path the connection arrived on, if the transport exposes one
    fn path(&self) -> Option<&str>;

    /// Wait for the next data message or the closed signal
    fn receive(&mut self) -> impl Future<Output = ConnectionResult<Inbound>> + Send;

    /// Send a data message, waiting until the transport accepts it
    fn send(&mut self, message: Message) -> impl Future<Output = ConnectionResult<()>> + Send;
}

/// [`Connection`] backed by a tungstenite WebSocket stream
pub struct WsConnection<S = TcpStream> {
    id: ConnectionId,
    path: Option<String>,
    peer_addr: Option<SocketAddr>,
    stream: WebSocketStream<S>,
}

impl<S> WsConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already-upgraded stream
    pub fn new(stream: WebSocketStream<S>) -> Self {
        Self {
            id: ConnectionId::new(),
            path: None,
            peer_addr: None,
            stream,
        }
    }

    /// Record the request path from the upgrade request
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Record the remote address
    pub fn with_peer_addr(mut self, peer_addr: SocketAddr) -> Self {
        self.peer_addr = Some(peer_addr);
        self
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Start the closing handshake from our side.
    ///
    /// Only used by the server when shutting down; the echo handler never
    /// closes a connection.
    pub async fn close(&mut self) -> ConnectionResult<()> {
        match self.stream.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl<S> Connection for WsConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    async fn receive(&mut self) -> ConnectionResult<Inbound> {
        loop {
            match self.stream.next().await {
                Some(Ok(frame)) if frame.is_close() => {
                    // Push out the close reply tungstenite queued for us
                    let _ = self.stream.flush().await;
                    return Ok(Inbound::Closed);
                }
                Some(Ok(frame)) => {
                    if let Some(message) = Message::from_frame(frame) {
                        return Ok(Inbound::Message(message));
                    }
                    // Ping/pong: the pong reply is queued by tungstenite
                }
                Some(Err(tungstenite::Error::ConnectionClosed)) | None => {
                    return Ok(Inbound::Closed);
                }
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn send(&mut self, message: Message) -> ConnectionResult<()> {
        self.stream.send(tungstenite::Message::from(message)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, DuplexStream};
    use tokio_tungstenite::tungstenite::protocol::Role;

    async fn ws_pair() -> (WsConnection<DuplexStream>, WebSocketStream<DuplexStream>) {
        let (server_io, client_io) = duplex(64 * 1024);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        (WsConnection::new(server).with_path("/websocket"), client)
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string(), a.as_uuid().to_string());
    }

    #[test]
    fn test_error_classification() {
        let reset = ConnectionError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert!(reset.is_peer_fault());

        let local = ConnectionError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "nope"));
        assert!(!local.is_peer_fault());

        let utf8: ConnectionError = tungstenite::Error::Utf8.into();
        assert!(matches!(utf8, ConnectionError::Utf8));
        assert!(utf8.is_peer_fault());

        let closed: ConnectionError = tungstenite::Error::AlreadyClosed.into();
        assert!(matches!(closed, ConnectionError::Transport(_)));
        assert!(!closed.is_peer_fault());
    }

    #[tokio::test]
    async fn test_ws_connection_metadata() {
        let (conn, _client) = ws_pair().await;
        assert_eq!(conn.path(), Some("/websocket"));
        assert!(conn.peer_addr().is_none());
    }

    #[tokio::test]
    async fn test_receive_text_and_binary() {
        let (mut conn, mut client) = ws_pair().await;

        client
            .send(tungstenite::Message::Text("hello".to_string()))
            .await
            .unwrap();
        client
            .send(tungstenite::Message::Binary(vec![1, 2, 3]))
            .await
            .unwrap();

        assert_eq!(
            conn.receive().await.unwrap(),
            Inbound::Message(Message::text("hello"))
        );
        assert_eq!(
            conn.receive().await.unwrap(),
            Inbound::Message(Message::binary(vec![1, 2, 3]))
        );
    }

    #[tokio::test]
    async fn test_receive_skips_ping() {
        let (mut conn, mut client) = ws_pair().await;

        client
            .send(tungstenite::Message::Ping(vec![9]))
            .await
            .unwrap();
        client
            .send(tungstenite::Message::Text("after ping".to_string()))
            .await
            .unwrap();

        assert_eq!(
            conn.receive().await.unwrap(),
            Inbound::Message(Message::text("after ping"))
        );
    }

    #[tokio::test]
    async fn test_receive_reports_close() {
        let (mut conn, mut client) = ws_pair().await;

        client.close(None).await.unwrap();

        assert_eq!(conn.receive().await.unwrap(), Inbound::Closed);
    }

    #[tokio::test]
    async fn test_receive_after_abrupt_disconnect() {
        let (mut conn, client) = ws_pair().await;

        drop(client);

        // Dropping the raw stream without a close frame is an abrupt
        // disconnect, which tungstenite reports as a protocol error.
        let result = conn.receive().await;
        match result {
            Ok(Inbound::Closed) => {}
            Err(e) => assert!(e.is_peer_fault(), "unexpected error: {e}"),
            Ok(other) => panic!("Expected close, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_reaches_peer() {
        let (mut conn, mut client) = ws_pair().await;

        conn.send(Message::text("out")).await.unwrap();

        let frame = client.next().await.unwrap().unwrap();
        assert_eq!(frame, tungstenite::Message::Text("out".to_string()));
    }
}
