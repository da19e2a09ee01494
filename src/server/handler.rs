//! Echo session handler
//!
//! Runs one session per connection: every message received is logged and
//! sent straight back until the peer closes.

use tracing::info;

use super::connection::{Connection, ConnectionId, ConnectionResult, Inbound};

/// Path reported when the transport exposes none
pub const DEFAULT_PATH: &str = "/";

/// What a finished session did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Connection the session ran on
    pub connection_id: ConnectionId,
    /// Number of messages received and echoed
    pub echoed: usize,
}

/// Handles a single WebSocket connection
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionHandler;

impl ConnectionHandler {
    /// Create a new connection handler
    pub fn new() -> Self {
        Self
    }

    /// Run the echo session until the peer closes the connection.
    ///
    /// Each message is sent back before the next one is read. A peer close
    /// ends the session with `Ok`; any other transport failure is returned
    /// to the caller untouched.
    pub async fn run<C>(&self, conn: &mut C) -> ConnectionResult<SessionSummary>
    where
        C: Connection + Send,
    {
        let connection_id = conn.id();
        info!(
            "{} opened connection via {}",
            connection_id,
            conn.path().unwrap_or(DEFAULT_PATH)
        );

        let mut echoed = 0;
        loop {
            match conn.receive().await? {
                Inbound::Message(message) => {
                    info!("< {}", message);
                    let line = message.to_string();
                    conn.send(message).await?;
                    info!("> {}", line);
                    echoed += 1;
                }
                Inbound::Closed => {
                    info!("{} closed connection", connection_id);
                    return Ok(SessionSummary {
                        connection_id,
                        echoed,
                    });
                }
            }
        }
    }
}
