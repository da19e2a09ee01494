//! Echo message definitions
//!
//! The echo protocol imposes no structure on payloads. A message is either a
//! text or a binary payload and is passed back exactly as it arrived.

use std::fmt;

use tokio_tungstenite::tungstenite;

/// A data message exchanged with a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// UTF-8 text payload
    Text(String),
    /// Raw binary payload
    Binary(Vec<u8>),
}

impl Message {
    /// Create a text message
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a binary message
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::Binary(data.into())
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) => data.len(),
        }
    }

    /// Whether the payload is zero-length
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert a transport frame into a data message.
    ///
    /// Returns `None` for control frames (ping, pong, close, raw frames),
    /// which never reach the echo handler.
    pub fn from_frame(frame: tungstenite::Message) -> Option<Self> {
        match frame {
            tungstenite::Message::Text(text) => Some(Self::Text(text)),
            tungstenite::Message::Binary(data) => Some(Self::Binary(data)),
            _ => None,
        }
    }
}

impl From<Message> for tungstenite::Message {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => tungstenite::Message::Text(text),
            Message::Binary(data) => tungstenite::Message::Binary(data),
        }
    }
}

/// Log rendering: text verbatim, binary as its size
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Binary(data) => write!(f, "<binary {} bytes>", data.len()),
        }
    }
}
