//! WebSocket server module
//!
//! Accepts WebSocket connections and runs an echo session for each one.

mod connection;
mod handler;
mod protocol;
mod websocket;

pub use connection::*;
pub use handler::*;
pub use protocol::*;
pub use websocket::*;
