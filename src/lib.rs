//! WebSocket echo server library
//!
//! The echo session core ([`server::ConnectionHandler`]) works against the
//! [`server::Connection`] trait; [`server::WebSocketServer`] drives it over
//! tokio-tungstenite.

pub mod config;
pub mod logging;
pub mod server;
