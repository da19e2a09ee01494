//! WebSocket echo server
//!
//! Accepts WebSocket connections, logs every message and sends it straight
//! back. Used as the peer for socket client test suites.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;

use ws_echo::config::{CliOverrides, EchoConfig};
use ws_echo::logging;
use ws_echo::server::WebSocketServer;

/// WebSocket echo server
///
/// Echoes every text or binary message back to its sender
#[derive(Parser, Debug)]
#[command(name = "ws-echo")]
#[command(version, about, long_about = None)]
struct Args {
    /// Port to listen on [default: 4444]
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address [default: 127.0.0.1]
    #[arg(long)]
    bind: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Largest accepted message in bytes
    #[arg(long)]
    max_message_size: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            bind: self.bind.clone(),
            port: self.port,
            max_message_size: self.max_message_size,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let file_config = match &args.config {
        Some(path) => EchoConfig::load(path)?,
        None => EchoConfig::default(),
    };

    logging::init(logging::resolve_level(args.verbose, file_config.log_level()))?;

    info!("ws-echo v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &args.config {
        info!("Loaded configuration from {}", path.display());
    }

    let config = file_config.server_config(&args.overrides())?;

    let server = Arc::new(WebSocketServer::new(config));
    let server_handle = Arc::clone(&server);

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Initiating graceful shutdown...");
        server_handle.shutdown();
    });

    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["ws-echo"]).unwrap();
        assert!(args.port.is_none());
        assert!(args.config.is_none());
        assert!(!args.verbose);

        let server = EchoConfig::default().server_config(&args.overrides()).unwrap();
        assert_eq!(server.socket_addr(), "127.0.0.1:4444");
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::try_parse_from([
            "ws-echo",
            "-p",
            "9001",
            "--bind",
            "0.0.0.0",
            "--max-message-size",
            "2048",
            "-v",
        ])
        .unwrap();

        assert!(args.verbose);
        let server = EchoConfig::default().server_config(&args.overrides()).unwrap();
        assert_eq!(server.socket_addr(), "0.0.0.0:9001");
        assert_eq!(server.max_message_size, Some(2048));
    }
}
