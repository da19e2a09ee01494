//! Process-wide log sink
//!
//! Installs the global `tracing` subscriber once at startup. Sessions on
//! different tasks write through it concurrently, one line per event.

use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Pick the level: `--verbose` wins, then the config file, then `INFO`
pub fn resolve_level(verbose: bool, configured: Option<Level>) -> Level {
    if verbose {
        Level::DEBUG
    } else {
        configured.unwrap_or(Level::INFO)
    }
}

/// Install the global subscriber. `RUST_LOG` overrides `level` when set.
pub fn init(level: Level) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(level).into()));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_level() {
        assert_eq!(resolve_level(false, None), Level::INFO);
        assert_eq!(resolve_level(false, Some(Level::WARN)), Level::WARN);
        assert_eq!(resolve_level(true, Some(Level::WARN)), Level::DEBUG);
        assert_eq!(resolve_level(true, None), Level::DEBUG);
    }
}
