//! Chorewheel daemon: daily sweep plus the Telegram ingest loop.
//!
//! Usage: `chorewheel-daemon [CONFIG_PATH]`. Without a path the default
//! config location is used when it exists, otherwise built-in defaults.
//! All logging goes to stderr.

use std::path::PathBuf;

use anyhow::Context;
use chorewheel::ChoreConfig;
use chorewheel::runtime::{open_store, start};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(ChoreConfig::default_config_path);
    let mut config = if path.exists() {
        tracing::info!(path = %path.display(), "loading config");
        ChoreConfig::from_file(&path)
            .with_context(|| format!("loading config from {}", path.display()))?
    } else {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        ChoreConfig::default()
    };
    config.apply_env_overrides();

    let store = open_store(&config.store).context("opening store")?;
    let handle = start(&config, store)?;

    tracing::info!("chorewheel-daemon running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;

    handle.shutdown().await;
    tracing::info!("chorewheel-daemon shut down cleanly");
    Ok(())
}
