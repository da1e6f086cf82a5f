//! Origin command - serve the object store until Ctrl+C.

use anyhow::{Context, Result};
use channel_origin::{Config, OriginServer, StorageBackend};
use std::path::{Path, PathBuf};

use super::shutdown_signal;

/// Run the origin command.
pub async fn run(
    config_path: Option<&Path>,
    listen: Option<String>,
    root: Option<PathBuf>,
    memory: bool,
) -> Result<()> {
    let config = load_config(config_path, listen, root, memory)?;

    let server = OriginServer::bind(&config)
        .await
        .context("Failed to start origin")?;
    server.serve_until(shutdown_signal()).await;
    Ok(())
}

fn load_config(
    path: Option<&Path>,
    listen: Option<String>,
    root: Option<PathBuf>,
    memory: bool,
) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(listen) = listen {
        config.server.bind_address = listen;
    }
    if let Some(root) = root {
        config.storage.root = root;
        config.storage.backend = StorageBackend::Fs;
    }
    if memory {
        config.storage.backend = StorageBackend::Memory;
    }
    Ok(config)
}
