//! Relay command - forward to an origin until Ctrl+C.

use anyhow::{Context, Result};
use channel_relay::{Config, RelayServer};
use std::path::Path;

use super::shutdown_signal;

/// Run the relay command.
pub async fn run(
    config_path: Option<&Path>,
    listen: Option<String>,
    origin: Option<String>,
) -> Result<()> {
    let config = load_config(config_path, listen, origin)?;

    let server = RelayServer::bind(&config)
        .await
        .context("Failed to start relay")?;
    server.serve_until(shutdown_signal()).await;
    Ok(())
}

fn load_config(
    path: Option<&Path>,
    listen: Option<String>,
    origin: Option<String>,
) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(listen) = listen {
        config.server.bind_address = listen;
    }
    if let Some(origin) = origin {
        config.server.origin_address = origin;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let config = load_config(None, None, Some("10.0.0.2:9000".into())).unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:8443");
        assert_eq!(config.server.origin_address, "10.0.0.2:9000");
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = load_config(Some(Path::new("/nonexistent/relay.toml")), None, None);
        assert!(result.is_err());
    }
}
