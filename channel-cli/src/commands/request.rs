//! One-shot client commands: get, post, delete.

use anyhow::{Context, Result};
use channel_client::{Client, ClientIdentity};
use channel_types::Response;
use std::path::Path;

/// Fetch `url`, writing the content to `output` or stdout.
pub async fn get(
    server: &str,
    identity: ClientIdentity,
    url: &str,
    output: Option<&Path>,
) -> Result<()> {
    let mut client = connect(server, identity).await?;
    let response = client.get(url).await?;
    client.close().await;
    ensure_ok(&response, "GET", url)?;

    match output {
        Some(path) => {
            tokio::fs::write(path, &response.content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Saved {} bytes to {}", response.content.len(), path.display());
        }
        None => println!("{}", String::from_utf8_lossy(&response.content)),
    }
    Ok(())
}

/// Create `url` with `content`.
pub async fn post(
    server: &str,
    identity: ClientIdentity,
    url: &str,
    content: Vec<u8>,
) -> Result<()> {
    let mut client = connect(server, identity).await?;
    let response = client.post(url, content).await?;
    client.close().await;
    ensure_ok(&response, "POST", url)?;

    println!(
        "Created {} on {} ({} bytes)",
        url,
        response.server_info,
        response.content.len()
    );
    Ok(())
}

/// Delete `url`.
pub async fn delete(server: &str, identity: ClientIdentity, url: &str) -> Result<()> {
    let mut client = connect(server, identity).await?;
    let response = client.delete(url).await?;
    client.close().await;
    ensure_ok(&response, "DELETE", url)?;

    println!("Deleted {}", url);
    Ok(())
}

/// Read a file to upload.
pub async fn read_upload(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn connect(server: &str, identity: ClientIdentity) -> Result<Client> {
    tracing::debug!(
        "Connecting to {} as {} ({})",
        server,
        identity.client_id,
        identity.client_info
    );
    Client::connect(server, identity)
        .await
        .with_context(|| format!("Failed to connect to {}", server))
}

fn ensure_ok(response: &Response, verb: &str, url: &str) -> Result<()> {
    if !response.status.is_ok() {
        anyhow::bail!("{} {} failed: {}", verb, url, response.status);
    }
    Ok(())
}
