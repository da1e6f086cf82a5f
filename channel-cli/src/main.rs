//! # securechannel
//!
//! Run a relay or an origin, or talk to either as a client.
//!
//! ## Commands
//!
//! - `origin`: Serve the object store
//! - `relay`: Verify, re-sign and forward to an origin
//! - `get`, `post`, `delete`: Send one request
//! - `shell`: Interactive client
//!
//! ## Example
//!
//! ```bash
//! securechannel origin --listen 127.0.0.1:9000 --root ./store
//! securechannel relay --listen 127.0.0.1:8443 --origin 127.0.0.1:9000
//!
//! securechannel post notes.txt "hello"
//! securechannel get notes.txt
//! securechannel delete notes.txt --client-id 7421
//! securechannel shell --compare 127.0.0.1:9000
//! ```

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use channel_client::ClientIdentity;
use commands::{origin, relay, request, shell};

/// Authenticated relay and object store.
#[derive(Parser, Debug)]
#[command(name = "securechannel")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the client commands.
#[derive(Args, Debug, Clone)]
struct ClientArgs {
    /// Relay or origin to connect to
    #[arg(long, short, default_value = "127.0.0.1:8443")]
    server: String,

    /// Session token recorded as owner (default: random UUID)
    #[arg(long)]
    client_id: Option<String>,

    /// Host metadata recorded as owner (default: host name)
    #[arg(long)]
    client_info: Option<String>,
}

impl ClientArgs {
    fn identity(&self) -> ClientIdentity {
        let mut identity = ClientIdentity::generate();
        if let Some(id) = &self.client_id {
            identity = identity.with_client_id(id.clone());
        }
        if let Some(info) = &self.client_info {
            identity = identity.with_client_info(info.clone());
        }
        identity
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the object store
    Origin {
        /// Configuration file (TOML)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Listen address (overrides the file)
        #[arg(long, short)]
        listen: Option<String>,

        /// Store root directory (overrides the file)
        #[arg(long, short, conflicts_with = "memory")]
        root: Option<PathBuf>,

        /// Keep objects in memory only
        #[arg(long)]
        memory: bool,
    },

    /// Verify, re-sign and forward requests to an origin
    Relay {
        /// Configuration file (TOML)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Client-facing listen address (overrides the file)
        #[arg(long, short)]
        listen: Option<String>,

        /// Origin address (overrides the file)
        #[arg(long, short)]
        origin: Option<String>,
    },

    /// Fetch an object
    Get {
        /// Object name
        url: String,

        /// Write the content here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// Create an object
    Post {
        /// Object name
        url: String,

        /// Content (or use --file)
        data: Option<String>,

        /// File to upload
        #[arg(long, short, conflicts_with = "data")]
        file: Option<PathBuf>,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// Delete an object you created
    Delete {
        /// Object name
        url: String,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// Interactive client: GET/POST/DELETE lines until QUIT
    Shell {
        #[command(flatten)]
        client: ClientArgs,

        /// Also send every request straight to this origin and print both
        /// signatures
        #[arg(long, value_name = "ORIGIN")]
        compare: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Origin {
            config,
            listen,
            root,
            memory,
        } => {
            origin::run(config.as_deref(), listen, root, memory).await?;
        }
        Commands::Relay {
            config,
            listen,
            origin,
        } => {
            relay::run(config.as_deref(), listen, origin).await?;
        }
        Commands::Get {
            url,
            output,
            client,
        } => {
            request::get(&client.server, client.identity(), &url, output.as_deref()).await?;
        }
        Commands::Post {
            url,
            data,
            file,
            client,
        } => {
            let content = match (data, file) {
                (Some(data), _) => data.into_bytes(),
                (None, Some(path)) => request::read_upload(&path).await?,
                (None, None) => anyhow::bail!("Must specify data or --file"),
            };
            request::post(&client.server, client.identity(), &url, content).await?;
        }
        Commands::Delete { url, client } => {
            request::delete(&client.server, client.identity(), &url).await?;
        }
        Commands::Shell { client, compare } => {
            shell::run(&client.server, compare.as_deref(), client.identity()).await?;
        }
    }

    Ok(())
}
