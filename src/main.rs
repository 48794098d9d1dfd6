//! TLS Room Chat Server - Entry Point
//!
//! Loads configuration, starts the ChatServer actor and accepts TLS
//! connections.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tls_room_chat::{handle_connection, tls, ChatServer, ConnectionOptions, FileStore, ServerConfig};

/// Channel buffer size for server commands
const CHANNEL_BUFFER_SIZE: usize = 256;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "room-chat-server")]
#[command(about = "Multi-room TLS line chat server")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/server.toml")]
    config: PathBuf,

    /// Override host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Override listener port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override log level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config_found = args.config.exists();
    let mut config = if config_found {
        ServerConfig::from_file(&args.config)
            .with_context(|| format!("loading {}", args.config.display()))?
    } else {
        ServerConfig::default()
    };
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    // Initialize logging; RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("tls_room_chat={}", config.log_level))),
        )
        .init();

    if !config_found {
        warn!("Config file {} not found, using defaults", args.config.display());
    }

    let store = FileStore::open(&config.upload_dir)
        .await
        .with_context(|| format!("creating {}", config.upload_dir.display()))?;
    info!("Staging shared files in {}", store.root().display());

    let acceptor = tls::acceptor(&config.certfile, &config.keyfile)?;

    // Start TCP listener
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("TLS Room Chat Server listening on {}", addr);

    // Create ChatServer actor channel and start
    let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    tokio::spawn(ChatServer::new(cmd_rx, store).run());

    let options = ConnectionOptions::from(&config);

    // Connection accept loop
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                continue;
            }
        };
        let acceptor = acceptor.clone();
        let cmd_tx = cmd_tx.clone();

        // Spawn handler task for each connection
        tokio::spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(tls_stream) => tls_stream,
                Err(e) => {
                    warn!("TLS handshake failed for {}: {}", peer_addr, e);
                    return;
                }
            };
            if let Err(e) =
                handle_connection(tls_stream, peer_addr.to_string(), cmd_tx, options).await
            {
                error!("Connection handler error for {}: {}", peer_addr, e);
            }
        });
    }
}
