//! Multi-room TLS Line Chat Server Library
//!
//! A line-oriented chat server: clients connect over TLS, claim a unique
//! username and talk in named rooms. The creator of a room owns it and
//! approves newcomers, can kick, ban and set the topic. Files are shared
//! inline as one base64 line.
//!
//! # Features
//! - Username reservation
//! - Rooms with owner approval, bans, kick and topic
//! - Owner promotion when the owner leaves
//! - Inline file sharing (`::FILE_START::name::b64::FILE_END::`)
//! - Disconnection handling
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor managing all state
//! - Each connection has a `handler` task pair communicating with the server
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use tls_room_chat::{handle_connection, tls, ChatServer, ConnectionOptions, FileStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let acceptor = tls::acceptor("cert.pem".as_ref(), "key.pem".as_ref())?;
//!     let listener = TcpListener::bind("127.0.0.1:2323").await?;
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!
//!     tokio::spawn(ChatServer::new(cmd_rx, FileStore::open("uploads").await?).run());
//!
//!     while let Ok((stream, peer)) = listener.accept().await {
//!         let stream = acceptor.accept(stream).await?;
//!         let options = ConnectionOptions::default();
//!         tokio::spawn(handle_connection(stream, peer.to_string(), cmd_tx.clone(), options));
//!     }
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod files;
pub mod handler;
pub mod message;
pub mod room;
pub mod server;
pub mod session;
pub mod tls;
pub mod transfer;
pub mod types;
pub mod writer;

// Re-export main types for convenience
pub use config::ServerConfig;
pub use error::{AppError, SendError};
pub use files::FileStore;
pub use handler::{handle_connection, ConnectionOptions};
pub use message::{ErrorCode, ServerMessage};
pub use room::Room;
pub use server::{ChatServer, ServerCommand};
pub use session::Session;
pub use types::{ClientId, RoomName};
