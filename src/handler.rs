//! Connection handler
//!
//! Handles individual client connections: line framing, forwarding input to
//! the ChatServer and writing rendered lines back. Generic over the stream
//! so production runs it over TLS and tests over an in-memory pipe.

use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::message::ServerMessage;
use crate::server::ServerCommand;
use crate::types::ClientId;

/// Per-connection limits
#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions {
    /// Outbound queue length, in lines
    pub outbound_queue: usize,
    /// Longest accepted inbound line, in bytes
    pub max_line_length: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for ConnectionOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            outbound_queue: config.outbound_queue,
            max_line_length: config.max_line_length,
        }
    }
}

/// One inbound frame
#[derive(Debug, PartialEq, Eq)]
enum Inbound {
    Line(String),
    /// A line over the length limit; its bytes are discarded
    Overlong,
}

/// `LinesCodec` that reports over-long lines as a frame instead of an error
///
/// `FramedRead` ends the stream after a decoder error; the inner codec keeps
/// discarding up to the next newline and then resumes normally.
struct InboundCodec {
    lines: LinesCodec,
}

impl InboundCodec {
    fn new(max_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_length),
        }
    }

    fn map(result: Result<Option<String>, LinesCodecError>) -> Result<Option<Inbound>, LinesCodecError> {
        match result {
            Ok(line) => Ok(line.map(Inbound::Line)),
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(Inbound::Overlong)),
            Err(e) => Err(e),
        }
    }
}

impl Decoder for InboundCodec {
    type Item = Inbound;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Inbound>, LinesCodecError> {
        Self::map(self.lines.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Inbound>, LinesCodecError> {
        Self::map(self.lines.decode_eof(buf))
    }
}

/// Handle one accepted connection until either side closes it
///
/// Registers a session with the ChatServer, runs a read task
/// (lines → `ServerCommand::Line`) and a write task (queued
/// `ServerMessage`s → rendered lines), and posts exactly one `Disconnect`
/// once either task stops.
pub async fn handle_connection<S>(
    stream: S,
    peer: String,
    cmd_tx: mpsc::Sender<ServerCommand>,
    options: ConnectionOptions,
) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let client_id = ClientId::new();
    info!("Client {} connected from {}", client_id, peer);

    let (reader, writer) = tokio::io::split(stream);
    let mut lines_in = FramedRead::new(reader, InboundCodec::new(options.max_line_length));
    let mut lines_out = FramedWrite::new(writer, LinesCodec::new());

    // Create channel for server -> client lines
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(options.outbound_queue);

    // Register with ChatServer
    if cmd_tx
        .send(ServerCommand::Connect {
            client_id,
            sender: msg_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to register client {} - server closed", client_id);
        return Err(AppError::ChannelSend);
    }

    // Spawn read task (lines -> ServerCommand)
    let cmd_tx_read = cmd_tx.clone();
    let mut read_task = tokio::spawn(async move {
        while let Some(frame) = lines_in.next().await {
            match frame {
                Ok(Inbound::Line(line)) => {
                    let cmd = ServerCommand::Line { client_id, line };
                    if cmd_tx_read.send(cmd).await.is_err() {
                        debug!("Server closed, ending read task for {}", client_id);
                        break;
                    }
                }
                Ok(Inbound::Overlong) => {
                    warn!(
                        "Discarding line over {} bytes from {}",
                        options.max_line_length, client_id
                    );
                }
                Err(e) => {
                    debug!("Read error for {}: {}", client_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", client_id);
    });

    // Spawn write task (ServerMessage -> lines)
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            let last = msg == ServerMessage::Goodbye;
            if let Err(e) = lines_out.send(msg.render()).await {
                debug!("Write failed for {}: {}", client_id, e);
                break;
            }
            if last {
                break;
            }
        }
        debug!("Write task ended for {}", client_id);

        // Flush and shut down the write side when done
        let _ = SinkExt::<String>::close(&mut lines_out).await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut read_task => {
            debug!("Read task completed for {}", client_id);
        }
        _ = &mut write_task => {
            debug!("Write task completed for {}", client_id);
        }
    }
    read_task.abort();
    write_task.abort();

    // Send disconnect command
    let _ = cmd_tx.send(ServerCommand::Disconnect { client_id }).await;

    info!("Client {} from {} disconnected", client_id, peer);

    Ok(())
}
