//! Session struct definition
//!
//! Represents one live connection with its chat state and outbound queue.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::{ClientId, RoomName};

/// Connected session
///
/// Holds all state related to a connection: its unique ID, the claimed
/// username, the room it belongs to (or is waiting to enter), and the
/// sender half of its bounded outbound queue.
#[derive(Debug)]
pub struct Session {
    /// Unique identifier for this connection
    pub id: ClientId,
    /// Username (None until a unique name is claimed)
    pub username: Option<String>,
    /// Room this session is a member of
    pub room: Option<RoomName>,
    /// Room this session has an outstanding join request for
    pub pending: Option<RoomName>,
    /// Server → Client line queue
    sender: mpsc::Sender<ServerMessage>,
}

impl Session {
    /// Create a new session with the given ID and sender channel
    pub fn new(id: ClientId, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            username: None,
            room: None,
            pending: None,
            sender,
        }
    }

    /// Queue a line for this session without waiting
    ///
    /// A full queue means the peer is not draining its connection; the line
    /// is dropped for this peer only.
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SendError::QueueFull,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// Clone of the outbound sender, for tasks that may wait for capacity
    pub fn sender(&self) -> mpsc::Sender<ServerMessage> {
        self.sender.clone()
    }

    /// Get the display name for this session
    ///
    /// Returns the username if set, otherwise "Unknown".
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("Unknown")
    }

    /// Check if this session has claimed a username
    pub fn has_username(&self) -> bool {
        self.username.is_some()
    }

    /// Set the session's username
    pub fn set_username(&mut self, username: String) {
        self.username = Some(username);
    }
}
