//! Error types for the chat server
//!
//! Defines application-level errors and message send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

use crate::message::ErrorCode;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// business errors (reported to the invoking session, never fatal).
/// The `Display` text of business errors is what the user sees.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal for the connection)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error (fatal for the connection)
    #[error("Line framing error: {0}")]
    Lines(#[from] LinesCodecError),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Command word not in the command table
    #[error("Unknown: /{0}")]
    UnknownCommand(String),

    /// Required argument missing
    #[error("Usage: {0}")]
    Usage(&'static str),

    /// Username cannot be used
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    /// Room name cannot be used
    #[error("Invalid room name: {0}")]
    InvalidRoomName(String),

    /// File name clashes with the payload framing
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    /// Non-owner invoked an owner-only command
    #[error("Owner only")]
    OwnerOnly,

    /// Username is reserved by another live session
    #[error("Username taken!")]
    UsernameTaken,

    /// Join attempted while already a member of a room
    #[error("Leave current room first (/part)")]
    AlreadyInRoom,

    /// Join attempted while a request is outstanding
    #[error("Still waiting for approval in #{0} (/part to cancel)")]
    AwaitingApproval(String),

    /// Room-scoped command used outside a room
    #[error("Not in room")]
    NotInRoom,

    /// Chat text sent outside a room
    #[error("Join a room first. (/join <room>)")]
    JoinFirst,

    /// Name is on the room's ban list
    #[error("You are banned from this room!")]
    Banned,

    /// No pending request for the given name
    #[error("User not found in pending list.")]
    NotPending(String),

    /// Bulk accept/decline with nobody waiting
    #[error("No users are pending.")]
    NoPending,

    /// Target is not a member of the room
    #[error("User not found")]
    UserNotFound(String),

    /// Owner targeted themselves with kick/ban
    #[error("You cannot do that to yourself")]
    SelfTarget,

    /// Ban for a name already banned
    #[error("Already banned")]
    AlreadyBanned(String),

    /// Unban for a name not banned
    #[error("Not banned")]
    NotBanned(String),

    /// Requested file not in the room's index
    #[error("Not found")]
    FileNotFound(String),

    /// Share source path does not exist
    #[error("File not found")]
    LocalFileMissing(String),

    /// Indexed file missing from the staging directory
    #[error("File gone")]
    FileGone(String),

    /// File store read/write failure
    #[error("Error: {0}")]
    Storage(String),
}

impl AppError {
    /// Category reported to the client for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::UnknownCommand(_)
            | AppError::Usage(_)
            | AppError::InvalidUsername(_)
            | AppError::InvalidRoomName(_)
            | AppError::InvalidFileName(_) => ErrorCode::Protocol,
            AppError::OwnerOnly => ErrorCode::Authorization,
            AppError::UsernameTaken
            | AppError::AlreadyInRoom
            | AppError::AwaitingApproval(_)
            | AppError::NotInRoom
            | AppError::JoinFirst
            | AppError::Banned
            | AppError::NotPending(_)
            | AppError::NoPending
            | AppError::UserNotFound(_)
            | AppError::SelfTarget
            | AppError::AlreadyBanned(_)
            | AppError::NotBanned(_)
            | AppError::FileNotFound(_) => ErrorCode::State,
            AppError::LocalFileMissing(_) | AppError::FileGone(_) | AppError::Storage(_) => {
                ErrorCode::Resource
            }
            AppError::Io(_) | AppError::Lines(_) | AppError::ChannelSend => ErrorCode::Transport,
        }
    }
}

/// Message send errors
///
/// Occurs when a line cannot be queued for a session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The session's outbound queue is full
    #[error("Outbound queue full")]
    QueueFull,
}
