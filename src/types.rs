//! Basic type definitions for the chat server
//!
//! Provides newtype wrappers for type safety:
//! - `ClientId`: UUID-based unique connection identifier
//! - `RoomName`: validated room name, safe to embed in staged file names

use uuid::Uuid;

use crate::error::AppError;

/// Longest accepted room name, in characters
pub const MAX_ROOM_NAME_LEN: usize = 64;

/// Unique client identifier (newtype pattern)
///
/// Wraps a UUID v4 for type-safe connection identification.
/// Implements Hash and Eq for use as HashMap keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Create a new random client ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room name as typed by users
///
/// Room names are case-sensitive and may contain spaces, but never path
/// separators or control characters: the name is the prefix of every file
/// staged for the room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomName(String);

impl RoomName {
    /// Validate and wrap a room name (surrounding whitespace is trimmed)
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let name = raw.trim();
        let valid = !name.is_empty()
            && name.chars().count() <= MAX_ROOM_NAME_LEN
            && name != "."
            && name != ".."
            && !name
                .chars()
                .any(|c| c == '/' || c == '\\' || c.is_control());

        if valid {
            Ok(Self(name.to_string()))
        } else {
            Err(AppError::InvalidRoomName(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
