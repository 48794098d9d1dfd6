//! Message protocol definitions
//!
//! Line-oriented server → client protocol. Every line the server emits is a
//! `ServerMessage`; `render` turns it into the ANSI-styled text written to
//! the wire (the framing layer appends the `\n`).

use chrono::Local;

use crate::error::AppError;
use crate::transfer;

/// ANSI escape sequences used by the renderer
pub mod style {
    pub const RESET: &str = "\x1b[0m";
    pub const BRIGHT: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const RED: &str = "\x1b[31m";
    pub const MAGENTA: &str = "\x1b[35m";
    pub const GRAY: &str = "\x1b[90m";
}

/// Prompt sent until a unique username has been claimed
pub const USERNAME_PROMPT: &str = "Username: ";

/// Color family of a `[SERVER]` status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Warning,
    Alert,
    Info,
    Topic,
    Hint,
}

impl Tone {
    fn color(self) -> &'static str {
        match self {
            Tone::Success => style::GREEN,
            Tone::Warning => style::YELLOW,
            Tone::Alert => style::RED,
            Tone::Info => style::CYAN,
            Tone::Topic => style::MAGENTA,
            Tone::Hint => style::DIM,
        }
    }
}

/// Error categories reported to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Unrecognized command or missing argument
    Protocol,
    /// Owner-only command from a non-owner
    Authorization,
    /// Command not valid in the current session/room state
    State,
    /// File system failure or missing staged file
    Resource,
    /// Connection-level failure, never shown to the peer
    Transport,
}

/// Server → Client line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// `Username: ` prompt
    Prompt,
    /// `[SERVER] ...` status line
    Status { tone: Tone, text: String },
    /// Bold `[SERVER] ...` heading preceded by an empty line
    Heading(String),
    /// Indented list entry under a heading
    Entry(String),
    /// Empty line closing a list
    Blank,
    /// Chat text relayed from a room member
    Chat {
        time: String,
        room: String,
        from: String,
        content: String,
    },
    /// Room-wide system notice (`*** ...`)
    Notice {
        time: String,
        room: String,
        text: String,
    },
    /// Inline file payload; `payload` is the base64 body
    File { filename: String, payload: String },
    /// Error reported to the invoking session
    Error { code: ErrorCode, message: String },
    /// Final line before the server closes the connection
    Goodbye,
}

impl ServerMessage {
    pub fn status(tone: Tone, text: impl Into<String>) -> Self {
        ServerMessage::Status {
            tone,
            text: text.into(),
        }
    }

    /// Chat line stamped with the current local time
    pub fn chat(room: &str, from: &str, content: &str) -> Self {
        ServerMessage::Chat {
            time: timestamp(),
            room: room.to_string(),
            from: from.to_string(),
            content: content.to_string(),
        }
    }

    /// Notice line stamped with the current local time
    pub fn notice(room: &str, text: impl Into<String>) -> Self {
        ServerMessage::Notice {
            time: timestamp(),
            room: room.to_string(),
            text: text.into(),
        }
    }

    /// Render the line as written to the wire, without the line break
    pub fn render(&self) -> String {
        use style::*;

        match self {
            ServerMessage::Prompt => USERNAME_PROMPT.to_string(),
            ServerMessage::Status { tone, text } => {
                format!("{}[SERVER] {}{}", tone.color(), text, RESET)
            }
            ServerMessage::Heading(text) => format!("\n{BRIGHT}[SERVER] {text}{RESET}"),
            ServerMessage::Entry(text) => format!("  {text}"),
            ServerMessage::Blank => String::new(),
            ServerMessage::Chat {
                time,
                room,
                from,
                content,
            } => format!(
                "{GRAY}[{time}]{RESET} {GRAY}[#{room}]{RESET} {}<{from}>{RESET} {content}",
                user_color(from)
            ),
            ServerMessage::Notice { time, room, text } => {
                format!("{GRAY}[{time}]{RESET} {GRAY}[#{room}]{RESET} {YELLOW}*** {text}{RESET}")
            }
            ServerMessage::File { filename, payload } => transfer::frame(filename, payload),
            ServerMessage::Error { message, .. } => format!("{RED}[SERVER] {message}{RESET}"),
            ServerMessage::Goodbye => "Bye!".to_string(),
        }
    }
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let code = err.code();
        let message = match code {
            // Fatal errors are not typically converted (connection closes)
            ErrorCode::Transport => "Internal error".to_string(),
            _ => err.to_string(),
        };
        ServerMessage::Error { code, message }
    }
}

/// Current local time as `HH:MM:SS`
pub fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Stable display color for a username
///
/// One of the six bright ANSI foreground colors (91..=96), picked by a
/// 31-multiplier hash over the UTF-16 code units of the name.
pub fn user_color(username: &str) -> String {
    let hash = username
        .encode_utf16()
        .fold(0i32, |hash, unit| {
            i32::from(unit).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash))
        });
    let index = hash.unsigned_abs() % 6;
    format!("\x1b[{}m", 91 + index)
}
