//! Client → Server input parsing
//!
//! Every line after the username is either plain chat text or a command:
//! the marker, a case-insensitive command word, and one trailing argument
//! string that is never split further (so a topic may contain spaces).

/// Prefix that turns a line into a command
pub const COMMAND_MARKER: char = '/';

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Join(String),
    List,
    Names,
    Topic(String),
    Kick(String),
    Ban(String),
    Unban(String),
    Bans,
    Share(String),
    Get(String),
    Files,
    Part,
    Accept(String),
    Decline(String),
    AcceptAll,
    DeclineAll,
    Quit,
    /// Command word not in the table, as typed
    Unknown(String),
}

/// One line of input from an authenticated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Plain text for the current room
    Chat(String),
    Command(Command),
}

impl Input {
    /// Classify a trimmed, non-empty line
    pub fn parse(line: &str) -> Self {
        match line.strip_prefix(COMMAND_MARKER) {
            Some(rest) => Input::Command(Command::parse(rest)),
            None => Input::Chat(line.to_string()),
        }
    }
}

impl Command {
    /// Parse the text after the marker
    pub fn parse(text: &str) -> Self {
        let (word, arg) = match text.split_once(' ') {
            Some((word, arg)) => (word, arg.trim().to_string()),
            None => (text, String::new()),
        };

        match word.to_lowercase().as_str() {
            "help" => Command::Help,
            "join" | "j" => Command::Join(arg),
            "list" => Command::List,
            "names" | "who" => Command::Names,
            "topic" => Command::Topic(arg),
            "kick" => Command::Kick(arg),
            "ban" => Command::Ban(arg),
            "unban" => Command::Unban(arg),
            "bans" => Command::Bans,
            "share" => Command::Share(arg),
            "get" | "download" => Command::Get(arg),
            "files" => Command::Files,
            "part" | "leave" => Command::Part,
            "accept" => Command::Accept(arg),
            "decline" => Command::Decline(arg),
            "acceptall" => Command::AcceptAll,
            "declineall" => Command::DeclineAll,
            "quit" | "exit" => Command::Quit,
            _ => Command::Unknown(word.to_string()),
        }
    }
}
