//! ChatServer Actor implementation
//!
//! The central actor that owns all shared state: sessions, reserved
//! usernames and rooms. Connection handlers send it `ServerCommand`s over an
//! mpsc channel; every command is handled to completion before the next, so
//! cross-entity invariants (ban vs. pending vs. member) need no locks.
//!
//! File I/O runs in spawned tasks. A `/share` reads and stages the file off
//! the actor and posts a `Completion`, which the actor commits to the room's
//! index or rolls back. A `/get` read sends the payload straight to the
//! requester's queue.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::ErrorKind;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::command::{Command, Input, COMMAND_MARKER};
use crate::error::AppError;
use crate::files::{FileStore, StagedFile};
use crate::message::{ServerMessage, Tone};
use crate::room::{format_kb, Admission, Member, Room, SharedFile};
use crate::session::Session;
use crate::transfer;
use crate::types::{ClientId, RoomName};
use crate::writer::{broadcast, unicast};

/// Commands sent from handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New client connected
    Connect {
        client_id: ClientId,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// Client disconnected (clean close, transport error or `/quit`)
    Disconnect { client_id: ClientId },
    /// One line of input, untrimmed
    Line { client_id: ClientId, line: String },
}

/// Results of file work done off the actor
#[derive(Debug)]
enum Completion {
    ShareStaged {
        client_id: ClientId,
        room: RoomName,
        /// Creation time of the room the share was started in
        room_created: Instant,
        result: Result<StagedFile, AppError>,
    },
}

/// Why a member leaves a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Departure {
    Part,
    Kicked,
    Banned,
    Disconnected,
}

/// The main ChatServer actor
pub struct ChatServer {
    /// All connected sessions: ClientId -> Session
    sessions: HashMap<ClientId, Session>,
    /// Reserved usernames: name -> owning session
    usernames: HashMap<String, ClientId>,
    /// All active rooms, ordered by name for `/list`
    rooms: BTreeMap<RoomName, Room>,
    /// Staging area for shared files
    store: FileStore,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver and file store
    pub fn new(receiver: mpsc::Receiver<ServerCommand>, store: FileStore) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            sessions: HashMap::new(),
            usernames: HashMap::new(),
            rooms: BTreeMap::new(),
            store,
            receiver,
            completion_tx,
            completion_rx,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                Some(done) = self.completion_rx.recv() => {
                    self.handle_completion(done);
                }
            }
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect { client_id, sender } => {
                self.handle_connect(client_id, sender);
            }
            ServerCommand::Disconnect { client_id } => {
                self.handle_disconnect(client_id);
            }
            ServerCommand::Line { client_id, line } => {
                self.handle_line(client_id, &line);
            }
        }
    }

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::ShareStaged {
                client_id,
                room,
                room_created,
                result,
            } => self.finish_share(client_id, room, room_created, result),
        }
    }

    /// Handle new client connection
    fn handle_connect(&mut self, client_id: ClientId, sender: mpsc::Sender<ServerMessage>) {
        info!("Client {} connected", client_id);
        self.sessions
            .insert(client_id, Session::new(client_id, sender));
        self.reply(client_id, ServerMessage::Prompt);
        debug!(
            "Total sessions: {}, Total rooms: {}",
            self.sessions.len(),
            self.rooms.len()
        );
    }

    /// Handle client disconnection
    ///
    /// Unknown ids are ignored, so cleanup runs at most once per session.
    fn handle_disconnect(&mut self, client_id: ClientId) {
        let Some(session) = self.sessions.get_mut(&client_id) else {
            return;
        };

        if let Some(waiting) = session.pending.take() {
            if let Some(room) = self.rooms.get_mut(&waiting) {
                room.cancel_request(client_id);
            }
        }

        self.leave_room(client_id, Departure::Disconnected);

        if let Some(session) = self.sessions.remove(&client_id) {
            if let Some(name) = session.username {
                self.usernames.remove(&name);
                info!("Released username '{}'", name);
            }
        }

        info!("Client {} disconnected", client_id);
        debug!(
            "Total sessions: {}, Total rooms: {}",
            self.sessions.len(),
            self.rooms.len()
        );
    }

    /// Handle one input line
    fn handle_line(&mut self, client_id: ClientId, line: &str) {
        let line = line.trim();
        let Some(session) = self.sessions.get(&client_id) else {
            return;
        };

        if !session.has_username() {
            if line.is_empty() {
                self.reply(client_id, ServerMessage::Prompt);
            } else {
                self.handle_register(client_id, line);
            }
            return;
        }

        if line.is_empty() {
            return;
        }

        let result = match Input::parse(line) {
            Input::Chat(text) => self.handle_chat(client_id, &text),
            Input::Command(cmd) => self.dispatch(client_id, cmd),
        };

        if let Err(err) = result {
            debug!("Client {}: {}", client_id, err);
            self.reply(client_id, err.into());
        }
    }

    /// Handle a username claim
    fn handle_register(&mut self, client_id: ClientId, name: &str) {
        let rejection = if name.starts_with(COMMAND_MARKER) {
            Some(AppError::InvalidUsername(name.to_string()))
        } else if self.usernames.contains_key(name) {
            Some(AppError::UsernameTaken)
        } else {
            None
        };

        if let Some(err) = rejection {
            self.reply(client_id, err.into());
            self.reply(client_id, ServerMessage::Prompt);
            return;
        }

        let Some(session) = self.sessions.get_mut(&client_id) else {
            return;
        };
        session.set_username(name.to_string());
        self.usernames.insert(name.to_string(), client_id);
        info!("Client {} registered as '{}'", client_id, name);

        self.reply(
            client_id,
            ServerMessage::status(Tone::Success, format!("Welcome, {name}!")),
        );
        self.reply(
            client_id,
            ServerMessage::status(Tone::Hint, "Type /help for commands"),
        );
    }

    /// Route a command to its handler
    fn dispatch(&mut self, client_id: ClientId, cmd: Command) -> Result<(), AppError> {
        match cmd {
            Command::Help => self.handle_help(client_id),
            Command::Join(room) => self.handle_join(client_id, &room),
            Command::List => self.handle_list(client_id),
            Command::Names => self.handle_names(client_id),
            Command::Topic(topic) => self.handle_topic(client_id, topic),
            Command::Kick(target) => self.handle_kick(client_id, &target),
            Command::Ban(target) => self.handle_ban(client_id, &target),
            Command::Unban(target) => self.handle_unban(client_id, &target),
            Command::Bans => self.handle_bans(client_id),
            Command::Share(path) => self.handle_share(client_id, path),
            Command::Get(filename) => self.handle_get(client_id, filename),
            Command::Files => self.handle_files(client_id),
            Command::Part => self.handle_part(client_id),
            Command::Accept(target) => self.handle_accept(client_id, &target),
            Command::Decline(target) => self.handle_decline(client_id, &target),
            Command::AcceptAll => self.handle_accept_all(client_id),
            Command::DeclineAll => self.handle_decline_all(client_id),
            Command::Quit => {
                self.say_goodbye(client_id);
                Ok(())
            }
            Command::Unknown(word) => Err(AppError::UnknownCommand(word)),
        }
    }

    /// Handle plain chat text
    fn handle_chat(&mut self, client_id: ClientId, text: &str) -> Result<(), AppError> {
        let room_name = self
            .current_room(client_id)
            .map_err(|_| AppError::JoinFirst)?;
        let from = self.username(client_id);

        if let Some(room) = self.rooms.get(&room_name) {
            let msg = ServerMessage::chat(room_name.as_str(), &from, text);
            broadcast(&self.sessions, room, &msg, Some(client_id));
        }
        Ok(())
    }

    fn handle_help(&mut self, client_id: ClientId) -> Result<(), AppError> {
        let room_name = self.current_room(client_id).ok();
        let is_owner = room_name
            .as_ref()
            .and_then(|r| self.rooms.get(r))
            .is_some_and(|room| room.is_owner(client_id));

        let mut entries: Vec<&str> = Vec::new();
        if room_name.is_none() {
            entries.extend([
                "/join <room>   Join/create room",
                "/list          List rooms",
            ]);
        } else {
            if is_owner {
                entries.extend([
                    "/topic <txt>   Set topic (owner)",
                    "/kick <user>   Kick user (owner)",
                    "/ban <user>    Ban user (owner)",
                    "/unban <user>  Unban (owner)",
                    "/bans          List bans (owner)",
                    "/accept <u>    Accept user (owner)",
                    "/decline <u>   Decline user (owner)",
                    "/acceptall     Accept all (owner)",
                    "/declineall    Decline all (owner)",
                ]);
            }
            entries.extend([
                "/names         List users",
                "/share <file>  Share file",
                "/get <file>    Download file",
                "/files         List files",
                "/part          Leave room",
            ]);
        }
        entries.extend(["/help          This help", "/quit          Exit"]);

        self.reply(client_id, ServerMessage::Heading("Commands:".to_string()));
        for entry in entries {
            self.reply(client_id, ServerMessage::Entry(entry.to_string()));
        }
        self.reply(client_id, ServerMessage::Blank);
        Ok(())
    }

    /// Handle a join attempt: create, rejoin directly, or request approval
    fn handle_join(&mut self, client_id: ClientId, arg: &str) -> Result<(), AppError> {
        if arg.is_empty() {
            return Err(AppError::Usage("/join <room>"));
        }

        let Some(session) = self.sessions.get(&client_id) else {
            return Ok(());
        };
        if session.room.is_some() {
            return Err(AppError::AlreadyInRoom);
        }
        if let Some(waiting) = &session.pending {
            return Err(AppError::AwaitingApproval(waiting.to_string()));
        }

        let room_name = RoomName::parse(arg)?;
        let member = Member::new(client_id, session.display_name());
        let name = member.name.clone();

        let Some(room) = self.rooms.get_mut(&room_name) else {
            self.create_room(room_name, member);
            return Ok(());
        };

        match room.admission(&name) {
            Admission::Banned => Err(AppError::Banned),
            Admission::Approved => {
                room.admit(member);
                self.set_room(client_id, &room_name);
                info!("Client {} rejoined room {}", client_id, room_name);

                self.reply(
                    client_id,
                    ServerMessage::status(
                        Tone::Success,
                        format!("Welcome back! Re-joined #{room_name}"),
                    ),
                );
                self.send_room_summary(client_id, &room_name);
                self.notify_room(&room_name, format!("{name} joined"), Some(client_id));
                Ok(())
            }
            Admission::NeedsApproval => {
                let owner = room.owner;
                room.request(member);
                if let Some(session) = self.sessions.get_mut(&client_id) {
                    session.pending = Some(room_name.clone());
                }
                info!("Client {} requested to join room {}", client_id, room_name);

                self.reply(
                    client_id,
                    ServerMessage::status(
                        Tone::Warning,
                        "Waiting for owner to accept your request...",
                    ),
                );
                self.reply(
                    owner,
                    ServerMessage::status(Tone::Info, format!("{name} wants to join.")),
                );
                self.reply(
                    owner,
                    ServerMessage::status(
                        Tone::Info,
                        format!("Type /accept {name} or /decline {name}"),
                    ),
                );
                Ok(())
            }
        }
    }

    fn create_room(&mut self, room_name: RoomName, owner: Member) {
        let client_id = owner.id;
        self.rooms
            .insert(room_name.clone(), Room::new(room_name.clone(), owner));
        self.set_room(client_id, &room_name);
        info!("Client {} created room {}", client_id, room_name);

        self.reply(
            client_id,
            ServerMessage::status(Tone::Success, format!("Created #{room_name}")),
        );
        self.reply(
            client_id,
            ServerMessage::status(Tone::Success, "You are the owner"),
        );
    }

    fn handle_accept(&mut self, client_id: ClientId, target: &str) -> Result<(), AppError> {
        if target.is_empty() {
            return Err(AppError::Usage("/accept <user>"));
        }
        let room_name = self.owned_room(client_id)?;
        let room = self
            .rooms
            .get_mut(&room_name)
            .ok_or(AppError::NotInRoom)?;
        let requester = room
            .take_pending(target)
            .ok_or_else(|| AppError::NotPending(target.to_string()))?;

        self.admit_pending(&room_name, requester);
        Ok(())
    }

    fn handle_accept_all(&mut self, client_id: ClientId) -> Result<(), AppError> {
        let room_name = self.owned_room(client_id)?;
        let room = self
            .rooms
            .get_mut(&room_name)
            .ok_or(AppError::NotInRoom)?;
        if room.pending().is_empty() {
            return Err(AppError::NoPending);
        }
        let waiting = room.take_all_pending();

        self.reply(
            client_id,
            ServerMessage::status(Tone::Success, "Accepting all pending users..."),
        );
        for requester in waiting {
            self.admit_pending(&room_name, requester);
        }
        Ok(())
    }

    /// Move an accepted requester into the room
    ///
    /// The requester's own join notice reaches them too.
    fn admit_pending(&mut self, room_name: &RoomName, requester: Member) {
        let still_waiting = self
            .sessions
            .get(&requester.id)
            .is_some_and(|s| s.room.is_none() && s.pending.as_ref() == Some(room_name));
        if !still_waiting {
            debug!("Dropping stale request of {} for {}", requester.id, room_name);
            return;
        }
        let Some(room) = self.rooms.get_mut(room_name) else {
            return;
        };

        let (id, name) = (requester.id, requester.name.clone());
        room.admit(requester);
        if let Some(session) = self.sessions.get_mut(&id) {
            session.pending = None;
        }
        self.set_room(id, room_name);
        info!("Client {} accepted into room {}", id, room_name);

        self.reply(
            id,
            ServerMessage::status(
                Tone::Success,
                format!("Owner accepted your request. Joined #{room_name}"),
            ),
        );
        self.send_room_summary(id, room_name);
        self.notify_room(room_name, format!("{name} joined"), None);
    }

    fn handle_decline(&mut self, client_id: ClientId, target: &str) -> Result<(), AppError> {
        if target.is_empty() {
            return Err(AppError::Usage("/decline <user>"));
        }
        let room_name = self.owned_room(client_id)?;
        let room = self
            .rooms
            .get_mut(&room_name)
            .ok_or(AppError::NotInRoom)?;
        let requester = room
            .take_pending(target)
            .ok_or_else(|| AppError::NotPending(target.to_string()))?;

        let owner_name = self.username(client_id);
        self.drop_request(
            &room_name,
            requester,
            format!("Owner ({owner_name}) declined your request."),
        );
        self.reply(
            client_id,
            ServerMessage::status(Tone::Warning, format!("You declined {target}.")),
        );
        Ok(())
    }

    fn handle_decline_all(&mut self, client_id: ClientId) -> Result<(), AppError> {
        let room_name = self.owned_room(client_id)?;
        let room = self
            .rooms
            .get_mut(&room_name)
            .ok_or(AppError::NotInRoom)?;
        if room.pending().is_empty() {
            return Err(AppError::NoPending);
        }
        let waiting = room.take_all_pending();

        let owner_name = self.username(client_id);
        self.reply(
            client_id,
            ServerMessage::status(Tone::Alert, "Declining all pending users..."),
        );
        for requester in waiting {
            self.drop_request(
                &room_name,
                requester,
                format!("Owner ({owner_name}) declined your request."),
            );
        }
        Ok(())
    }

    /// Tell a requester (already removed from `pending`) why their request ended
    fn drop_request(&mut self, room_name: &RoomName, requester: Member, reason: String) {
        if let Some(session) = self.sessions.get_mut(&requester.id) {
            if session.pending.as_ref() == Some(room_name) {
                session.pending = None;
            }
        }
        self.reply(requester.id, ServerMessage::status(Tone::Alert, reason));
    }

    fn handle_part(&mut self, client_id: ClientId) -> Result<(), AppError> {
        let Some(session) = self.sessions.get_mut(&client_id) else {
            return Ok(());
        };

        if let Some(waiting) = session.pending.take() {
            if let Some(room) = self.rooms.get_mut(&waiting) {
                room.cancel_request(client_id);
            }
            self.reply(
                client_id,
                ServerMessage::status(
                    Tone::Warning,
                    format!("Cancelled join request for #{waiting}"),
                ),
            );
            return Ok(());
        }

        if session.room.is_none() {
            return Err(AppError::NotInRoom);
        }

        self.leave_room(client_id, Departure::Part);
        self.reply(client_id, ServerMessage::status(Tone::Warning, "Left room"));
        Ok(())
    }

    /// Remove a session from its room
    ///
    /// Only an explicit `/part` announces "left"; kick and ban send their own
    /// notice and disconnects are silent. Deletes the room when it empties.
    fn leave_room(&mut self, client_id: ClientId, departure: Departure) {
        let Some(session) = self.sessions.get_mut(&client_id) else {
            return;
        };
        let Some(room_name) = session.room.take() else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&room_name) else {
            return;
        };
        let Some(removal) = room.remove_member(client_id) else {
            return;
        };
        info!(
            "Client {} left room {} ({:?})",
            client_id, room_name, departure
        );

        if room.is_empty() {
            self.delete_room(&room_name);
            return;
        }

        if departure == Departure::Part {
            self.notify_room(
                &room_name,
                format!("{} left", removal.member.name),
                Some(client_id),
            );
        }

        if let Some(owner) = removal.promoted {
            self.announce_new_owner(&room_name, owner);
        }
    }

    fn announce_new_owner(&mut self, room_name: &RoomName, owner: Member) {
        info!("Client {} is now owner of room {}", owner.id, room_name);

        self.reply(
            owner.id,
            ServerMessage::status(
                Tone::Success,
                format!("You are now the owner of #{room_name}"),
            ),
        );

        let waiting = self
            .rooms
            .get(room_name)
            .map(|room| {
                room.pending()
                    .iter()
                    .map(|m| m.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        if !waiting.is_empty() {
            self.reply(
                owner.id,
                ServerMessage::status(Tone::Info, format!("Waiting to join: {waiting}")),
            );
            self.reply(
                owner.id,
                ServerMessage::status(Tone::Info, "Type /accept <user> or /decline <user>"),
            );
        }

        self.notify_room(room_name, format!("{} is now the owner", owner.name), None);
    }

    /// Remove an empty room with its requests and staged files
    fn delete_room(&mut self, room_name: &RoomName) {
        let Some(mut room) = self.rooms.remove(room_name) else {
            return;
        };
        info!(
            "Room {} deleted (empty) after {:?}",
            room_name,
            room.created_at.elapsed()
        );

        for requester in room.take_all_pending() {
            self.drop_request(
                room_name,
                requester,
                format!("#{room_name} was closed; your request was dropped."),
            );
        }

        let filenames: Vec<String> = room.files().iter().map(|f| f.filename.clone()).collect();
        if !filenames.is_empty() {
            let store = self.store.clone();
            let room_name = room_name.clone();
            tokio::spawn(async move {
                store
                    .purge(&room_name, filenames.iter().map(String::as_str))
                    .await;
            });
        }
    }

    fn handle_kick(&mut self, client_id: ClientId, target: &str) -> Result<(), AppError> {
        if target.is_empty() {
            return Err(AppError::Usage("/kick <user>"));
        }
        let room_name = self.owned_room(client_id)?;
        let victim = self
            .rooms
            .get(&room_name)
            .and_then(|room| room.find_member(target))
            .map(|m| m.id)
            .ok_or_else(|| AppError::UserNotFound(target.to_string()))?;
        if victim == client_id {
            return Err(AppError::SelfTarget);
        }

        let owner_name = self.username(client_id);
        info!("{} kicked {} from room {}", owner_name, target, room_name);

        self.reply(
            victim,
            ServerMessage::status(Tone::Alert, format!("Kicked by {owner_name}")),
        );
        self.leave_room(victim, Departure::Kicked);
        self.notify_room(&room_name, format!("{target} was kicked"), None);
        Ok(())
    }

    /// Ban a name; works whether or not anyone by that name is present
    fn handle_ban(&mut self, client_id: ClientId, target: &str) -> Result<(), AppError> {
        if target.is_empty() {
            return Err(AppError::Usage("/ban <user>"));
        }
        let room_name = self.owned_room(client_id)?;
        let owner_name = self.username(client_id);
        if target == owner_name {
            return Err(AppError::SelfTarget);
        }

        let room = self
            .rooms
            .get_mut(&room_name)
            .ok_or(AppError::NotInRoom)?;
        if !room.ban(target) {
            return Err(AppError::AlreadyBanned(target.to_string()));
        }
        let requester = room.take_pending(target);
        let victim = room.find_member(target).map(|m| m.id);
        info!("{} banned {} from room {}", owner_name, target, room_name);

        self.notify_room(&room_name, format!("{target} was banned"), None);

        if let Some(requester) = requester {
            self.drop_request(
                &room_name,
                requester,
                format!("You are banned from #{room_name}"),
            );
        }
        if let Some(victim) = victim {
            self.reply(
                victim,
                ServerMessage::status(Tone::Alert, format!("Banned by {owner_name}")),
            );
            self.leave_room(victim, Departure::Banned);
        }
        Ok(())
    }

    fn handle_unban(&mut self, client_id: ClientId, target: &str) -> Result<(), AppError> {
        if target.is_empty() {
            return Err(AppError::Usage("/unban <user>"));
        }
        let room_name = self.owned_room(client_id)?;
        let room = self
            .rooms
            .get_mut(&room_name)
            .ok_or(AppError::NotInRoom)?;
        if !room.unban(target) {
            return Err(AppError::NotBanned(target.to_string()));
        }
        info!("Unbanned {} in room {}", target, room_name);

        self.reply(
            client_id,
            ServerMessage::status(Tone::Success, format!("{target} unbanned")),
        );
        Ok(())
    }

    fn handle_bans(&mut self, client_id: ClientId) -> Result<(), AppError> {
        let room_name = self.owned_room(client_id)?;
        let banned = self
            .rooms
            .get(&room_name)
            .map(|room| room.banned().to_vec())
            .unwrap_or_default();

        if banned.is_empty() {
            self.reply(client_id, ServerMessage::status(Tone::Warning, "No bans"));
            return Ok(());
        }

        self.reply(client_id, ServerMessage::Heading("Banned:".to_string()));
        for name in banned {
            self.reply(client_id, ServerMessage::Entry(name));
        }
        self.reply(client_id, ServerMessage::Blank);
        Ok(())
    }

    fn handle_topic(&mut self, client_id: ClientId, topic: String) -> Result<(), AppError> {
        let room_name = self.owned_room(client_id)?;
        let room = self
            .rooms
            .get_mut(&room_name)
            .ok_or(AppError::NotInRoom)?;

        let notice = if topic.is_empty() {
            "Topic cleared".to_string()
        } else {
            format!("Topic: {topic}")
        };
        room.topic = topic;

        self.notify_room(&room_name, notice, None);
        Ok(())
    }

    fn handle_names(&mut self, client_id: ClientId) -> Result<(), AppError> {
        let room_name = self.current_room(client_id)?;
        let Some(room) = self.rooms.get(&room_name) else {
            return Err(AppError::NotInRoom);
        };

        let members: Vec<String> = room
            .members()
            .iter()
            .map(|m| {
                if room.is_owner(m.id) {
                    format!("{} (owner)", m.name)
                } else {
                    m.name.clone()
                }
            })
            .collect();
        let waiting: Vec<String> = room
            .pending()
            .iter()
            .map(|m| format!("{} (waiting)", m.name))
            .collect();

        self.reply(client_id, ServerMessage::Heading("Users:".to_string()));
        for entry in members {
            self.reply(client_id, ServerMessage::Entry(entry));
        }
        if !waiting.is_empty() {
            self.reply(client_id, ServerMessage::Heading("Pending:".to_string()));
            for entry in waiting {
                self.reply(client_id, ServerMessage::Entry(entry));
            }
        }
        self.reply(client_id, ServerMessage::Blank);
        Ok(())
    }

    fn handle_list(&mut self, client_id: ClientId) -> Result<(), AppError> {
        let entries: Vec<String> = self
            .rooms
            .values()
            .map(|room| format!("#{} ({} users)", room.name, room.member_count()))
            .collect();

        self.reply(client_id, ServerMessage::Heading("Rooms:".to_string()));
        if entries.is_empty() {
            self.reply(client_id, ServerMessage::Entry("(None)".to_string()));
        }
        for entry in entries {
            self.reply(client_id, ServerMessage::Entry(entry));
        }
        self.reply(client_id, ServerMessage::Blank);
        Ok(())
    }

    /// Stage a local file off the actor; committed in `finish_share`
    fn handle_share(&mut self, client_id: ClientId, path: String) -> Result<(), AppError> {
        let room_name = self.current_room(client_id)?;
        if path.is_empty() {
            return Err(AppError::Usage("/share <path>"));
        }
        let room = self.rooms.get(&room_name).ok_or(AppError::NotInRoom)?;
        let taken: HashSet<String> = room.files().iter().map(|f| f.filename.clone()).collect();
        let room_created = room.created_at;

        let store = self.store.clone();
        let completions = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = store.stage_local(&room_name, &path, &taken).await;
            let _ = completions.send(Completion::ShareStaged {
                client_id,
                room: room_name,
                room_created,
                result,
            });
        });
        Ok(())
    }

    /// Index and announce a staged file, or remove it again
    ///
    /// The staged copy is dropped when the sharer has left the room, or the
    /// room was deleted (possibly recreated under the same name) meanwhile.
    fn finish_share(
        &mut self,
        client_id: ClientId,
        room_name: RoomName,
        room_created: Instant,
        result: Result<StagedFile, AppError>,
    ) {
        let staged = match result {
            Ok(staged) => staged,
            Err(err) => {
                self.reply(client_id, err.into());
                return;
            }
        };

        let sharer = self
            .sessions
            .get(&client_id)
            .filter(|s| s.room.as_ref() == Some(&room_name))
            .map(|s| s.display_name().to_string());
        let same_room = self
            .rooms
            .get(&room_name)
            .is_some_and(|room| room.created_at == room_created);
        let Some(sender) = sharer.filter(|_| same_room) else {
            debug!(
                "Discarding share of {} for {}: sharer or room gone",
                staged.filename, room_name
            );
            let store = self.store.clone();
            tokio::spawn(async move {
                store.purge(&room_name, [staged.filename.as_str()]).await;
            });
            return;
        };

        let StagedFile { filename, size } = staged;
        if let Some(room) = self.rooms.get_mut(&room_name) {
            room.add_file(SharedFile {
                filename: filename.clone(),
                sender: sender.clone(),
                size,
            });
        }
        info!("{} shared {} ({} bytes) in room {}", sender, filename, size, room_name);

        let kb = format_kb(size);
        self.reply(
            client_id,
            ServerMessage::status(Tone::Success, format!("Shared: {filename} ({kb})")),
        );
        self.notify_room(
            &room_name,
            format!("{sender} shared: {filename} ({kb})"),
            Some(client_id),
        );
    }

    /// Send a shared file as one inline payload
    fn handle_get(&mut self, client_id: ClientId, filename: String) -> Result<(), AppError> {
        let room_name = self.current_room(client_id)?;
        if filename.is_empty() {
            return Err(AppError::Usage("/get <file>"));
        }
        let indexed = self
            .rooms
            .get(&room_name)
            .is_some_and(|room| room.has_file(&filename));
        if !indexed {
            return Err(AppError::FileNotFound(filename));
        }
        let Some(session) = self.sessions.get(&client_id) else {
            return Ok(());
        };

        let sender = session.sender();
        let store = self.store.clone();
        tokio::spawn(async move {
            let loaded = store.load(&room_name, &filename).await;
            let msg = match loaded {
                Ok(data) => ServerMessage::File {
                    payload: transfer::encode_body(&data),
                    filename,
                },
                Err(e) if e.kind() == ErrorKind::NotFound => AppError::FileGone(filename).into(),
                Err(e) => AppError::Storage(e.to_string()).into(),
            };
            if sender.send(msg).await.is_err() {
                debug!("Client {} left before file payload was sent", client_id);
            }
        });
        Ok(())
    }

    fn handle_files(&mut self, client_id: ClientId) -> Result<(), AppError> {
        let room_name = self.current_room(client_id)?;
        let entries: Vec<String> = self
            .rooms
            .get(&room_name)
            .map(|room| {
                room.files()
                    .iter()
                    .map(|f| format!("{} ({} by {})", f.filename, f.size_kb(), f.sender))
                    .collect()
            })
            .unwrap_or_default();

        if entries.is_empty() {
            self.reply(client_id, ServerMessage::status(Tone::Warning, "No files"));
            return Ok(());
        }

        self.reply(client_id, ServerMessage::Heading("Files:".to_string()));
        for entry in entries {
            self.reply(client_id, ServerMessage::Entry(entry));
        }
        self.reply(client_id, ServerMessage::Blank);
        Ok(())
    }

    /// Queue `Bye!`, waiting for queue space; the handler closes after it
    fn say_goodbye(&self, client_id: ClientId) {
        let Some(session) = self.sessions.get(&client_id) else {
            return;
        };
        let sender = session.sender();
        tokio::spawn(async move {
            if sender.send(ServerMessage::Goodbye).await.is_err() {
                debug!("Client {} left before goodbye was sent", client_id);
            }
        });
    }

    /// Helper: Send a line to one session, ignoring delivery failures
    fn reply(&self, client_id: ClientId, msg: ServerMessage) {
        unicast(&self.sessions, client_id, msg);
    }

    /// Helper: Broadcast a notice to a room
    fn notify_room(&self, room_name: &RoomName, text: String, exclude: Option<ClientId>) {
        if let Some(room) = self.rooms.get(room_name) {
            let msg = ServerMessage::notice(room_name.as_str(), text);
            broadcast(&self.sessions, room, &msg, exclude);
        }
    }

    /// Helper: Topic and roster for a session that just entered a room
    fn send_room_summary(&self, client_id: ClientId, room_name: &RoomName) {
        let Some(room) = self.rooms.get(room_name) else {
            return;
        };
        if !room.topic.is_empty() {
            self.reply(
                client_id,
                ServerMessage::status(Tone::Topic, format!("Topic: {}", room.topic)),
            );
        }
        self.reply(
            client_id,
            ServerMessage::status(Tone::Hint, format!("Users: {}", room.roster())),
        );
    }

    fn set_room(&mut self, client_id: ClientId, room_name: &RoomName) {
        if let Some(session) = self.sessions.get_mut(&client_id) {
            session.room = Some(room_name.clone());
        }
    }

    fn username(&self, client_id: ClientId) -> String {
        self.sessions
            .get(&client_id)
            .map(|s| s.display_name().to_string())
            .unwrap_or_default()
    }

    /// Helper: The room a session is a member of
    fn current_room(&self, client_id: ClientId) -> Result<RoomName, AppError> {
        self.sessions
            .get(&client_id)
            .and_then(|s| s.room.clone())
            .filter(|r| self.rooms.contains_key(r))
            .ok_or(AppError::NotInRoom)
    }

    /// Helper: The room a session owns, checked against the room's owner id
    fn owned_room(&self, client_id: ClientId) -> Result<RoomName, AppError> {
        let room_name = self.current_room(client_id)?;
        match self.rooms.get(&room_name) {
            Some(room) if room.is_owner(client_id) => Ok(room_name),
            _ => Err(AppError::OwnerOnly),
        }
    }
}

#[cfg(test)]
mod tests;
