//! Room struct definition
//!
//! Represents a named chat room: an owner, members in join order, join
//! requests awaiting the owner, the names ever approved, the ban list, the
//! topic and the index of shared files. Pure state; the server actor does
//! all messaging.

use std::collections::HashSet;
use std::time::Instant;

use crate::types::{ClientId, RoomName};

/// A session as seen by a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: ClientId,
    pub name: String,
}

impl Member {
    pub fn new(id: ClientId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Entry in a room's shared-file index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedFile {
    /// Collision-free name within the room
    pub filename: String,
    /// Username of the sharer
    pub sender: String,
    pub size: u64,
}

impl SharedFile {
    /// Size in KiB with two decimals, as shown to users
    pub fn size_kb(&self) -> String {
        format_kb(self.size)
    }
}

/// Format a byte count as KiB with two decimals
pub fn format_kb(size: u64) -> String {
    format!("{:.2} KB", size as f64 / 1024.0)
}

/// How a room treats a join attempt by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Name is banned; the attempt is refused
    Banned,
    /// Name was approved before; joins directly
    Approved,
    /// Unknown name; must wait for the owner
    NeedsApproval,
}

/// Outcome of removing a member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub member: Member,
    /// Member promoted because the owner left
    pub promoted: Option<Member>,
}

/// Multi-user chat room
///
/// The creator is the owner. When the owner leaves while others remain, the
/// earliest remaining member is promoted, so the owner is always a member.
/// A room with no members is deleted by the registry.
#[derive(Debug)]
pub struct Room {
    /// Room name for identification
    pub name: RoomName,
    /// Current owner
    pub owner: ClientId,
    /// Topic, empty when unset
    pub topic: String,
    /// Room creation time
    pub created_at: Instant,
    members: Vec<Member>,
    pending: Vec<Member>,
    approved: HashSet<String>,
    banned: Vec<String>,
    files: Vec<SharedFile>,
}

impl Room {
    /// Create a new room with `owner` as its sole member
    pub fn new(name: RoomName, owner: Member) -> Self {
        Self {
            name,
            owner: owner.id,
            topic: String::new(),
            created_at: Instant::now(),
            approved: HashSet::from([owner.name.clone()]),
            members: vec![owner],
            pending: Vec::new(),
            banned: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Check if `id` is the exact current owner
    pub fn is_owner(&self, id: ClientId) -> bool {
        self.owner == id
    }

    /// Members in join order
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Check if a session is a member of this room
    pub fn contains(&self, id: ClientId) -> bool {
        self.members.iter().any(|m| m.id == id)
    }

    /// Find a member by username
    pub fn find_member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Comma-separated member names in join order
    pub fn roster(&self) -> String {
        self.members
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Get the number of members in the room
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Check if room is empty (should be deleted)
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Classify a join attempt by `name`
    pub fn admission(&self, name: &str) -> Admission {
        if self.is_banned(name) {
            Admission::Banned
        } else if self.approved.contains(name) {
            Admission::Approved
        } else {
            Admission::NeedsApproval
        }
    }

    /// Add a member and remember the name as approved
    ///
    /// Clears any pending request by the same session.
    pub fn admit(&mut self, member: Member) {
        self.pending.retain(|p| p.id != member.id);
        self.approved.insert(member.name.clone());
        if !self.contains(member.id) {
            self.members.push(member);
        }
    }

    /// Queue a join request
    ///
    /// Returns false if the session is already a member or already waiting.
    pub fn request(&mut self, member: Member) -> bool {
        if self.contains(member.id) || self.pending.iter().any(|p| p.id == member.id) {
            return false;
        }
        self.pending.push(member);
        true
    }

    /// Join requests in arrival order
    pub fn pending(&self) -> &[Member] {
        &self.pending
    }

    /// Remove and return the pending request made under `name`
    pub fn take_pending(&mut self, name: &str) -> Option<Member> {
        let pos = self.pending.iter().position(|p| p.name == name)?;
        Some(self.pending.remove(pos))
    }

    /// Remove and return every pending request
    pub fn take_all_pending(&mut self) -> Vec<Member> {
        std::mem::take(&mut self.pending)
    }

    /// Drop the pending request of a session, if any
    pub fn cancel_request(&mut self, id: ClientId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.id != id);
        self.pending.len() != before
    }

    /// Remove a member (leave, kick, ban or disconnect)
    ///
    /// Returns None if the session was not a member. If the owner leaves and
    /// others remain, the earliest remaining member becomes owner.
    pub fn remove_member(&mut self, id: ClientId) -> Option<Removal> {
        let pos = self.members.iter().position(|m| m.id == id)?;
        let member = self.members.remove(pos);

        let promoted = if self.owner == id {
            self.members.first().cloned()
        } else {
            None
        };
        if let Some(next) = &promoted {
            self.owner = next.id;
        }

        Some(Removal { member, promoted })
    }

    /// Check if a name was approved at some point and not banned since
    pub fn is_approved(&self, name: &str) -> bool {
        self.approved.contains(name)
    }

    /// Check if a name is banned
    pub fn is_banned(&self, name: &str) -> bool {
        self.banned.iter().any(|b| b == name)
    }

    /// Banned names in the order they were banned
    pub fn banned(&self) -> &[String] {
        &self.banned
    }

    /// Ban a name and revoke its approval
    ///
    /// Returns false if the name was already banned. Removing a pending
    /// request or membership under that name is up to the caller, which
    /// also has to notify the session.
    pub fn ban(&mut self, name: &str) -> bool {
        if self.is_banned(name) {
            return false;
        }
        self.banned.push(name.to_string());
        self.approved.remove(name);
        true
    }

    /// Lift a ban; approval is not restored
    pub fn unban(&mut self, name: &str) -> bool {
        let before = self.banned.len();
        self.banned.retain(|b| b != name);
        self.banned.len() != before
    }

    /// Shared files in share order
    pub fn files(&self) -> &[SharedFile] {
        &self.files
    }

    /// Look up a shared file by its room-local name
    pub fn find_file(&self, filename: &str) -> Option<&SharedFile> {
        self.files.iter().find(|f| f.filename == filename)
    }

    pub fn has_file(&self, filename: &str) -> bool {
        self.find_file(filename).is_some()
    }

    /// Index a staged file
    pub fn add_file(&mut self, file: SharedFile) {
        self.files.push(file);
    }
}
