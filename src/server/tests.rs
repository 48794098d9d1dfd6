use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use super::*;

struct Harness {
    cmd_tx: mpsc::Sender<ServerCommand>,
    dir: tempfile::TempDir,
}

struct TestClient {
    id: ClientId,
    rx: mpsc::Receiver<ServerMessage>,
    cmd_tx: mpsc::Sender<ServerCommand>,
}

async fn start() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path().join("uploads")).await.unwrap();
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    tokio::spawn(ChatServer::new(cmd_rx, store).run());
    Harness { cmd_tx, dir }
}

impl Harness {
    async fn connect(&self) -> TestClient {
        self.connect_with_queue(256).await
    }

    async fn connect_with_queue(&self, capacity: usize) -> TestClient {
        let (tx, rx) = mpsc::channel(capacity);
        let id = ClientId::new();
        self.cmd_tx
            .send(ServerCommand::Connect {
                client_id: id,
                sender: tx,
            })
            .await
            .unwrap();
        let mut client = TestClient {
            id,
            rx,
            cmd_tx: self.cmd_tx.clone(),
        };
        assert_eq!(client.next().await, ServerMessage::Prompt);
        client
    }

    async fn login(&self, name: &str) -> TestClient {
        let mut client = self.connect().await;
        client.send(name).await;
        client.expect(&format!("Welcome, {name}!")).await;
        client.expect("Type /help for commands").await;
        client
    }

    /// Write a file the server process can share
    fn local_file(&self, subdir: &str, name: &str, data: &[u8]) -> PathBuf {
        let dir = self.dir.path().join(subdir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    fn uploads(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }
}

impl TestClient {
    async fn send(&self, line: &str) {
        self.cmd_tx
            .send(ServerCommand::Line {
                client_id: self.id,
                line: line.to_string(),
            })
            .await
            .unwrap();
    }

    async fn next(&mut self) -> ServerMessage {
        timeout(Duration::from_secs(2), self.rx.recv())
            .await
            .expect("timed out waiting for a line")
            .expect("session queue closed")
    }

    /// Read until a rendered line contains `needle`
    async fn expect(&mut self, needle: &str) -> String {
        loop {
            let line = self.next().await.render();
            if line.contains(needle) {
                return line;
            }
        }
    }

    /// Every line queued before a `/list` round trip
    ///
    /// The actor handles commands in order, so this flushes everything
    /// triggered by commands sent earlier (by any client).
    async fn drain(&mut self) -> Vec<String> {
        self.send("/list").await;
        let mut seen = Vec::new();
        loop {
            let line = self.next().await.render();
            if line.contains("[SERVER] Rooms:") {
                break;
            }
            seen.push(line);
        }
        while self.next().await != ServerMessage::Blank {}
        seen
    }

    async fn disconnect(&self) {
        self.cmd_tx
            .send(ServerCommand::Disconnect { client_id: self.id })
            .await
            .unwrap();
    }
}

fn mentions(lines: &[String], needle: &str) -> bool {
    lines.iter().any(|l| l.contains(needle))
}

/// alice owns #lobby, bob has been accepted into it
async fn lobby_with_bob(h: &Harness) -> (TestClient, TestClient) {
    let mut alice = h.login("alice").await;
    alice.send("/join lobby").await;
    alice.expect("You are the owner").await;

    let mut bob = h.login("bob").await;
    bob.send("/join lobby").await;
    bob.expect("Waiting for owner").await;
    alice.expect("bob wants to join.").await;

    alice.send("/accept bob").await;
    alice.expect("*** bob joined").await;
    bob.expect("*** bob joined").await;
    (alice, bob)
}

#[tokio::test]
async fn test_empty_line_reprompts_before_name() {
    let h = start().await;
    let mut client = h.connect().await;

    client.send("   ").await;
    assert_eq!(client.next().await, ServerMessage::Prompt);
}

#[tokio::test]
async fn test_username_unique_and_reprompted() {
    let h = start().await;
    let _alice = h.login("alice").await;

    let mut second = h.connect().await;
    second.send("alice").await;
    second.expect("Username taken!").await;
    assert_eq!(second.next().await, ServerMessage::Prompt);

    second.send("alice2").await;
    second.expect("Welcome, alice2!").await;
}

#[tokio::test]
async fn test_username_cannot_look_like_command() {
    let h = start().await;
    let mut client = h.connect().await;

    client.send("/join").await;
    client.expect("Invalid username").await;
    assert_eq!(client.next().await, ServerMessage::Prompt);
}

#[tokio::test]
async fn test_username_released_exactly_once() {
    let h = start().await;
    let alice = h.login("alice").await;
    alice.disconnect().await;

    let _again = h.login("alice").await;

    // A stale second disconnect must not free the new holder's name
    alice.disconnect().await;
    let mut third = h.connect().await;
    third.send("alice").await;
    third.expect("Username taken!").await;
}

#[tokio::test]
async fn test_empty_lines_ignored_after_name() {
    let h = start().await;
    let mut alice = h.login("alice").await;

    alice.send("").await;
    let lines = alice.drain().await;
    assert!(lines.is_empty(), "unexpected output: {lines:?}");
}

#[tokio::test]
async fn test_unknown_command_and_chat_outside_room() {
    let h = start().await;
    let mut alice = h.login("alice").await;

    alice.send("/frob now").await;
    alice.expect("Unknown: /frob").await;

    alice.send("hello?").await;
    alice.expect("Join a room first. (/join <room>)").await;

    alice.send("/files").await;
    alice.expect("Not in room").await;

    alice.send("/kick bob").await;
    alice.expect("Not in room").await;

    alice.send("/part").await;
    alice.expect("Not in room").await;
}

#[tokio::test]
async fn test_join_requires_argument() {
    let h = start().await;
    let mut alice = h.login("alice").await;

    alice.send("/join").await;
    alice.expect("Usage: /join <room>").await;

    alice.send("/join a/b").await;
    alice.expect("Invalid room name").await;
}

#[tokio::test]
async fn test_join_unknown_room_grants_ownership() {
    let h = start().await;
    let mut alice = h.login("alice").await;

    alice.send("/JOIN lobby").await;
    alice.expect("Created #lobby").await;
    alice.expect("You are the owner").await;

    alice.send("/names").await;
    alice.expect("alice (owner)").await;

    alice.send("/join other").await;
    alice.expect("Leave current room first").await;
}

#[tokio::test]
async fn test_accept_scenario() {
    let h = start().await;
    let mut alice = h.login("alice").await;
    alice.send("/join lobby").await;
    alice.expect("You are the owner").await;
    alice.send("/topic planning").await;
    alice.expect("*** Topic: planning").await;

    let mut bob = h.login("bob").await;
    bob.send("/join lobby").await;
    bob.expect("Waiting for owner to accept your request...").await;
    alice.expect("bob wants to join.").await;
    alice.expect("Type /accept bob or /decline bob").await;

    alice.send("/names").await;
    alice.expect("bob (waiting)").await;

    alice.send("/accept bob").await;
    bob.expect("Owner accepted your request. Joined #lobby").await;
    bob.expect("Topic: planning").await;
    bob.expect("Users: alice, bob").await;
    bob.expect("*** bob joined").await;
    alice.expect("*** bob joined").await;

    alice.send("/accept bob").await;
    alice.expect("User not found in pending list.").await;
}

#[tokio::test]
async fn test_pending_user_is_not_a_member() {
    let h = start().await;
    let mut alice = h.login("alice").await;
    alice.send("/join lobby").await;
    alice.expect("You are the owner").await;

    let mut bob = h.login("bob").await;
    bob.send("/join lobby").await;
    bob.expect("Waiting for owner").await;

    alice.send("hello room").await;
    let lines = bob.drain().await;
    assert!(!mentions(&lines, "hello room"));

    bob.send("/join elsewhere").await;
    bob.expect("Still waiting for approval in #lobby").await;

    bob.send("/names").await;
    bob.expect("Not in room").await;
}

#[tokio::test]
async fn test_part_cancels_pending_request() {
    let h = start().await;
    let mut alice = h.login("alice").await;
    alice.send("/join lobby").await;
    alice.expect("You are the owner").await;

    let mut bob = h.login("bob").await;
    bob.send("/join lobby").await;
    bob.expect("Waiting for owner").await;
    bob.send("/part").await;
    bob.expect("Cancelled join request for #lobby").await;

    alice.send("/accept bob").await;
    alice.expect("User not found in pending list.").await;

    bob.send("/join other").await;
    bob.expect("Created #other").await;
}

#[tokio::test]
async fn test_disconnect_while_pending_drops_request() {
    let h = start().await;
    let mut alice = h.login("alice").await;
    alice.send("/join lobby").await;
    alice.expect("You are the owner").await;

    let mut bob = h.login("bob").await;
    bob.send("/join lobby").await;
    bob.expect("Waiting for owner").await;
    bob.disconnect().await;

    alice.send("/accept bob").await;
    alice.expect("User not found in pending list.").await;
    alice.send("/acceptall").await;
    alice.expect("No users are pending.").await;
}

#[tokio::test]
async fn test_approved_name_rejoins_without_approval() {
    let h = start().await;
    let (mut alice, bob) = lobby_with_bob(&h).await;

    bob.disconnect().await;
    let lines = alice.drain().await;
    assert!(!mentions(&lines, "bob left"), "disconnect is silent");

    let mut bob = h.login("bob").await;
    bob.send("/join lobby").await;
    bob.expect("Welcome back! Re-joined #lobby").await;
    bob.expect("Users: alice, bob").await;
    alice.expect("*** bob joined").await;

    let lines = alice.drain().await;
    assert!(!mentions(&lines, "wants to join"));
}

#[tokio::test]
async fn test_decline() {
    let h = start().await;
    let mut alice = h.login("alice").await;
    alice.send("/join lobby").await;
    alice.expect("You are the owner").await;

    let mut bob = h.login("bob").await;
    bob.send("/join lobby").await;
    bob.expect("Waiting for owner").await;

    alice.send("/decline bob").await;
    alice.expect("You declined bob.").await;
    bob.expect("Owner (alice) declined your request.").await;

    // Declined, not remembered: asks again
    bob.send("/join lobby").await;
    bob.expect("Waiting for owner").await;
}

#[tokio::test]
async fn test_accept_all_and_decline_all() {
    let h = start().await;
    let mut alice = h.login("alice").await;
    alice.send("/join lobby").await;
    alice.expect("You are the owner").await;

    alice.send("/declineall").await;
    alice.expect("No users are pending.").await;

    let mut bob = h.login("bob").await;
    let mut carol = h.login("carol").await;
    bob.send("/join lobby").await;
    carol.send("/join lobby").await;
    alice.expect("carol wants to join.").await;

    alice.send("/acceptall").await;
    alice.expect("Accepting all pending users...").await;
    bob.expect("Joined #lobby").await;
    carol.expect("Joined #lobby").await;
    carol.expect("Users: alice, bob, carol").await;

    let mut dave = h.login("dave").await;
    dave.send("/join lobby").await;
    alice.expect("dave wants to join.").await;
    alice.send("/declineall").await;
    alice.expect("Declining all pending users...").await;
    dave.expect("Owner (alice) declined your request.").await;
}

#[tokio::test]
async fn test_owner_only_commands() {
    let h = start().await;
    let (_alice, mut bob) = lobby_with_bob(&h).await;

    for cmd in [
        "/topic mine now",
        "/kick alice",
        "/ban alice",
        "/unban alice",
        "/bans",
        "/accept x",
        "/decline x",
        "/acceptall",
        "/declineall",
    ] {
        bob.send(cmd).await;
        bob.expect("Owner only").await;
    }
}

#[tokio::test]
async fn test_chat_fanout_excludes_sender() {
    let h = start().await;
    let (mut alice, mut bob) = lobby_with_bob(&h).await;
    let mut carol = h.login("carol").await;

    alice.send("hello everyone").await;
    let line = bob.expect("hello everyone").await;
    assert!(line.contains("[#lobby]"));
    assert!(line.contains("<alice>"));

    // Neither the sender nor a session outside the room has anything queued
    let lines = alice.drain().await;
    assert!(lines.is_empty(), "sender got {lines:?}");
    let lines = carol.drain().await;
    assert!(lines.is_empty(), "outsider got {lines:?}");
}

#[tokio::test]
async fn test_framed_chat_text_is_not_a_file() {
    let h = start().await;
    let (alice, mut bob) = lobby_with_bob(&h).await;

    let framed = transfer::encode("evil.sh", b"rm -rf ~");
    alice.send(&framed).await;

    let line = bob.expect("<alice>").await;
    assert!(line.contains(&framed));
    assert!(!transfer::is_payload(&line));
    assert!(transfer::decode(&line).is_err());
}

#[tokio::test]
async fn test_part_broadcasts_left() {
    let h = start().await;
    let (mut alice, mut bob) = lobby_with_bob(&h).await;

    bob.send("/leave").await;
    bob.expect("Left room").await;
    alice.expect("*** bob left").await;

    bob.send("still here?").await;
    bob.expect("Join a room first").await;
}

#[tokio::test]
async fn test_kick() {
    let h = start().await;
    let (mut alice, mut bob) = lobby_with_bob(&h).await;

    alice.send("/kick carol").await;
    alice.expect("User not found").await;
    alice.send("/kick alice").await;
    alice.expect("You cannot do that to yourself").await;

    alice.send("/kick bob").await;
    bob.expect("Kicked by alice").await;
    let lines = alice.drain().await;
    assert!(mentions(&lines, "*** bob was kicked"));
    assert!(!mentions(&lines, "bob left"));

    bob.send("hi").await;
    bob.expect("Join a room first").await;

    // Kick does not revoke approval
    bob.send("/join lobby").await;
    bob.expect("Welcome back!").await;
}

#[tokio::test]
async fn test_ban_member_and_unban_requires_new_approval() {
    let h = start().await;
    let (mut alice, mut bob) = lobby_with_bob(&h).await;

    alice.send("/ban bob").await;
    bob.expect("*** bob was banned").await;
    bob.expect("Banned by alice").await;
    let lines = alice.drain().await;
    assert!(mentions(&lines, "*** bob was banned"));
    assert!(!mentions(&lines, "bob left"));

    alice.send("/ban bob").await;
    alice.expect("Already banned").await;

    bob.send("/join lobby").await;
    bob.expect("You are banned from this room!").await;

    alice.send("/bans").await;
    alice.expect("Banned:").await;
    alice.expect("  bob").await;

    alice.send("/unban bob").await;
    alice.expect("bob unbanned").await;
    alice.send("/unban bob").await;
    alice.expect("Not banned").await;

    bob.send("/join lobby").await;
    bob.expect("Waiting for owner").await;
    alice.expect("bob wants to join.").await;
}

#[tokio::test]
async fn test_ban_absent_user_blocks_later_join() {
    let h = start().await;
    let mut alice = h.login("alice").await;
    alice.send("/join lobby").await;
    alice.expect("You are the owner").await;

    alice.send("/ban mallory").await;
    alice.expect("*** mallory was banned").await;

    let mut mallory = h.login("mallory").await;
    mallory.send("/join lobby").await;
    mallory.expect("You are banned from this room!").await;

    alice.send("/names").await;
    alice.expect("alice (owner)").await;
    let lines = alice.drain().await;
    assert!(!mentions(&lines, "mallory"));

    alice.send("/accept mallory").await;
    alice.expect("User not found in pending list.").await;
}

#[tokio::test]
async fn test_ban_drops_pending_request() {
    let h = start().await;
    let mut alice = h.login("alice").await;
    alice.send("/join lobby").await;
    alice.expect("You are the owner").await;

    let mut bob = h.login("bob").await;
    bob.send("/join lobby").await;
    alice.expect("bob wants to join.").await;

    alice.send("/ban bob").await;
    bob.expect("You are banned from #lobby").await;

    alice.send("/accept bob").await;
    alice.expect("User not found in pending list.").await;

    // Request slot is free again, but the ban holds
    bob.send("/join lobby").await;
    bob.expect("You are banned from this room!").await;
}

#[tokio::test]
async fn test_empty_room_is_deleted_and_recreated_fresh() {
    let h = start().await;
    let mut alice = h.login("alice").await;
    alice.send("/join lobby").await;
    alice.expect("You are the owner").await;
    alice.send("/topic old topic").await;
    alice.send("/ban mallory").await;
    alice.expect("mallory was banned").await;

    alice.send("/part").await;
    alice.expect("Left room").await;
    alice.send("/list").await;
    alice.expect("(None)").await;

    let mut carol = h.login("carol").await;
    carol.send("/join lobby").await;
    carol.expect("Created #lobby").await;
    carol.expect("You are the owner").await;
    carol.send("/bans").await;
    carol.expect("No bans").await;

    let mut mallory = h.login("mallory").await;
    mallory.send("/join lobby").await;
    mallory.expect("Waiting for owner").await;

    // Approval history vanished too
    alice.send("/join lobby").await;
    alice.expect("Waiting for owner").await;
}

#[tokio::test]
async fn test_room_closed_while_requests_pending() {
    let h = start().await;
    let mut alice = h.login("alice").await;
    alice.send("/join lobby").await;
    alice.expect("You are the owner").await;

    let mut bob = h.login("bob").await;
    bob.send("/join lobby").await;
    alice.expect("bob wants to join.").await;

    alice.disconnect().await;
    bob.expect("#lobby was closed").await;

    bob.send("/join lobby").await;
    bob.expect("Created #lobby").await;
}

#[tokio::test]
async fn test_owner_disconnect_promotes_earliest_member() {
    let h = start().await;
    let (mut alice, mut bob) = lobby_with_bob(&h).await;
    let mut carol = h.login("carol").await;
    carol.send("/join lobby").await;
    alice.expect("carol wants to join.").await;

    alice.disconnect().await;
    bob.expect("You are now the owner of #lobby").await;
    bob.expect("Waiting to join: carol").await;
    bob.expect("*** bob is now the owner").await;

    bob.send("/accept carol").await;
    carol.expect("Joined #lobby").await;

    carol.send("/topic hijack").await;
    carol.expect("Owner only").await;
    bob.send("/topic new era").await;
    carol.expect("*** Topic: new era").await;
}

#[tokio::test]
async fn test_topic_clear() {
    let h = start().await;
    let (mut alice, mut bob) = lobby_with_bob(&h).await;

    alice.send("/topic  Release planning ").await;
    bob.expect("*** Topic: Release planning").await;
    alice.send("/topic").await;
    bob.expect("*** Topic cleared").await;
}

#[tokio::test]
async fn test_help_depends_on_role() {
    let h = start().await;
    let (mut alice, mut bob) = lobby_with_bob(&h).await;

    alice.send("/help").await;
    alice.expect("/kick <user>").await;

    bob.send("/help").await;
    let mut lines = Vec::new();
    loop {
        let msg = bob.next().await;
        if msg == ServerMessage::Blank {
            break;
        }
        lines.push(msg.render());
    }
    assert!(mentions(&lines, "/share <file>"));
    assert!(!mentions(&lines, "/kick"));
}

#[tokio::test]
async fn test_list_rooms() {
    let h = start().await;
    let (mut alice, _bob) = lobby_with_bob(&h).await;
    let mut carol = h.login("carol").await;
    carol.send("/join annex").await;
    carol.expect("Created #annex").await;

    alice.send("/list").await;
    alice.expect("#annex (1 users)").await;
    alice.expect("#lobby (2 users)").await;
}

#[tokio::test]
async fn test_quit_says_goodbye() {
    let h = start().await;
    let mut alice = h.login("alice").await;

    alice.send("/exit").await;
    assert_eq!(alice.next().await, ServerMessage::Goodbye);
}

#[tokio::test]
async fn test_quit_waits_for_queue_space() {
    let h = start().await;
    let mut client = h.connect_with_queue(1).await;

    // The welcome fills the queue and the hint after it is dropped
    client.send("alice").await;
    client.send("/quit").await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    client.expect("Welcome, alice!").await;
    assert_eq!(client.next().await, ServerMessage::Goodbye);
}

#[tokio::test]
async fn test_share_into_deleted_room_is_rolled_back() {
    let h = start().await;
    let mut alice = h.login("alice").await;
    alice.send("/join lobby").await;
    alice.expect("You are the owner").await;

    let path = h.local_file("src", "notes.txt", b"late arrival");
    alice.send(&format!("/share {}", path.display())).await;
    alice.send("/part").await;
    alice.expect("Left room").await;
    alice.send("/join lobby").await;
    alice.expect("Created #lobby").await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    alice.send("/files").await;
    alice.expect("No files").await;
    assert!(!h.uploads().join("lobby_notes.txt").exists());
    let lines = alice.drain().await;
    assert!(!mentions(&lines, "Shared:"), "got {lines:?}");
}

#[tokio::test]
async fn test_share_and_get_roundtrip() {
    let h = start().await;
    let (mut alice, mut bob) = lobby_with_bob(&h).await;

    let data: Vec<u8> = (0..3072u32).map(|i| (i * 7 % 251) as u8).collect();
    let path = h.local_file("src", "notes.txt", &data);

    alice.send(&format!("/share {}", path.display())).await;
    alice.expect("Shared: notes.txt (3.00 KB)").await;
    bob.expect("*** alice shared: notes.txt (3.00 KB)").await;
    assert!(h.uploads().join("lobby_notes.txt").is_file());

    bob.send("/files").await;
    bob.expect("notes.txt (3.00 KB by alice)").await;

    bob.send("/get notes.txt").await;
    let line = bob.expect("::FILE_START::notes.txt::").await;
    assert!(line.ends_with("::FILE_END::"));
    assert!(transfer::is_payload(&line));
}

#[tokio::test]
async fn test_get_payload_decodes_to_source_bytes() {
    let h = start().await;
    let (mut alice, mut bob) = lobby_with_bob(&h).await;

    let data: Vec<u8> = (0..3072u32).map(|i| (i % 256) as u8).collect();
    let path = h.local_file("src", "notes.txt", &data);
    alice.send(&format!("/share {}", path.display())).await;
    alice.expect("Shared: notes.txt").await;

    bob.send("/download notes.txt").await;
    let line = bob.expect("::FILE_START::").await;
    let file = transfer::decode(&line).unwrap();
    assert_eq!(file.filename, "notes.txt");
    assert_eq!(file.data.len(), 3072);
    assert_eq!(file.data, data);
}

#[tokio::test]
async fn test_share_collision_renames_without_overwrite() {
    let h = start().await;
    let (mut alice, mut bob) = lobby_with_bob(&h).await;

    let first = h.local_file("a", "notes.txt", b"original");
    let second = h.local_file("b", "notes.txt", b"replacement");

    alice.send(&format!("/share {}", first.display())).await;
    alice.expect("Shared: notes.txt").await;
    bob.send(&format!("/share {}", second.display())).await;
    bob.expect("Shared: notes_1.txt").await;
    alice.expect("*** bob shared: notes_1.txt").await;

    bob.send("/get notes.txt").await;
    let line = bob.expect("::FILE_START::").await;
    assert_eq!(transfer::decode(&line).unwrap().data, b"original");

    bob.send("/get notes_1.txt").await;
    let line = bob.expect("::FILE_START::").await;
    assert_eq!(transfer::decode(&line).unwrap().data, b"replacement");
}

#[tokio::test]
async fn test_share_and_get_errors() {
    let h = start().await;
    let (mut alice, _bob) = lobby_with_bob(&h).await;

    alice.send("/share").await;
    alice.expect("Usage: /share <path>").await;

    let missing = h.dir.path().join("missing.txt");
    alice.send(&format!("/share {}", missing.display())).await;
    alice.expect("File not found").await;

    alice.send("/get").await;
    alice.expect("Usage: /get <file>").await;
    alice.send("/get nothing.txt").await;
    alice.expect("Not found").await;

    alice.send("/files").await;
    alice.expect("No files").await;
}

#[tokio::test]
async fn test_get_reports_missing_staged_file() {
    let h = start().await;
    let (mut alice, _bob) = lobby_with_bob(&h).await;

    let path = h.local_file("src", "gone.txt", b"soon gone");
    alice.send(&format!("/share {}", path.display())).await;
    alice.expect("Shared: gone.txt").await;

    std::fs::remove_file(h.uploads().join("lobby_gone.txt")).unwrap();
    alice.send("/get gone.txt").await;
    alice.expect("File gone").await;
}

#[tokio::test]
async fn test_deleted_room_purges_staged_files() {
    let h = start().await;
    let mut alice = h.login("alice").await;
    alice.send("/join lobby").await;
    alice.expect("You are the owner").await;

    let path = h.local_file("src", "notes.txt", b"temporary");
    alice.send(&format!("/share {}", path.display())).await;
    alice.expect("Shared: notes.txt").await;
    let staged = h.uploads().join("lobby_notes.txt");
    assert!(staged.is_file());

    alice.send("/part").await;
    alice.expect("Left room").await;

    let purged = timeout(Duration::from_secs(2), async {
        while staged.exists() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(purged.is_ok(), "staged file should be removed with the room");
}
