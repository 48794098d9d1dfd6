//! Unicast and broadcast helpers
//!
//! Every delivery goes through a session's bounded queue with `try_send`,
//! so a stalled or closed peer never blocks the actor and never aborts the
//! rest of a fan-out.

use std::collections::HashMap;

use tracing::debug;

use crate::message::ServerMessage;
use crate::room::Room;
use crate::session::Session;
use crate::types::ClientId;

/// Send a line to one session
///
/// Returns false if the session is unknown or the line was dropped.
pub fn unicast(sessions: &HashMap<ClientId, Session>, to: ClientId, msg: ServerMessage) -> bool {
    let Some(session) = sessions.get(&to) else {
        return false;
    };

    match session.send(msg) {
        Ok(()) => true,
        Err(e) => {
            debug!("Dropped line for {}: {}", to, e);
            false
        }
    }
}

/// Send a line to every current member of `room` except `exclude`
///
/// Returns the number of members the line was queued for.
pub fn broadcast(
    sessions: &HashMap<ClientId, Session>,
    room: &Room,
    msg: &ServerMessage,
    exclude: Option<ClientId>,
) -> usize {
    room.members()
        .iter()
        .filter(|m| Some(m.id) != exclude)
        .filter(|m| unicast(sessions, m.id, msg.clone()))
        .count()
}
