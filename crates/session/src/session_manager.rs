// Copyright (C) 2026 The Shard Authors. This program is free software: you
// can redistribute it and/or modify it under the terms of the GNU General
// Public License as published by the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General
// Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program. If not, see <https://www.gnu.org/licenses/>.
//

use crate::session::Session;
use serde_json::Value;
use shard_tsid::Tsid;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Every live connection on this shard process (spec §4.8). One instance
/// per shard; shared between the accept loop and anything that needs to
/// broadcast (e.g. `server_message` pushes ahead of a shard restart).
#[derive(Default)]
pub struct SessionManager {
    sessions: papaya::HashMap<Uuid, Session>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: papaya::HashMap::new(),
        }
    }

    /// Spec §4.1 "each accepted connection is assigned a fresh session
    /// id." Registers the session and returns it.
    pub fn new_session(&self, outbound: UnboundedSender<Value>) -> Session {
        let id = Uuid::new_v4();
        let session = Session::new(id, outbound);
        self.sessions.pin().insert(id, session.clone());
        session
    }

    /// Spec §4.1 "on socket close, the session is deregistered."
    pub fn on_close(&self, id: Uuid) -> Option<Session> {
        self.sessions.pin().remove(&id).cloned()
    }

    pub fn get(&self, id: &Uuid) -> Option<Session> {
        self.sessions.pin().get(id).cloned()
    }

    /// Every session whose bound player currently has `location` as its
    /// current location (spec §4.7 "flush" target set).
    pub fn sessions_in_location(&self, location: &Tsid) -> Vec<Session> {
        self.sessions
            .pin()
            .values()
            .filter(|s| s.location().as_ref() == Some(location))
            .cloned()
            .collect()
    }

    pub fn by_player(&self, player: &Tsid) -> Option<Session> {
        self.sessions
            .pin()
            .values()
            .find(|s| s.player().as_ref() == Some(player))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spec §4.8 "`sendToAll(msg, done)` ... apply over logged-in
    /// sessions" and "a broadcast isolates per-session failures: one bad
    /// socket never blocks delivery to the rest." `msg` is cloned per
    /// session since `send` consumes its argument.
    pub fn send_to_all(&self, msg: Value) {
        for session in self.sessions.pin().values().filter(|s| s.is_logged_in()) {
            if let Err(err) = session.send_unchecked(msg.clone()) {
                tracing::warn!(session = %session.id(), error = %err, "broadcast send failed");
            }
        }
    }
}
