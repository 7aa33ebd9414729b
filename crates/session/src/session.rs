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

use crate::changeset::Changeset;
use crate::error::SessionError;
use parking_lot::Mutex;
use serde_json::Value;
use shard_tsid::Tsid;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// One connected client (spec §4.1, §4.7). Cheaply cloneable; the
/// per-connection write task owns `outbound`'s receiving half, mirroring
/// the writer-task split used by the shard-to-shard RPC client.
#[derive(Clone)]
pub struct Session {
    id: Uuid,
    logged_in: Arc<AtomicBool>,
    player: Arc<Mutex<Option<Tsid>>>,
    location: Arc<Mutex<Option<Tsid>>>,
    outbound: UnboundedSender<Value>,
    changeset: Arc<Mutex<Changeset>>,
}

impl Session {
    pub fn new(id: Uuid, outbound: UnboundedSender<Value>) -> Self {
        Self {
            id,
            logged_in: Arc::new(AtomicBool::new(false)),
            player: Arc::new(Mutex::new(None)),
            location: Arc::new(Mutex::new(None)),
            outbound,
            changeset: Arc::new(Mutex::new(Changeset::new())),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::Acquire)
    }

    pub fn player(&self) -> Option<Tsid> {
        self.player.lock().clone()
    }

    /// Spec §4.1 "`login_start` binds the session's player before any
    /// further message is processed." Idempotent only in the sense that
    /// rebinding is the caller's responsibility to forbid; this just
    /// performs the bind.
    pub fn bind_player(&self, player: Tsid) {
        *self.player.lock() = Some(player);
        self.logged_in.store(true, Ordering::Release);
    }

    pub fn unbind_player(&self) {
        *self.player.lock() = None;
        self.logged_in.store(false, Ordering::Release);
    }

    /// Tracks which location's outbound diffs this session should
    /// receive (spec §4.7 "location-scoped changes only emitted when
    /// they belong to the player's current location"). Updated whenever
    /// the player's location changes (e.g. `login_end` completing).
    pub fn location(&self) -> Option<Tsid> {
        self.location.lock().clone()
    }

    pub fn set_location(&self, location: Option<Tsid>) {
        *self.location.lock() = location;
    }

    pub fn changeset(&self) -> Arc<Mutex<Changeset>> {
        self.changeset.clone()
    }

    /// Spec §4.1 "sending is gated on the session's `loggedIn` flag,
    /// except for the handful of message types that establish it" —
    /// those bypass this method entirely and push straight onto
    /// `outbound` via [`Session::send_unchecked`].
    pub fn send(&self, msg: Value) -> Result<(), SessionError> {
        if !self.is_logged_in() {
            return Err(SessionError::NotLoggedIn);
        }
        self.send_unchecked(msg)
    }

    pub fn send_unchecked(&self, msg: Value) -> Result<(), SessionError> {
        self.outbound
            .send(msg)
            .map_err(|_| SessionError::Protocol("outbound channel closed".to_string()))
    }
}
