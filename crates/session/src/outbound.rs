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

use crate::session_manager::SessionManager;
use async_trait::async_trait;
use shard_cache::OutboundFlush;
use shard_tsid::Tsid;
use std::sync::Arc;

/// Bridges the request engine's post-commit hook (spec §4.2 step 6) to
/// every session whose player currently sits in the committed location
/// (spec §4.7). Registered with `RequestQueueRegistry` in place of
/// `NoopOutboundFlush` once the wire layer is wired up.
pub struct SessionOutboundFlush {
    sessions: Arc<SessionManager>,
}

impl SessionOutboundFlush {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl OutboundFlush for SessionOutboundFlush {
    async fn flush_after_commit(&self, owner: &Tsid) {
        for session in self.sessions.sessions_in_location(owner) {
            let flushed = session.changeset().lock().flush(Some(owner));
            if let Some(msg) = flushed {
                if let Err(e) = session.send_unchecked(msg) {
                    tracing::warn!(session = %session.id(), error = %e, "outbound flush send failed");
                }
            }
        }
    }
}
