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

use shard_cache::CacheError;

/// Spec §7 taxonomy entries owned by the wire session layer: `ProtocolError`
/// and `AuthError`. Both are fatal to the connection they occur on (spec
/// §7 "Closes the session").
#[derive(Debug, thiserror::Error, Clone)]
pub enum SessionError {
    /// Spec §4.1 "an oversize frame... is fatal — close with an error";
    /// spec §7 "malformed frame, oversize payload, undeserializable body."
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Spec §7 "AuthError — token invalid/expired. Session receives an
    /// error response and is closed."
    #[error("auth error: {0}")]
    Auth(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("session is not logged in")]
    NotLoggedIn,
}
