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

use shard_tsid::Tsid;

/// Spec §7 "PersistenceError — the back-end refused a write/del". The
/// request's `onDone` reports this; the caller is responsible for
/// leaving dirty objects in memory so a later request can retry (spec
/// §4.2 step 4).
#[derive(Debug, thiserror::Error, Clone)]
pub enum PersistenceError {
    #[error("write of {tsid} failed: {message}")]
    WriteFailed { tsid: Tsid, message: String },
    #[error("delete of {tsid} failed: {message}")]
    DeleteFailed { tsid: Tsid, message: String },
    #[error("read of {tsid} failed: {message}")]
    ReadFailed { tsid: Tsid, message: String },
    #[error("backend is closed")]
    Closed,
}
