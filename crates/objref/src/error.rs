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

/// Spec §7 "ObjRefError — resolver proxy could not load its target.
/// Surfaced synchronously at attribute access" (synchronous from the
/// caller's perspective: the `resolve`/mutate call returns this error
/// directly rather than deferring it).
#[derive(Debug, thiserror::Error, Clone)]
pub enum ObjrefError {
    #[error("objref target {0} not found")]
    NotFound(Tsid),
    #[error("objref target {tsid} failed to load: {message}")]
    LoadFailed { tsid: Tsid, message: String },
}
