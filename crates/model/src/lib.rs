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

//! The persisted entity shape (spec §3) and its per-variant invariants.
//! This crate never interprets gameplay semantics — it only guarantees
//! that an `Entity` in memory satisfies the structural invariants the
//! rest of the system relies on.

mod entity;
mod error;
mod objref_record;
pub mod variants;

pub use entity::{Entity, SerializedEntity};
pub use error::ModelError;
pub use objref_record::ObjrefRecord;
