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

//! The objref resolver (spec §4.5): a typed handle standing in for a
//! lazily-loaded cross-entity reference, plus the `proxify`/`refify`
//! transforms that walk an entity body replacing objref records with
//! live handles and back.

mod error;
mod graph;
mod resolver;

pub use error::ObjrefError;
pub use graph::{proxify, refify, GraphValue};
pub use resolver::{EntityResolver, ObjrefHandle};
