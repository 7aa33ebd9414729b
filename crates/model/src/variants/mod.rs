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

//! Typed views over an [`Entity`](crate::Entity)'s opaque JSON body, one
//! per row of the spec §3 entity-variant table. Each variant's
//! constructor enforces that row's invariants so an invalid body can
//! never be built, and `to_body`/`from_body` round-trip through the
//! generic `serde_json::Value` the `Entity` actually stores.

mod container_item;
mod data_container;
mod geometry;
mod group;
mod location;
mod player;
mod quest;

pub use container_item::ContainerItemBody;
pub use data_container::DataContainerBody;
pub use geometry::GeometryBody;
pub use group::GroupBody;
pub use location::LocationBody;
pub use player::PlayerBody;
pub use quest::QuestBody;
