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

use crate::error::PersistenceError;
use async_trait::async_trait;
use shard_model::SerializedEntity;
use shard_tsid::Tsid;

/// A per-call durability hint (spec §6: "a per-call soft durability,
/// no-reply hint may be passed for low-priority writes"). `Durable` is
/// the default and must be honored synchronously with respect to the
/// caller observing success; `SoftNoReply` lets the backend batch or
/// defer the write.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum Durability {
    #[default]
    Durable,
    SoftNoReply,
}

/// The back-end-agnostic persistence interface the request engine's
/// commit phase is the sole caller of (spec §4.4, §6). Implementations
/// may be called concurrently from multiple queue workers and MUST be
/// internally safe (spec §5 "Shared-resource policy").
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    async fn read(&self, tsid: &Tsid) -> Result<Option<SerializedEntity>, PersistenceError>;
    async fn write(
        &self,
        entity: &SerializedEntity,
        durability: Durability,
    ) -> Result<(), PersistenceError>;
    async fn del(&self, tsid: &Tsid) -> Result<(), PersistenceError>;
    async fn close(&self) -> Result<(), PersistenceError>;
}
