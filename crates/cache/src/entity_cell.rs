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

use parking_lot::Mutex;
use shard_model::Entity;
use shard_tsid::Tsid;

/// The process-wide cache's unit of storage (spec §4.4 "`get(tsid)` must
/// return the unique in-process instance of the entity"). Mutation only
/// ever happens from the single worker of the entity's owning request
/// queue (spec §5 "Reads/writes to an entity happen only on that
/// entity's owning queue"), so the lock below is never meaningfully
/// contended — it exists to satisfy `Sync`, not to arbitrate concurrent
/// writers.
pub struct EntityCell {
    tsid: Tsid,
    entity: Mutex<Entity>,
}

impl EntityCell {
    pub fn new(entity: Entity) -> Self {
        Self {
            tsid: entity.tsid().clone(),
            entity: Mutex::new(entity),
        }
    }

    pub fn tsid(&self) -> &Tsid {
        &self.tsid
    }

    pub fn with<R>(&self, f: impl FnOnce(&Entity) -> R) -> R {
        f(&self.entity.lock())
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Entity) -> R) -> R {
        f(&mut self.entity.lock())
    }

    pub fn snapshot(&self) -> Entity {
        self.entity.lock().clone()
    }
}
