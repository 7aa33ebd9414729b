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

use crate::backend::{Durability, PersistenceBackend};
use crate::error::PersistenceError;
use async_trait::async_trait;
use shard_model::SerializedEntity;
use shard_tsid::Tsid;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-process backend for tests: no filesystem, no serialization round
/// trip. Mirrors the teacher's transient/in-memory provider so crates
/// above this one don't need a real data directory to exercise the
/// commit phase.
#[derive(Default)]
pub struct InMemoryBackend {
    entries: Mutex<HashMap<Tsid, SerializedEntity>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PersistenceBackend for InMemoryBackend {
    async fn read(&self, tsid: &Tsid) -> Result<Option<SerializedEntity>, PersistenceError> {
        Ok(self.entries.lock().expect("lock poisoned").get(tsid).cloned())
    }

    async fn write(
        &self,
        entity: &SerializedEntity,
        _durability: Durability,
    ) -> Result<(), PersistenceError> {
        self.entries
            .lock()
            .expect("lock poisoned")
            .insert(entity.tsid.clone(), entity.clone());
        Ok(())
    }

    async fn del(&self, tsid: &Tsid) -> Result<(), PersistenceError> {
        self.entries.lock().expect("lock poisoned").remove(tsid);
        Ok(())
    }

    async fn close(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;
    use shard_tsid::TypeTag;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let backend = InMemoryBackend::new();
        let mut rng = StdRng::seed_from_u64(1);
        let tsid = Tsid::mint(TypeTag::Item, &mut rng);
        let entity = shard_model::Entity::new(tsid.clone(), json!({"count": 1})).serialize();
        backend.write(&entity, Durability::Durable).await.unwrap();
        let back = backend.read(&tsid).await.unwrap().unwrap();
        assert_eq!(back, entity);
    }

    #[tokio::test]
    async fn del_removes_entry() {
        let backend = InMemoryBackend::new();
        let mut rng = StdRng::seed_from_u64(2);
        let tsid = Tsid::mint(TypeTag::Item, &mut rng);
        let entity = shard_model::Entity::new(tsid.clone(), json!({})).serialize();
        backend.write(&entity, Durability::Durable).await.unwrap();
        backend.del(&tsid).await.unwrap();
        assert!(backend.read(&tsid).await.unwrap().is_none());
    }
}
