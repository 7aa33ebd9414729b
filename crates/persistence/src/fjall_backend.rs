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
use fjall::{Config, PartitionCreateOptions, PartitionHandle, PersistMode};
use shard_model::SerializedEntity;
use shard_tsid::Tsid;
use std::path::Path;

/// Default on-disk persistence backend: one LSM-tree partition ("entities")
/// keyed by the TSID string, valued by the JSON-encoded `SerializedEntity`
/// (spec §6 "One JSON blob per entity, keyed by TSID").
///
/// `fjall` is synchronous; every call here runs on a blocking-pool thread
/// via `tokio::task::spawn_blocking` so the owning queue's async worker
/// never stalls the runtime (spec §5 "suspension points").
pub struct FjallBackend {
    partition: PartitionHandle,
}

impl FjallBackend {
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        let keyspace = Config::new(path)
            .open()
            .map_err(|e| PersistenceError::ReadFailed {
                tsid: Tsid::parse("L0").expect("constant tsid always parses"),
                message: format!("failed to open fjall keyspace at {path:?}: {e}"),
            })?;
        let partition = keyspace
            .open_partition("entities", PartitionCreateOptions::default())
            .map_err(|e| PersistenceError::ReadFailed {
                tsid: Tsid::parse("L0").expect("constant tsid always parses"),
                message: format!("failed to open entities partition: {e}"),
            })?;
        Ok(Self { partition })
    }
}

#[async_trait]
impl PersistenceBackend for FjallBackend {
    async fn read(&self, tsid: &Tsid) -> Result<Option<SerializedEntity>, PersistenceError> {
        let partition = self.partition.clone();
        let key = tsid.as_str().to_string();
        let tsid = tsid.clone();
        tokio::task::spawn_blocking(move || {
            let raw = partition.get(&key).map_err(|e| PersistenceError::ReadFailed {
                tsid: tsid.clone(),
                message: e.to_string(),
            })?;
            match raw {
                None => Ok(None),
                Some(bytes) => {
                    let entity: SerializedEntity =
                        serde_json::from_slice(&bytes).map_err(|e| PersistenceError::ReadFailed {
                            tsid: tsid.clone(),
                            message: format!("corrupt entity body: {e}"),
                        })?;
                    Ok(Some(entity))
                }
            }
        })
        .await
        .expect("blocking read task panicked")
    }

    async fn write(
        &self,
        entity: &SerializedEntity,
        durability: Durability,
    ) -> Result<(), PersistenceError> {
        let partition = self.partition.clone();
        let key = entity.tsid.as_str().to_string();
        let tsid = entity.tsid.clone();
        let bytes = serde_json::to_vec(entity).map_err(|e| PersistenceError::WriteFailed {
            tsid: tsid.clone(),
            message: format!("could not encode entity: {e}"),
        })?;
        tokio::task::spawn_blocking(move || {
            partition
                .insert(&key, bytes)
                .map_err(|e| PersistenceError::WriteFailed {
                    tsid: tsid.clone(),
                    message: e.to_string(),
                })?;
            if durability == Durability::Durable {
                partition
                    .inner()
                    .persist(PersistMode::SyncAll)
                    .map_err(|e| PersistenceError::WriteFailed {
                        tsid,
                        message: format!("fsync failed: {e}"),
                    })?;
            }
            Ok(())
        })
        .await
        .expect("blocking write task panicked")
    }

    async fn del(&self, tsid: &Tsid) -> Result<(), PersistenceError> {
        let partition = self.partition.clone();
        let key = tsid.as_str().to_string();
        let tsid = tsid.clone();
        tokio::task::spawn_blocking(move || {
            partition
                .remove(&key)
                .map_err(|e| PersistenceError::DeleteFailed {
                    tsid: tsid.clone(),
                    message: e.to_string(),
                })
        })
        .await
        .expect("blocking delete task panicked")
    }

    async fn close(&self) -> Result<(), PersistenceError> {
        let partition = self.partition.clone();
        tokio::task::spawn_blocking(move || {
            partition.inner().persist(PersistMode::SyncAll).map_err(|e| {
                tracing::error!("fjall backend close failed: {e}");
                PersistenceError::Closed
            })
        })
        .await
        .expect("blocking close task panicked")
    }
}
