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

use crate::context;
use crate::entity_cell::EntityCell;
use crate::error::CacheError;
use async_trait::async_trait;
use serde_json::Value;
use shard_model::variants::{ContainerItemBody, DataContainerBody, PlayerBody, QuestBody};
use shard_model::Entity;
use shard_persistence::PersistenceBackend;
use shard_rpc::{RpcClient, RpcProxy, ShardId, ShardTable};
use shard_tsid::{Tsid, TypeTag};
use std::sync::Arc;

/// How many candidate TSIDs `create` tries before giving up on a
/// top-level type that must hash back to this shard (spec §4.6 "bounded
/// retries").
const LOCAL_TSID_MINT_ATTEMPTS: u32 = 10_000;

/// What an in-process `get` actually produced (spec §4.4's third tier:
/// either a live local instance, or — "if the Shard Router determines the
/// TSID belongs to another shard" — an RPC proxy that is never placed in
/// the process-wide cache).
#[derive(Clone)]
pub enum LoadedEntity {
    Local(Arc<EntityCell>),
    Remote(Arc<RpcProxy>),
}

impl LoadedEntity {
    pub fn tsid(&self) -> &Tsid {
        match self {
            LoadedEntity::Local(cell) => cell.tsid(),
            LoadedEntity::Remote(proxy) => proxy.tsid(),
        }
    }
}

/// Lifecycle hooks the core calls into at load/create time (spec §4.4
/// "call the entity's `gsOnLoad` hook (errors logged, never fatal)").
/// The concrete gameplay script layer is out of scope (spec §1
/// Non-goals); this trait is the narrow interface the cache consumes, so
/// the crate still compiles and is testable against a no-op stand-in.
#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    async fn on_load(&self, _tsid: &Tsid, _body: &Value) {}
    async fn on_create(&self, _tsid: &Tsid, _body: &Value) {}
}

/// The default, gameplay-free implementation used wherever no script
/// host is wired in (tests, and any shard run without `gsjs.config`).
pub struct NoopHooks;

#[async_trait]
impl LifecycleHooks for NoopHooks {}

/// The process-wide live-object cache and its three-tier lookup (spec
/// §4.4). One instance per shard process; shared by every request
/// queue's worker.
pub struct LiveObjectCache {
    process_cache: papaya::HashMap<Tsid, Arc<EntityCell>>,
    rpc_clients: papaya::HashMap<ShardId, RpcClient>,
    persistence: Arc<dyn PersistenceBackend>,
    shard_table: ShardTable,
    hooks: Arc<dyn LifecycleHooks>,
    local_gsid: String,
}

impl LiveObjectCache {
    pub fn new(
        persistence: Arc<dyn PersistenceBackend>,
        shard_table: ShardTable,
        hooks: Arc<dyn LifecycleHooks>,
    ) -> Self {
        let local_gsid = shard_table.local_shard().to_string();
        Self {
            process_cache: papaya::HashMap::new(),
            rpc_clients: papaya::HashMap::new(),
            persistence,
            shard_table,
            hooks,
            local_gsid,
        }
    }

    pub fn shard_table(&self) -> &ShardTable {
        &self.shard_table
    }

    /// Wires a connection to a peer shard's RPC listener, used for both
    /// outbound `obj`/`api` calls and RPC proxy construction (spec §4.6).
    /// Called once per peer shard during daemon startup.
    pub fn register_rpc_client(&self, shard: ShardId, client: RpcClient) {
        self.rpc_clients.pin().insert(shard, client);
    }

    /// Spec §4.4 "Cache contract", three-tier lookup order.
    pub async fn get(&self, tsid: &Tsid) -> Result<LoadedEntity, CacheError> {
        if let Some(loaded) = context::rc_local_get(tsid)? {
            return Ok(loaded);
        }

        if let Some(cell) = self.process_cache.pin().get(tsid).cloned() {
            let loaded = LoadedEntity::Local(cell);
            context::rc_local_insert(tsid.clone(), loaded.clone())?;
            return Ok(loaded);
        }

        // Only top-level types can be routed to a remote shard without
        // first loading anything: their shard is a pure function of the
        // TSID (spec §4.6). Non-top-level types always inherit
        // placement from a container this shard cannot see without
        // loading it first, so they fall through to a local persistence
        // read; a miss there is a genuine NotFound (see DESIGN.md, Open
        // Question (b) discussion).
        if tsid.tag().is_top_level() {
            let shard = self.shard_table.map_to_shard(tsid);
            if !self.shard_table.is_local(&shard) {
                let proxy = Arc::new(self.make_proxy(tsid, &shard, None)?);
                let loaded = LoadedEntity::Remote(proxy);
                context::rc_local_insert(tsid.clone(), loaded.clone())?;
                return Ok(loaded);
            }
        }

        let serialized = self
            .persistence
            .read(tsid)
            .await?
            .ok_or_else(|| CacheError::NotFound(tsid.clone()))?;
        let entity = Entity::from_serialized(serialized)?;
        self.hooks.on_load(tsid, entity.body()).await;
        let cell = Arc::new(EntityCell::new(entity));
        self.process_cache.pin().insert(tsid.clone(), cell.clone());
        let loaded = LoadedEntity::Local(cell);
        context::rc_local_insert(tsid.clone(), loaded.clone())?;
        Ok(loaded)
    }

    fn make_proxy(
        &self,
        tsid: &Tsid,
        shard: &ShardId,
        label: Option<&str>,
    ) -> Result<RpcProxy, CacheError> {
        let client = self
            .rpc_clients
            .pin()
            .get(shard)
            .cloned()
            .ok_or(CacheError::Rpc(shard_rpc::RpcError::ConnectionUnavailable))?;
        let mut skeleton = serde_json::json!({ "tsid": tsid.as_str() });
        if let (Some(label), Value::Object(map)) = (label, &mut skeleton) {
            map.insert("label".to_string(), Value::String(label.to_string()));
        }
        Ok(RpcProxy::new(tsid.clone(), skeleton, client, self.local_gsid.clone()))
    }

    /// Spec §4.4 "`create(type, data)` — mints the instance, asserts the
    /// TSID is not already in cache, marks dirty in the RC, runs
    /// `onCreate`, returns the instance." Must be called from inside a
    /// request (it marks the new entity dirty on the ambient RC).
    pub async fn create(&self, tag: TypeTag, body: Value) -> Result<Arc<EntityCell>, CacheError> {
        context::get_context()?;
        let tsid = if tag.is_top_level() {
            self.shard_table
                .make_local_tsid(tag, &mut rand::rng(), LOCAL_TSID_MINT_ATTEMPTS)
                .ok_or(CacheError::MintExhausted(tag))?
        } else {
            // Non-top-level entities inherit placement from their
            // container (spec §4.6); no shard-table hash is involved.
            Tsid::mint(tag, &mut rand::rng())
        };

        if self.process_cache.pin().get(&tsid).is_some() {
            return Err(CacheError::AlreadyExists(tsid));
        }

        let entity = Entity::new(tsid.clone(), body);
        self.hooks.on_create(&tsid, entity.body()).await;
        let cell = Arc::new(EntityCell::new(entity));
        self.process_cache.pin().insert(tsid.clone(), cell.clone());
        context::rc_local_insert(tsid.clone(), LoadedEntity::Local(cell.clone()))?;
        context::set_dirty(cell.clone())?;
        Ok(cell)
    }

    /// Walks an entity's ownership chain up to the top-level root that
    /// keys its request queue (spec §3 "Ownership"): a player's owner is
    /// its location; an item/bag's owner is its container, recursively;
    /// a quest/data-container's owner is its `owner` field; a location,
    /// group, or the geometry paired with a location, is itself the
    /// root. Every hop in the chain must already be locally owned — this
    /// is used to route an already-locally-addressed RPC `obj()` call to
    /// the right request queue, never to discover a remote owner.
    pub async fn resolve_queue_owner(&self, tsid: &Tsid) -> Result<Tsid, CacheError> {
        let mut current = tsid.clone();
        for _ in 0..32 {
            match current.tag() {
                TypeTag::Location | TypeTag::Group => return Ok(current),
                TypeTag::Geometry => {
                    return Ok(Tsid::with_tag_and_suffix(TypeTag::Location, current.suffix()))
                }
                TypeTag::Player => {
                    let body = self.local_body(&current).await?;
                    let player = PlayerBody::from_value(&body)?;
                    current = player
                        .location
                        .ok_or_else(|| CacheError::OwnershipUnresolved(current.clone()))?;
                }
                TypeTag::Item | TypeTag::Bag => {
                    let body = self.local_body(&current).await?;
                    let item = ContainerItemBody::from_value(&body)?;
                    current = item.container;
                }
                TypeTag::Quest => {
                    let body = self.local_body(&current).await?;
                    let quest: QuestBody = serde_json::from_value(body)
                        .map_err(|e| shard_model::ModelError::MalformedBody(e.to_string()))?;
                    current = quest.owner;
                }
                TypeTag::DataContainer => {
                    let body = self.local_body(&current).await?;
                    let dc: DataContainerBody = serde_json::from_value(body)
                        .map_err(|e| shard_model::ModelError::MalformedBody(e.to_string()))?;
                    current = dc.owner;
                }
            }
        }
        Err(CacheError::OwnershipUnresolved(tsid.clone()))
    }

    /// Releases an entity from the process-wide cache after a commit
    /// phase has marked it for unload (spec §4.2 step 5). Safe to call
    /// for an entity that was never in the cache.
    pub fn evict(&self, tsid: &Tsid) {
        self.process_cache.pin().remove(tsid);
    }

    async fn local_body(&self, tsid: &Tsid) -> Result<Value, CacheError> {
        match self.get(tsid).await? {
            LoadedEntity::Local(cell) => Ok(cell.with(|e| e.body().clone())),
            LoadedEntity::Remote(_) => Err(CacheError::NotLocallyOwned(tsid.clone())),
        }
    }
}
