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
use crate::error::CacheError;
use crate::live_cache::{LiveObjectCache, LoadedEntity};
use crate::queue::{OnDone, PushOptions, RequestFn, RequestQueueRegistry};
use async_trait::async_trait;
use serde_json::Value;
use shard_objref::{EntityResolver, ObjrefError};
use shard_rpc::{json_rpc_codes, GlobalApiDispatch, LocalObjectDispatch, RpcError};
use shard_tsid::Tsid;
use std::sync::Arc;

#[async_trait]
impl EntityResolver for LiveObjectCache {
    /// Spec §4.5 "reading any other attribute triggers a cache
    /// `get(tsid)`... this may cross shards via RPC." A remote target's
    /// body is its in-memory skeleton (spec §4.6), never a fresh
    /// network fetch of the whole entity.
    async fn resolve_body(&self, tsid: &Tsid) -> Result<Value, ObjrefError> {
        let loaded = self.get(tsid).await.map_err(|e| to_objref_error(tsid, e))?;
        Ok(match loaded {
            LoadedEntity::Local(cell) => cell.with(|e| e.body().clone()),
            LoadedEntity::Remote(proxy) => proxy.skeleton(),
        })
    }

    /// Spec §4.5 "writes and deletes target the loaded entity." A local
    /// mutation marks the entity dirty on the ambient RC so the owning
    /// queue's commit phase persists it; a remote mutation stays on the
    /// proxy's in-memory skeleton (spec §4.6).
    async fn mutate_body(
        &self,
        tsid: &Tsid,
        mutator: Box<dyn FnOnce(&mut Value) + Send>,
    ) -> Result<(), ObjrefError> {
        let loaded = self.get(tsid).await.map_err(|e| to_objref_error(tsid, e))?;
        match loaded {
            LoadedEntity::Local(cell) => {
                cell.with_mut(|e| {
                    mutator(e.body_mut());
                    e.touch();
                });
                context::set_dirty(cell).map_err(|e| to_objref_error(tsid, e))?;
            }
            LoadedEntity::Remote(proxy) => proxy.mutate_local(mutator),
        }
        Ok(())
    }
}

fn to_objref_error(tsid: &Tsid, err: CacheError) -> ObjrefError {
    match err {
        CacheError::NotFound(t) => ObjrefError::NotFound(t),
        other => ObjrefError::LoadFailed {
            tsid: tsid.clone(),
            message: other.to_string(),
        },
    }
}

/// Invokes gameplay script functions (spec §4.6 `obj`/`api`) on behalf
/// of the request engine. The concrete scripting layer is out of scope
/// (spec §1 Non-goals); this is the seam `ObjDispatcher` calls into.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    async fn invoke_method(
        &self,
        caller_gsid: &str,
        tsid: &Tsid,
        function_name: &str,
        args: Vec<Value>,
    ) -> Result<Value, CacheError>;

    async fn invoke_api(&self, function_name: &str, args: Vec<Value>) -> Result<Value, CacheError>;
}

/// Used where no script host is wired in. Every call fails with
/// [`CacheError::ScriptUnavailable`], which the RPC layer reports back
/// to the caller as a `METHOD_NOT_FOUND` remote error.
pub struct NoScriptHost;

#[async_trait]
impl ScriptHost for NoScriptHost {
    async fn invoke_method(
        &self,
        _caller_gsid: &str,
        _tsid: &Tsid,
        function_name: &str,
        _args: Vec<Value>,
    ) -> Result<Value, CacheError> {
        Err(CacheError::ScriptUnavailable(function_name.to_string()))
    }

    async fn invoke_api(&self, function_name: &str, _args: Vec<Value>) -> Result<Value, CacheError> {
        Err(CacheError::ScriptUnavailable(function_name.to_string()))
    }
}

/// Bridges incoming `obj(...)`/`api(...)` RPC requests (spec §4.6) to
/// the owning request queue and the script host. Registered with
/// `RpcServer` as its `LocalObjectDispatch`/`GlobalApiDispatch`.
pub struct ObjDispatcher {
    cache: Arc<LiveObjectCache>,
    registry: Arc<RequestQueueRegistry>,
    script: Arc<dyn ScriptHost>,
}

impl ObjDispatcher {
    pub fn new(
        cache: Arc<LiveObjectCache>,
        registry: Arc<RequestQueueRegistry>,
        script: Arc<dyn ScriptHost>,
    ) -> Self {
        Self {
            cache,
            registry,
            script,
        }
    }
}

#[async_trait]
impl LocalObjectDispatch for ObjDispatcher {
    /// Spec §4.6 "`obj(callerGsid, tsid, functionName, args[])` — invokes
    /// a method on the named entity in the request context of the
    /// callee." Routes to the owner's queue so the invocation runs
    /// under the same serialization guarantee as any other request
    /// (spec §4.2 "enqueue order = execution order = commit order").
    async fn invoke_obj(
        &self,
        caller_gsid: &str,
        tsid: &Tsid,
        function_name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RpcError> {
        let owner = self
            .cache
            .resolve_queue_owner(tsid)
            .await
            .map_err(to_rpc_error)?;
        let queue = self.registry.get_or_create(owner);

        let (tx, rx) = tokio::sync::oneshot::channel();
        let script = self.script.clone();
        let tsid = tsid.clone();
        let caller_gsid = caller_gsid.to_string();
        let function_name_owned = function_name.to_string();

        let body: RequestFn = Box::new(move || {
            Box::pin(async move {
                script
                    .invoke_method(&caller_gsid, &tsid, &function_name_owned, args)
                    .await
            })
        });
        let on_done: OnDone = Box::new(move |result| {
            let _ = tx.send(result);
        });

        queue
            .push(
                format!("obj:{function_name}"),
                body,
                on_done,
                PushOptions {
                    close: false,
                    wait_for_pers: true,
                },
            )
            .map_err(to_rpc_error)?;

        let result = rx
            .await
            .map_err(|_| RpcError::Io("request queue dropped the response channel".to_string()))?;
        result.map_err(to_rpc_error)
    }
}

#[async_trait]
impl GlobalApiDispatch for ObjDispatcher {
    /// Spec §4.6 "`api(functionName, args[])` — invokes a global
    /// script-layer API call." Not tied to any one owner's queue.
    async fn invoke_api(&self, function_name: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        self.script
            .invoke_api(function_name, args)
            .await
            .map_err(to_rpc_error)
    }
}

fn to_rpc_error(err: CacheError) -> RpcError {
    let code = match &err {
        CacheError::NotFound(_) | CacheError::ScriptUnavailable(_) => {
            json_rpc_codes::METHOD_NOT_FOUND
        }
        _ => json_rpc_codes::INTERNAL_ERROR,
    };
    RpcError::Remote {
        code,
        message: err.to_string(),
        stack: None,
    }
}
