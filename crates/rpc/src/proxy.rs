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

use crate::client::RpcClient;
use crate::error::RpcError;
use parking_lot::RwLock;
use serde_json::Value;
use shard_tsid::Tsid;

/// Wraps an entity this shard does not own (spec §4.6 "RPC proxy").
/// Non-function property reads/writes stay local, operating on the
/// objref skeleton snapshotted at load time; a method call is shipped
/// to the owner via `obj(...)` and the caller never sees an RPC error
/// type leak into a plain property access.
pub struct RpcProxy {
    tsid: Tsid,
    skeleton: RwLock<Value>,
    client: RpcClient,
    local_gsid: String,
}

impl RpcProxy {
    pub fn new(tsid: Tsid, skeleton: Value, client: RpcClient, local_gsid: String) -> Self {
        Self {
            tsid,
            skeleton: RwLock::new(skeleton),
            client,
            local_gsid,
        }
    }

    pub fn tsid(&self) -> &Tsid {
        &self.tsid
    }

    /// Local, non-function property read (spec §4.6 "Non-function
    /// property reads/writes are local").
    pub fn get_local(&self, key: &str) -> Option<Value> {
        self.skeleton.read().get(key).cloned()
    }

    /// Local, non-function property write.
    pub fn set_local(&self, key: &str, value: Value) {
        if let Value::Object(map) = &mut *self.skeleton.write() {
            map.insert(key.to_string(), value);
        }
    }

    /// Applies an arbitrary local mutation to the skeleton (spec §4.6
    /// "operate on the objref skeleton kept in memory"). Used by the
    /// objref resolver's generic `set`/`delete`, which mutate by closure
    /// rather than by single key.
    pub fn mutate_local(&self, mutator: Box<dyn FnOnce(&mut Value) + Send>) {
        mutator(&mut self.skeleton.write());
    }

    /// The whole in-memory skeleton (spec §4.6 "operate on the objref
    /// skeleton kept in memory"). Used by the objref resolver when a
    /// proxy itself is the resolution target of a `get`/`has`/`keys`
    /// call — those reads stay local by construction, never crossing
    /// the network.
    pub fn skeleton(&self) -> Value {
        self.skeleton.read().clone()
    }

    /// Ships a method invocation to the owning shard via `obj(...)`
    /// (spec §4.6). `undefined`/absent results are normalized to JSON
    /// `null` by the server before they reach here (spec §4.6, §8
    /// scenario 4); this method passes the value through unchanged.
    pub async fn call(&self, function_name: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        self.client
            .send_obj_request(&self.local_gsid, &self.tsid, function_name, args)
            .await
    }
}
