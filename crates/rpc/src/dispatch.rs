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

use crate::error::RpcError;
use async_trait::async_trait;
use serde_json::Value;
use shard_tsid::Tsid;

/// What an `RpcServer` calls into to serve an incoming `obj(...)`
/// request (spec §4.6): "invokes a method on the named entity in the
/// request context of the callee". Implemented by `shard-cache`'s
/// request engine; kept as a trait here so `shard-rpc` never depends on
/// `shard-cache` (the cache depends on this crate for `ShardTable` and
/// `RpcProxy`, so the reverse edge would cycle).
#[async_trait]
pub trait LocalObjectDispatch: Send + Sync {
    async fn invoke_obj(
        &self,
        caller_gsid: &str,
        tsid: &Tsid,
        function_name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RpcError>;
}

/// What an `RpcServer` calls into to serve an incoming `api(...)`
/// request (spec §4.6): "invokes a global script-layer API call".
#[async_trait]
pub trait GlobalApiDispatch: Send + Sync {
    async fn invoke_api(&self, function_name: &str, args: Vec<Value>) -> Result<Value, RpcError>;
}
