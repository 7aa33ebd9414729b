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

use shard_model::ModelError;
use shard_objref::ObjrefError;
use shard_persistence::PersistenceError;
use shard_rpc::RpcError;
use shard_tsid::Tsid;

/// Spec §7 taxonomy entries owned (or routed through) the cache/request
/// engine: `NotFound`, `ObjRefError`, `PersistenceError`, plus the
/// request-engine-specific conditions §4.2–§4.4 call out by name.
#[derive(Debug, thiserror::Error, Clone)]
pub enum CacheError {
    /// A request body closure panicked; the worker survives (spec §7
    /// "uncaught exceptions... do not poison the worker") and reports
    /// this as the request's own error rather than crashing the queue.
    #[error("request body panicked: {0}")]
    Panicked(String),
    /// Spec §7 "NotFound — requested TSID absent from both cache and
    /// store. Surfaced to the caller of `get`."
    #[error("entity {0} not found")]
    NotFound(Tsid),
    #[error("entity {0} already exists")]
    AlreadyExists(Tsid),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Objref(#[from] ObjrefError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    /// Spec §4.3 "`getContext()` — fails if called outside a request."
    #[error("no request context is active on this task")]
    OutsideRequestContext,
    /// Spec §4.2, §8 "Enqueue after `close=true` rejects with an explicit
    /// error."
    #[error("request queue for owner {0} is closed")]
    QueueClosed(Tsid),
    /// An entity reachable only through a local ownership chain
    /// (spec §3 "Ownership") turned out to be a remote RPC proxy; this
    /// shard was asked to dispatch work it does not own.
    #[error("entity {0} is not locally owned")]
    NotLocallyOwned(Tsid),
    /// Spec §4.6 ownership-chain walk (e.g. an item's container) found
    /// no terminating top-level owner within a bounded number of hops.
    #[error("could not resolve an owning root for {0}")]
    OwnershipUnresolved(Tsid),
    #[error("local tsid minting exhausted its retry budget for type {0}")]
    MintExhausted(shard_tsid::TypeTag),
    /// The out-of-scope gameplay script layer (spec §1 Non-goals) has no
    /// implementation wired in for this call.
    #[error("no script host is configured for method {0}")]
    ScriptUnavailable(String),
}
