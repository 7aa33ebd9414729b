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

//! The request engine, Request Context, live-object cache, and unload
//! policy (spec §4.2–§4.4, §4.6 dispatch): the piece that turns a TSID
//! and a closure into a serialized, persisted mutation.

mod context;
mod dispatch_impl;
mod entity_cell;
mod error;
mod live_cache;
mod queue;
mod unload;

pub use context::{get_context, owner, set_dirty, set_unload, tag};
pub use dispatch_impl::{NoScriptHost, ObjDispatcher, ScriptHost};
pub use entity_cell::EntityCell;
pub use error::CacheError;
pub use live_cache::{LifecycleHooks, LiveObjectCache, LoadedEntity, NoopHooks};
pub use queue::{
    NoopOutboundFlush, OnDone, OutboundFlush, PushOptions, RequestFn, RequestQueue,
    RequestQueueRegistry, RequestResult,
};
pub use unload::{check_unload, enqueue_unload, spawn_location_unload_timer};
