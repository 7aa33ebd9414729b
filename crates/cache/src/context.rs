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

use crate::entity_cell::EntityCell;
use crate::error::CacheError;
use crate::live_cache::LoadedEntity;
use shard_tsid::Tsid;
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Spec §4.3: "cache, dirty, unload maps plus tag and owner". Held behind
/// a `RefCell` rather than threaded explicitly through every call, per
/// Design Notes §9's "ambient state" framing — see [`scope`].
pub(crate) struct Inner {
    pub cache: HashMap<Tsid, LoadedEntity>,
    pub dirty: HashMap<Tsid, Arc<EntityCell>>,
    pub unload: HashMap<Tsid, Arc<EntityCell>>,
    pub tag: String,
    pub owner: Tsid,
}

impl Inner {
    fn new(owner: Tsid, tag: String) -> Self {
        Self {
            cache: HashMap::new(),
            dirty: HashMap::new(),
            unload: HashMap::new(),
            tag,
            owner,
        }
    }
}

tokio::task_local! {
    static CURRENT: RefCell<Option<Inner>>;
}

/// Installs a fresh Request Context as the ambient context for `fut`
/// (spec §4.2 steps 1–2: "Allocate a fresh Request Context... Install the
/// RC as the ambient context for the worker"). Only `RequestQueue`'s
/// worker loop calls this.
pub(crate) async fn scope<F: Future>(owner: Tsid, tag: String, fut: F) -> F::Output {
    CURRENT
        .scope(RefCell::new(Some(Inner::new(owner, tag))), fut)
        .await
}

/// Spec §4.3 "`getContext()` — fails if called outside a request." Exposed
/// as a guard rather than a raw accessor: callers that just need `tag`/
/// `owner` should prefer [`tag`]/[`owner`].
pub fn get_context() -> Result<(), CacheError> {
    CURRENT
        .try_with(|_| ())
        .map_err(|_| CacheError::OutsideRequestContext)
}

pub fn tag() -> Result<String, CacheError> {
    with_inner(|inner| inner.tag.clone())
}

pub fn owner() -> Result<Tsid, CacheError> {
    with_inner(|inner| inner.owner.clone())
}

/// Tier 1 of spec §4.4's lookup order: "If the current RC has the TSID in
/// its cache, return it."
pub(crate) fn rc_local_get(tsid: &Tsid) -> Result<Option<LoadedEntity>, CacheError> {
    with_inner(|inner| inner.cache.get(tsid).cloned())
}

/// Registers an entity in the RC cache (spec §4.4 tiers 2 and 3: "register
/// it in the RC cache").
pub(crate) fn rc_local_insert(tsid: Tsid, loaded: LoadedEntity) -> Result<(), CacheError> {
    with_inner_mut(|inner| {
        inner.cache.insert(tsid, loaded);
    })
}

/// Spec §4.3 "`setDirty(obj)` — idempotent; does not re-add identical
/// entries." `HashMap::entry().or_insert` already gives us that: a second
/// `setDirty` on the same TSID is a no-op.
pub fn set_dirty(cell: Arc<EntityCell>) -> Result<(), CacheError> {
    with_inner_mut(|inner| {
        inner.dirty.entry(cell.tsid().clone()).or_insert(cell);
    })
}

/// Spec §4.3 "`setUnload(obj)` — adds to unload set; implies release
/// after commit."
pub fn set_unload(cell: Arc<EntityCell>) -> Result<(), CacheError> {
    with_inner_mut(|inner| {
        inner.unload.entry(cell.tsid().clone()).or_insert(cell);
    })
}

/// Drains the dirty and unload sets for the commit phase (spec §4.2 step
/// 4). Only `RequestQueue::run_one` calls this, after `fn` has returned.
pub(crate) fn take_dirty_and_unload(
) -> Result<(HashMap<Tsid, Arc<EntityCell>>, HashMap<Tsid, Arc<EntityCell>>), CacheError> {
    with_inner_mut(|inner| {
        (
            std::mem::take(&mut inner.dirty),
            std::mem::take(&mut inner.unload),
        )
    })
}

fn with_inner<R>(f: impl FnOnce(&Inner) -> R) -> Result<R, CacheError> {
    CURRENT
        .try_with(|cell| {
            let guard = cell.borrow();
            let inner = guard.as_ref().expect("request context scope is active");
            f(inner)
        })
        .map_err(|_| CacheError::OutsideRequestContext)
}

fn with_inner_mut<R>(f: impl FnOnce(&mut Inner) -> R) -> Result<R, CacheError> {
    CURRENT
        .try_with(|cell| {
            let mut guard = cell.borrow_mut();
            let inner = guard.as_mut().expect("request context scope is active");
            f(inner)
        })
        .map_err(|_| CacheError::OutsideRequestContext)
}
