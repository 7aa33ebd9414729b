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
use serde_json::Value;
use shard_model::variants::{ContainerItemBody, LocationBody, PlayerBody};
use shard_tsid::Tsid;
use std::sync::Arc;
use std::time::Duration;

/// Spec §4.4 "Unload policy": permissible when no connected player is
/// present and no contained item has an active growing/running timer.
/// Only direct `location.items` entries are inspected — this crate has
/// no reverse index from a bag to the items it holds, so a bag's own
/// `has_active_timer` stands in for "anything inside this bag is still
/// busy" (see DESIGN.md).
pub async fn check_unload(cache: &LiveObjectCache, location: &Tsid) -> Result<bool, CacheError> {
    let cell = match cache.get(location).await? {
        LoadedEntity::Local(cell) => cell,
        // Not locally owned: not this shard's call to make.
        LoadedEntity::Remote(_) => return Ok(false),
    };
    let location_body = cell.with(|e| LocationBody::from_value(e.body()))?;

    for player_tsid in location_body.players.keys() {
        if let Ok(LoadedEntity::Local(player_cell)) = cache.get(player_tsid).await {
            let active = player_cell
                .with(|e| PlayerBody::from_value(e.body()).map(|p| p.active))
                .unwrap_or(false);
            if active {
                return Ok(false);
            }
        }
    }

    for item_tsid in location_body.items.keys() {
        if let Ok(LoadedEntity::Local(item_cell)) = cache.get(item_tsid).await {
            let busy = item_cell
                .with(|e| ContainerItemBody::from_value(e.body()).map(|c| c.has_active_timer))
                .unwrap_or(false);
            if busy {
                return Ok(false);
            }
        }
    }

    Ok(true)
}

/// Spec §4.4 "a special `unload` request is enqueued with `close=true`.
/// The request cascades: each contained item's `unload` is called first
/// (to stop timers), the player backref set is cleared, the location and
/// its geometry are added to the RC's unload set. After commit the queue
/// is destroyed."
pub fn enqueue_unload(
    registry: &RequestQueueRegistry,
    cache: Arc<LiveObjectCache>,
    location: Tsid,
) -> Result<(), CacheError> {
    let queue = registry.get_or_create(location.clone());

    let body: RequestFn = Box::new(move || {
        Box::pin(async move {
            let cell = match cache.get(&location).await? {
                LoadedEntity::Local(cell) => cell,
                LoadedEntity::Remote(_) => return Err(CacheError::NotLocallyOwned(location.clone())),
            };
            let location_body = cell.with(|e| LocationBody::from_value(e.body()))?;
            let geometry = location_body.geometry.clone();

            for item_tsid in location_body.items.keys() {
                if let LoadedEntity::Local(item_cell) = cache.get(item_tsid).await? {
                    let stopped = item_cell.with_mut(|e| -> Result<(), CacheError> {
                        let mut item = ContainerItemBody::from_value(e.body())?;
                        item.has_active_timer = false;
                        *e.body_mut() = item.to_value();
                        e.touch();
                        Ok(())
                    });
                    stopped?;
                    context::set_dirty(item_cell)?;
                }
            }

            cell.with_mut(|e| -> Result<(), CacheError> {
                let mut lb = LocationBody::from_value(e.body())?;
                lb.players.clear();
                *e.body_mut() = lb.to_value();
                e.touch();
                Ok(())
            })?;
            context::set_dirty(cell.clone())?;
            context::set_unload(cell)?;

            if let LoadedEntity::Local(geo_cell) = cache.get(&geometry).await? {
                context::set_unload(geo_cell)?;
            }

            Ok(Value::Null)
        })
    });

    let on_done: OnDone = Box::new(|result| {
        if let Err(err) = result {
            tracing::warn!(error = %err, "location unload request failed");
        }
    });

    queue.push(
        "unload",
        body,
        on_done,
        PushOptions {
            close: true,
            wait_for_pers: true,
        },
    )
}

/// Spec §4.4 "Locations run a periodic self-check (`checkUnload`) via an
/// internal timer." Runs until an unload is successfully enqueued (the
/// queue is about to be destroyed) or the handle is dropped/aborted.
///
/// `check_unload` reads entities through the cache, which requires an
/// ambient [`crate::context`] request context (`cache.get()` starts with
/// `context::rc_local_get`). A bare `tokio::spawn` has no such context —
/// task-locals do not cross a spawn boundary — so the check is itself
/// pushed onto the location's own queue as a non-closing request; the
/// queue worker installs the request context via `context::scope` the
/// same way it does for every other request (spec §4.2 step 1–2).
pub fn spawn_location_unload_timer(
    registry: Arc<RequestQueueRegistry>,
    cache: Arc<LiveObjectCache>,
    location: Tsid,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;

            let queue = registry.get_or_create(location.clone());
            let cache_for_check = cache.clone();
            let location_for_check = location.clone();
            let body: RequestFn = Box::new(move || {
                Box::pin(async move {
                    let permissible = check_unload(&cache_for_check, &location_for_check).await?;
                    Ok(Value::Bool(permissible))
                })
            });
            let (tx, rx) = tokio::sync::oneshot::channel();
            let on_done: OnDone = Box::new(move |result| {
                let _ = tx.send(result);
            });
            if queue
                .push("check-unload", body, on_done, PushOptions::default())
                .is_err()
            {
                // Queue already draining or gone (e.g. an unload from a
                // previous tick already committed); nothing left to check.
                break;
            }

            match rx.await {
                Ok(Ok(Value::Bool(true))) => {
                    match enqueue_unload(&registry, cache.clone(), location.clone()) {
                        Ok(()) => break,
                        Err(err) => {
                            tracing::warn!(location = %location, error = %err, "failed to enqueue unload");
                        }
                    }
                }
                Ok(Ok(_)) => {}
                Ok(Err(err)) => {
                    tracing::warn!(location = %location, error = %err, "checkUnload failed");
                }
                Err(_) => {
                    tracing::warn!(location = %location, "check-unload request was dropped without a result");
                }
            }
        }
    })
}
