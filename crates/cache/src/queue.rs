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
use crate::live_cache::LiveObjectCache;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde_json::Value;
use shard_persistence::{Durability, PersistenceBackend};
use shard_tsid::Tsid;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What a request body returns on success (spec §4.2 "`onDone(err, res)`").
pub type RequestResult = Result<Value, CacheError>;

/// The opaque request body (spec §4.2 "`fn` is an opaque closure"). Takes
/// no arguments: a request reaches the cache, RPC, and whatever else it
/// needs through the ambient [`context`] and its own captured state.
pub type RequestFn = Box<dyn FnOnce() -> BoxFuture<'static, RequestResult> + Send>;

/// Spec §4.2 "`onDone(err, res)` is invoked once". Plain, synchronous —
/// matching the contract that a throwing `onDone` is logged, not
/// propagated (step 7).
pub type OnDone = Box<dyn FnOnce(RequestResult) + Send>;

/// Spec §4.2 `opts` on `rq.push`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PushOptions {
    /// Spec §4.2 "`opts.close=true` flips the queue into a draining
    /// state that refuses further enqueues after this item."
    pub close: bool,
    /// Spec §4.3 "`run(fn, onDone, waitForPers=false)`": when true,
    /// `onDone` waits for the persistence gateway; when false, `onDone`
    /// fires after the in-memory mutation and persistence runs
    /// detached.
    pub wait_for_pers: bool,
}

struct QueueItem {
    tag: String,
    body: RequestFn,
    on_done: OnDone,
    opts: PushOptions,
}

/// Flushes per-player outbound diffs after a successful commit (spec
/// §4.2 step 6, detailed in §4.7). The session layer that owns player
/// sockets is out of scope for this crate; this trait is the seam so
/// the request engine never depends on it directly.
#[async_trait]
pub trait OutboundFlush: Send + Sync {
    async fn flush_after_commit(&self, owner: &Tsid);
}

/// Used where no session layer is wired in (tests, and any queue whose
/// owner never hosts players, e.g. a pure Group).
pub struct NoopOutboundFlush;

#[async_trait]
impl OutboundFlush for NoopOutboundFlush {
    async fn flush_after_commit(&self, _owner: &Tsid) {}
}

/// A single work owner's FIFO queue (spec §4.2 "single FIFO queue with a
/// single active worker"). Cheaply cloneable; the sender side is handed
/// out to callers, the receiver is consumed by the one spawned worker
/// task.
#[derive(Clone)]
pub struct RequestQueue {
    owner: Tsid,
    sender: flume::Sender<QueueItem>,
    closed: Arc<AtomicBool>,
}

impl RequestQueue {
    /// Spec §4.2 "`rq.push(tag, fn, onDone, opts)`". Rejects with
    /// [`CacheError::QueueClosed`] once a prior push set `opts.close`.
    pub fn push(
        &self,
        tag: impl Into<String>,
        body: RequestFn,
        on_done: OnDone,
        opts: PushOptions,
    ) -> Result<(), CacheError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::QueueClosed(self.owner.clone()));
        }
        if opts.close {
            self.closed.store(true, Ordering::Release);
        }
        let item = QueueItem {
            tag: tag.into(),
            body,
            on_done,
            opts,
        };
        self.sender
            .send(item)
            .map_err(|_| CacheError::QueueClosed(self.owner.clone()))
    }

    /// Spec §4.2 "`rq.length()` — observable depth."
    pub fn length(&self) -> usize {
        self.sender.len()
    }

    pub fn owner(&self) -> &Tsid {
        &self.owner
    }
}

type WorkerOutcome = (RequestResult, HashMap<Tsid, Arc<EntityCell>>, HashMap<Tsid, Arc<EntityCell>>);

/// Registry of every live queue in this process (one per loaded
/// top-level owner), plus the shared plumbing each worker needs. Owned
/// by the daemon and handed to every place that enqueues requests.
pub struct RequestQueueRegistry {
    queues: papaya::HashMap<Tsid, RequestQueue>,
    cache: Arc<LiveObjectCache>,
    persistence: Arc<dyn PersistenceBackend>,
    outbound: Arc<dyn OutboundFlush>,
    soft_timeout: Duration,
}

impl RequestQueueRegistry {
    pub fn new(
        cache: Arc<LiveObjectCache>,
        persistence: Arc<dyn PersistenceBackend>,
        outbound: Arc<dyn OutboundFlush>,
        soft_timeout: Duration,
    ) -> Self {
        Self {
            queues: papaya::HashMap::new(),
            cache,
            persistence,
            outbound,
            soft_timeout,
        }
    }

    /// Returns the existing queue for `owner`, or spawns a fresh one
    /// (spec §4.2 "for every work owner... a single FIFO queue with a
    /// single active worker").
    pub fn get_or_create(&self, owner: Tsid) -> RequestQueue {
        if let Some(queue) = self.queues.pin().get(&owner) {
            if !queue.closed.load(Ordering::Acquire) {
                return queue.clone();
            }
        }
        let (sender, receiver) = flume::unbounded();
        let queue = RequestQueue {
            owner: owner.clone(),
            sender,
            closed: Arc::new(AtomicBool::new(false)),
        };
        self.queues.pin().insert(owner.clone(), queue.clone());
        let worker = Worker {
            owner,
            cache: self.cache.clone(),
            persistence: self.persistence.clone(),
            outbound: self.outbound.clone(),
            soft_timeout: self.soft_timeout,
        };
        tokio::spawn(worker.run(receiver));
        queue
    }

    /// Spec §5 "shard shutdown invokes queue drain on all queues": pushes
    /// a closing no-op onto every open queue and waits for its worker to
    /// finish whatever was already enqueued ahead of it, so nothing is
    /// lost when the process exits. Queues that have already drained
    /// themselves (e.g. a location unload) are skipped.
    pub async fn shutdown(&self) {
        let queues: Vec<RequestQueue> = self.queues.pin().values().cloned().collect();
        let mut waiters = Vec::with_capacity(queues.len());
        for queue in queues {
            if queue.closed.load(Ordering::Acquire) {
                continue;
            }
            let (tx, rx) = tokio::sync::oneshot::channel();
            let on_done: OnDone = Box::new(move |result| {
                let _ = tx.send(result);
            });
            let pushed = queue.push(
                "shutdown-drain",
                Box::new(|| Box::pin(async { Ok(Value::Null) })),
                on_done,
                PushOptions {
                    close: true,
                    wait_for_pers: false,
                },
            );
            if pushed.is_ok() {
                waiters.push(rx);
            }
        }
        for rx in waiters {
            let _ = rx.await;
        }
    }
}

/// One request's post-commit work, handed off to the owner's single
/// ordered commit task (spec.md:91 "enqueue order = execution order =
/// commit order") instead of a detached `tokio::spawn` per request —
/// detaching would let two consecutive requests' commits race and land
/// out of order.
struct CommitJob {
    dirty: HashMap<Tsid, Arc<EntityCell>>,
    unload: HashMap<Tsid, Arc<EntityCell>>,
}

struct Worker {
    owner: Tsid,
    cache: Arc<LiveObjectCache>,
    persistence: Arc<dyn PersistenceBackend>,
    outbound: Arc<dyn OutboundFlush>,
    soft_timeout: Duration,
}

impl Worker {
    async fn run(self, receiver: flume::Receiver<QueueItem>) {
        // A single dedicated task drains `commit_rx` strictly in send
        // order, so detaching a request's commit from `onDone` (the
        // `wait_for_pers=false` path below) never reorders this owner's
        // writes relative to one another, even though the requests that
        // produced them may finish their in-memory phase back-to-back.
        let (commit_tx, commit_rx) = flume::unbounded::<CommitJob>();
        let commit_owner = self.owner.clone();
        let cache = self.cache.clone();
        let persistence = self.persistence.clone();
        let outbound = self.outbound.clone();
        tokio::spawn(async move {
            while let Ok(job) = commit_rx.recv_async().await {
                if let Err(err) =
                    Self::commit_with(&persistence, &cache, &job.dirty, &job.unload).await
                {
                    tracing::error!(owner = %commit_owner, error = %err, "detached commit failed");
                    continue;
                }
                outbound.flush_after_commit(&commit_owner).await;
            }
        });

        while let Ok(item) = receiver.recv_async().await {
            let close = item.opts.close;
            self.run_one(item, &commit_tx).await;
            if close {
                break;
            }
        }
    }

    /// Spec §4.2 "Execution procedure", steps 1–7.
    async fn run_one(&self, item: QueueItem, commit_tx: &flume::Sender<CommitJob>) {
        let QueueItem {
            tag,
            body,
            on_done,
            opts,
        } = item;

        let owner = self.owner.clone();
        let scoped = context::scope(owner.clone(), tag, async move {
            let result = body().await;
            let (dirty, unload) = context::take_dirty_and_unload().unwrap_or_default();
            (result, dirty, unload)
        });
        let mut handle = tokio::spawn(scoped);

        let joined = match tokio::time::timeout(self.soft_timeout, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::warn!(
                    owner = %owner,
                    "request exceeded soft timeout; continuing to wait for it"
                );
                (&mut handle).await
            }
        };

        let (body_result, dirty, unload): WorkerOutcome = match joined {
            Ok(triple) => triple,
            Err(join_err) => (
                Err(CacheError::Panicked(join_err.to_string())),
                HashMap::new(),
                HashMap::new(),
            ),
        };

        if opts.wait_for_pers {
            // Spec §4.3 "when `waitForPers` is true, `onDone` is only
            // called after the persistence gateway reports completion".
            let commit_result = self.commit(&dirty, &unload).await;
            let final_result = match (body_result, commit_result) {
                (Ok(v), Ok(())) => Ok(v),
                (Err(e), _) => Err(e),
                (Ok(_), Err(e)) => Err(e),
            };
            if final_result.is_ok() {
                self.outbound.flush_after_commit(&owner).await;
            }
            Self::call_on_done(on_done, final_result);
        } else {
            // Spec §4.3 "when false, `onDone` runs after the in-memory
            // mutations but persistence may still be flushing" — the
            // commit itself is only logged on failure, since there is no
            // second channel back to the original caller. It is handed
            // to this owner's single ordered commit task (not a detached
            // `tokio::spawn`) so this request's write cannot land after a
            // later request's write (spec.md:91 commit order).
            let result_for_on_done = clone_request_result(&body_result);
            Self::call_on_done(on_done, result_for_on_done);
            let _ = commit_tx.send(CommitJob { dirty, unload });
        }
    }

    async fn commit(
        &self,
        dirty: &HashMap<Tsid, Arc<EntityCell>>,
        unload: &HashMap<Tsid, Arc<EntityCell>>,
    ) -> Result<(), CacheError> {
        Self::commit_with(&self.persistence, &self.cache, dirty, unload).await
    }

    /// Spec §4.2 step 4 "call the Persistence Gateway with the dirty set
    /// and unload set"; spec §4.4 "Closing order during commit: all
    /// writes first, then all deletes. On the first write error, deletes
    /// are skipped." Step 5 evicts the unload set only on success.
    async fn commit_with(
        persistence: &Arc<dyn PersistenceBackend>,
        cache: &Arc<LiveObjectCache>,
        dirty: &HashMap<Tsid, Arc<EntityCell>>,
        unload: &HashMap<Tsid, Arc<EntityCell>>,
    ) -> Result<(), CacheError> {
        let mut to_delete = Vec::new();
        for cell in dirty.values() {
            let (serialized, deleted) = cell.with(|e| (e.serialize(), e.is_deleted()));
            if deleted {
                to_delete.push(cell.tsid().clone());
            } else {
                persistence.write(&serialized, Durability::Durable).await?;
            }
        }
        for tsid in &to_delete {
            persistence.del(tsid).await?;
        }
        for cell in unload.values() {
            cache.evict(cell.tsid());
        }
        Ok(())
    }

    /// Spec §4.2 step 7 "exceptions inside `onDone` are logged but do
    /// not poison the worker".
    fn call_on_done(on_done: OnDone, result: RequestResult) {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            on_done(result);
        }));
        if let Err(panic) = outcome {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            tracing::error!(panic = %message, "onDone callback panicked");
        }
    }
}

fn clone_request_result(result: &RequestResult) -> RequestResult {
    match result {
        Ok(v) => Ok(v.clone()),
        Err(e) => Err(e.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live_cache::{LiveObjectCache, NoopHooks};
    use shard_persistence::InMemoryBackend;
    use shard_rpc::{ShardEntry, ShardId, ShardTable};
    use shard_tsid::TypeTag;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::atomic::{AtomicUsize, Ordering as AtOrdering};

    fn table() -> ShardTable {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9000);
        ShardTable::new(
            vec![ShardEntry {
                id: ShardId("s1".into()),
                rpc_addr: addr,
            }],
            ShardId("s1".into()),
        )
    }

    #[tokio::test]
    async fn push_runs_body_and_calls_on_done_in_order() {
        let persistence = Arc::new(InMemoryBackend::default());
        let cache = Arc::new(LiveObjectCache::new(persistence.clone(), table(), Arc::new(NoopHooks)));
        let registry = Arc::new(RequestQueueRegistry::new(
            cache,
            persistence,
            Arc::new(NoopOutboundFlush),
            Duration::from_secs(5),
        ));
        let mut rng = rand::rng();
        let owner = Tsid::mint(TypeTag::Location, &mut rng);
        let queue = registry.get_or_create(owner);

        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        let (tx, rx) = flume::bounded(1);
        queue
            .push(
                "test",
                Box::new(move || {
                    Box::pin(async move {
                        seen2.fetch_add(1, AtOrdering::SeqCst);
                        Ok(Value::Bool(true))
                    })
                }),
                Box::new(move |res| {
                    let _ = tx.send(res);
                }),
                PushOptions::default(),
            )
            .unwrap();

        let res = rx.recv_async().await.unwrap();
        assert_eq!(seen.load(AtOrdering::SeqCst), 1);
        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn close_rejects_further_pushes() {
        let persistence = Arc::new(InMemoryBackend::default());
        let cache = Arc::new(LiveObjectCache::new(persistence.clone(), table(), Arc::new(NoopHooks)));
        let registry = Arc::new(RequestQueueRegistry::new(
            cache,
            persistence,
            Arc::new(NoopOutboundFlush),
            Duration::from_secs(5),
        ));
        let mut rng = rand::rng();
        let owner = Tsid::mint(TypeTag::Location, &mut rng);
        let queue = registry.get_or_create(owner);

        queue
            .push(
                "closing",
                Box::new(|| Box::pin(async { Ok(Value::Null) })),
                Box::new(|_| {}),
                PushOptions {
                    close: true,
                    wait_for_pers: false,
                },
            )
            .unwrap();

        let err = queue
            .push(
                "after-close",
                Box::new(|| Box::pin(async { Ok(Value::Null) })),
                Box::new(|_| {}),
                PushOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, CacheError::QueueClosed(_)));
    }

    #[tokio::test]
    async fn shutdown_drains_pending_work_before_returning() {
        let persistence = Arc::new(InMemoryBackend::default());
        let cache = Arc::new(LiveObjectCache::new(persistence.clone(), table(), Arc::new(NoopHooks)));
        let registry = Arc::new(RequestQueueRegistry::new(
            cache,
            persistence,
            Arc::new(NoopOutboundFlush),
            Duration::from_secs(5),
        ));
        let mut rng = rand::rng();
        let owner = Tsid::mint(TypeTag::Location, &mut rng);
        let queue = registry.get_or_create(owner);

        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        queue
            .push(
                "pending",
                Box::new(move || {
                    Box::pin(async move {
                        seen2.fetch_add(1, AtOrdering::SeqCst);
                        Ok(Value::Null)
                    })
                }),
                Box::new(|_| {}),
                PushOptions::default(),
            )
            .unwrap();

        registry.shutdown().await;
        assert_eq!(seen.load(AtOrdering::SeqCst), 1);
        assert!(matches!(
            queue.push(
                "after-shutdown",
                Box::new(|| Box::pin(async { Ok(Value::Null) })),
                Box::new(|_| {}),
                PushOptions::default(),
            ),
            Err(CacheError::QueueClosed(_))
        ));
    }

    /// Delays only its first `write` call, so a test can force the
    /// commit for an earlier-enqueued request to still be in flight when
    /// a later request's (undelayed) commit would otherwise be ready.
    #[derive(Default)]
    struct DelayFirstWriteBackend {
        inner: InMemoryBackend,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl PersistenceBackend for DelayFirstWriteBackend {
        async fn read(
            &self,
            tsid: &Tsid,
        ) -> Result<Option<shard_model::SerializedEntity>, shard_persistence::PersistenceError>
        {
            self.inner.read(tsid).await
        }

        async fn write(
            &self,
            entity: &shard_model::SerializedEntity,
            durability: Durability,
        ) -> Result<(), shard_persistence::PersistenceError> {
            if self.writes.fetch_add(1, AtOrdering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            self.inner.write(entity, durability).await
        }

        async fn del(&self, tsid: &Tsid) -> Result<(), shard_persistence::PersistenceError> {
            self.inner.del(tsid).await
        }

        async fn close(&self) -> Result<(), shard_persistence::PersistenceError> {
            self.inner.close().await
        }
    }

    /// spec.md:91 "Inside one queue, enqueue order = execution order =
    /// commit order." Two `wait_for_pers=false` requests against the
    /// same owner must still land their writes in enqueue order even
    /// though `onDone` for each fires before its own commit completes,
    /// and the first request's commit is artificially slower than the
    /// second's.
    #[tokio::test]
    async fn detached_commits_preserve_enqueue_order() {
        let persistence = Arc::new(DelayFirstWriteBackend::default());
        let cache = Arc::new(LiveObjectCache::new(persistence.clone(), table(), Arc::new(NoopHooks)));
        let registry = Arc::new(RequestQueueRegistry::new(
            cache,
            persistence.clone(),
            Arc::new(NoopOutboundFlush),
            Duration::from_secs(5),
        ));
        let mut rng = rand::rng();
        let owner = Tsid::mint(TypeTag::Item, &mut rng);
        let queue = registry.get_or_create(owner.clone());

        let cell_v1 = Arc::new(EntityCell::new(shard_model::Entity::new(
            owner.clone(),
            serde_json::json!({"v": 1}),
        )));
        let cell_v2 = Arc::new(EntityCell::new(shard_model::Entity::new(
            owner.clone(),
            serde_json::json!({"v": 2}),
        )));

        let (done_tx, done_rx) = flume::bounded::<()>(2);
        let d1 = done_tx.clone();
        queue
            .push(
                "write-v1",
                Box::new(move || Box::pin(async move {
                    context::set_dirty(cell_v1)?;
                    Ok(Value::Null)
                })),
                Box::new(move |_| {
                    let _ = d1.send(());
                }),
                PushOptions::default(),
            )
            .unwrap();
        queue
            .push(
                "write-v2",
                Box::new(move || Box::pin(async move {
                    context::set_dirty(cell_v2)?;
                    Ok(Value::Null)
                })),
                Box::new(move |_| {
                    let _ = done_tx.send(());
                }),
                PushOptions::default(),
            )
            .unwrap();

        done_rx.recv_async().await.unwrap();
        done_rx.recv_async().await.unwrap();

        // Both `onDone`s have already fired (wait_for_pers=false). Give
        // the ordered commit task time to drain both jobs, including the
        // artificially delayed first write.
        tokio::time::sleep(Duration::from_millis(150)).await;
        let stored = persistence.inner.read(&owner).await.unwrap().unwrap();
        assert_eq!(stored.body, serde_json::json!({"v": 2}));
    }
}
