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

mod args;
mod config;

use crate::args::Args;
use crate::config::{Config, PersistenceModule};
use async_trait::async_trait;
use clap::Parser;
use eyre::{bail, eyre, Report};
use fs2::FileExt;
use serde_json::Value;
use shard_cache::{
    LifecycleHooks, LiveObjectCache, ObjDispatcher, RequestQueueRegistry, ScriptHost,
};
use shard_persistence::{FjallBackend, InMemoryBackend, PersistenceBackend};
use shard_rpc::{
    GlobalApiDispatch, LocalObjectDispatch, RpcClient, RpcServer, ShardEntry, ShardId, ShardTable,
};
use shard_session::{AuthModule, SessionManager, SessionOutboundFlush, StaticTokenAuth, WireServer};
use shard_tsid::{Tsid, TypeTag};
use std::fs::{File, OpenOptions};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{info, warn};

/// A queue's run loop pays the soft timeout's cost only in a log line
/// (spec §5 "logs via `tracing::warn!` without cancelling in-flight
/// work"); there is no configuration key for it (spec §6), so one value
/// serves every shard.
const REQUEST_SOFT_TIMEOUT: Duration = Duration::from_secs(5);

const RECONNECT_BACKOFF: Duration = Duration::from_millis(500);

/// Acquires an exclusive lock on the data directory so two daemons
/// never share one shard's persistence files.
fn acquire_data_directory_lock(data_dir: &PathBuf) -> Result<File, Report> {
    std::fs::create_dir_all(data_dir)?;
    let lock_path = data_dir.join(".shard-daemon.lock");
    let lock_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&lock_path)?;
    match lock_file.try_lock_exclusive() {
        Ok(()) => {
            info!(?data_dir, "acquired exclusive lock on data directory");
            Ok(lock_file)
        }
        Err(e) => {
            bail!(
                "failed to lock data directory {:?}: {e} (another shard-daemon may already be running against it)",
                data_dir
            );
        }
    }
}

fn build_shard_table(config: &Config) -> Result<ShardTable, Report> {
    let shards: Vec<ShardEntry> = config
        .net
        .game_servers
        .iter()
        .map(|gs| {
            let rpc_addr = if gs.id == config.net.local_shard {
                match config.net.rpc_base_port {
                    Some(port) => SocketAddr::new(gs.rpc_addr.ip(), port),
                    None => gs.rpc_addr,
                }
            } else {
                gs.rpc_addr
            };
            ShardEntry {
                id: ShardId(gs.id.clone()),
                rpc_addr,
            }
        })
        .collect();
    if shards.is_empty() {
        bail!("net.gameServers must list at least this shard");
    }
    Ok(ShardTable::new(shards, ShardId(config.net.local_shard.clone())))
}

fn open_persistence(config: &Config) -> Result<Arc<dyn PersistenceBackend>, Report> {
    match config.pers.back_end_module {
        PersistenceModule::Fjall => {
            let backend = FjallBackend::open(&config.pers.back_end_path)
                .map_err(|e| eyre!("failed to open fjall persistence at {:?}: {e}", config.pers.back_end_path))?;
            Ok(Arc::new(backend))
        }
        PersistenceModule::Memory => Ok(Arc::new(InMemoryBackend::new())),
    }
}

fn build_auth(config: &Config) -> Result<Arc<dyn AuthModule>, Report> {
    let mut auth = StaticTokenAuth::new();
    for (token, tsid) in &config.auth.static_tokens {
        let tsid = Tsid::parse(tsid).map_err(|e| eyre!("auth.static_tokens[{token}]: {e}"))?;
        auth = auth.with_token(token.clone(), tsid);
    }
    Ok(Arc::new(auth))
}

/// Spawns an `RpcClient` against one peer shard, retrying indefinitely
/// until it connects (spec §4.6 "client will attempt to reconnect on
/// its own if the connection drops" — the same posture applies to the
/// very first connection attempt, since peer shards and this shard do
/// not guarantee any particular boot order).
fn spawn_peer_connection(
    cache: Arc<LiveObjectCache>,
    shard_id: ShardId,
    addr: SocketAddr,
    rpc_timeout: Duration,
    buffer_window: Duration,
) {
    tokio::spawn(async move {
        loop {
            match RpcClient::connect(addr, rpc_timeout, buffer_window).await {
                Ok(client) => {
                    info!(shard = %shard_id, %addr, "connected to peer shard");
                    cache.register_rpc_client(shard_id, client);
                    return;
                }
                Err(e) => {
                    warn!(shard = %shard_id, %addr, error = %e, "failed to connect to peer shard, retrying");
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                }
            }
        }
    });
}

/// Bridges cache lifecycle events to per-location plumbing that has no
/// other natural home: a freshly loaded or created location starts its
/// own self-unload timer (spec §4.4 unload policy). The registry is
/// wired in after construction via [`OnceLock`] because the cache and
/// the registry that owns its queues are mutually referential at
/// startup (the registry needs the cache; the cache's hooks need the
/// registry).
struct DaemonHooks {
    registry: OnceLock<Arc<RequestQueueRegistry>>,
    cache: OnceLock<Arc<LiveObjectCache>>,
    unload_interval: Duration,
}

impl DaemonHooks {
    fn new(unload_interval: Duration) -> Self {
        Self {
            registry: OnceLock::new(),
            cache: OnceLock::new(),
            unload_interval,
        }
    }

    fn wire(&self, registry: Arc<RequestQueueRegistry>, cache: Arc<LiveObjectCache>) {
        let _ = self.registry.set(registry);
        let _ = self.cache.set(cache);
    }

    fn maybe_spawn_unload_timer(&self, tsid: &Tsid) {
        if tsid.tag() != TypeTag::Location {
            return;
        }
        let (Some(registry), Some(cache)) = (self.registry.get(), self.cache.get()) else {
            return;
        };
        let _ = shard_cache::spawn_location_unload_timer(
            registry.clone(),
            cache.clone(),
            tsid.clone(),
            self.unload_interval,
        );
    }
}

#[async_trait]
impl LifecycleHooks for DaemonHooks {
    async fn on_load(&self, tsid: &Tsid, _body: &Value) {
        self.maybe_spawn_unload_timer(tsid);
    }

    async fn on_create(&self, tsid: &Tsid, _body: &Value) {
        self.maybe_spawn_unload_timer(tsid);
    }
}

fn init_tracing(debug: bool) -> Result<(), Report> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_line_number(true)
        .with_thread_names(true)
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| eyre!("unable to configure logging: {e}"))
}

/// Process wiring for one shard (spec §4): opens the persistence
/// back-end, brings up the live-object cache and request engine,
/// connects the shard-to-shard RPC client/server pair, and serves the
/// client wire session listener until shut down.
#[tokio::main]
async fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let args = Args::parse();
    init_tracing(args.debug)?;

    let config = Config::load(args.config_file.as_deref())
        .map_err(|e| eyre!("failed to load configuration: {e}"))?;
    let config = args.merge_config(config);

    let _data_dir_lock = acquire_data_directory_lock(&config.data_dir)?;

    let shard_table = build_shard_table(&config)?;
    let local_rpc_addr = shard_table
        .entry(shard_table.local_shard())
        .ok_or_else(|| eyre!("local shard {:?} missing its own game_servers entry", config.net.local_shard))?
        .rpc_addr;

    info!(
        shard = %shard_table.local_shard(),
        data_dir = ?config.data_dir,
        wire_listen = %config.net.wire_listen,
        rpc_listen = %local_rpc_addr,
        "shard-daemon starting"
    );

    let persistence = open_persistence(&config)?;

    let hooks = Arc::new(DaemonHooks::new(config.loc_unload_interval()));
    let cache = Arc::new(LiveObjectCache::new(
        persistence.clone(),
        shard_table.clone(),
        hooks.clone(),
    ));

    let sessions = Arc::new(SessionManager::new());
    let outbound = Arc::new(SessionOutboundFlush::new(sessions.clone()));
    let registry = Arc::new(RequestQueueRegistry::new(
        cache.clone(),
        persistence.clone(),
        outbound,
        REQUEST_SOFT_TIMEOUT,
    ));
    hooks.wire(registry.clone(), cache.clone());

    for shard in shard_table.shards() {
        if shard_table.is_local(&shard.id) {
            continue;
        }
        spawn_peer_connection(
            cache.clone(),
            shard.id.clone(),
            shard.rpc_addr,
            config.rpc_timeout(),
            config.rpc_buffer_window(),
        );
    }

    let script: Arc<dyn ScriptHost> = Arc::new(shard_cache::NoScriptHost);
    let dispatcher = Arc::new(ObjDispatcher::new(
        cache.clone(),
        registry.clone(),
        script.clone(),
    ));
    let rpc_server = Arc::new(RpcServer::new(
        dispatcher.clone() as Arc<dyn LocalObjectDispatch>,
        dispatcher as Arc<dyn GlobalApiDispatch>,
    ));
    let rpc_serve = rpc_server.clone();
    let _rpc_handle = tokio::spawn(async move {
        if let Err(e) = rpc_serve.serve(local_rpc_addr).await {
            tracing::error!(error = %e, "rpc server exited");
        }
    });

    let auth = build_auth(&config)?;
    let wire_server = Arc::new(WireServer::new(
        cache.clone(),
        registry.clone(),
        sessions.clone(),
        auth,
        script,
        config.net.max_msg_size,
    ));
    let wire_addr = config.net.wire_listen;
    let wire_serve = wire_server.clone();
    let wire_handle = tokio::spawn(async move {
        if let Err(e) = wire_serve.serve(wire_addr).await {
            tracing::error!(error = %e, "wire session server exited");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| eyre!("failed to listen for shutdown signal: {e}"))?;
    info!("shutdown requested, draining request queues");

    wire_handle.abort();
    registry.shutdown().await;
    persistence.close().await.map_err(|e| eyre!("failed to close persistence backend: {e}"))?;

    info!("shard-daemon stopped");
    Ok(())
}
