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

use crate::auth::AuthModule;
use crate::frame_codec::FrameCodec;
use crate::message::{error_response, ping_response, WireMessage};
use crate::session::Session;
use crate::session_manager::SessionManager;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use shard_cache::{LiveObjectCache, OnDone, PushOptions, RequestFn, RequestQueueRegistry, ScriptHost};
use shard_model::variants::PlayerBody;
use shard_model::ObjrefRecord;
use shard_tsid::Tsid;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

/// The gsid a player's own client messages are attributed to on the
/// `obj`/`api` surface (spec §4.6 "`callerGsid` identifies the calling
/// shard or, for a client-originated call, the special value below").
pub const CLIENT_CALLER_GSID: &str = "client";

/// Accepts player connections and runs each through the framing state
/// machine and message dispatch of spec §4.1. One instance per shard
/// process.
pub struct WireServer {
    cache: Arc<LiveObjectCache>,
    registry: Arc<RequestQueueRegistry>,
    sessions: Arc<SessionManager>,
    auth: Arc<dyn AuthModule>,
    script: Arc<dyn ScriptHost>,
    max_frame_size: usize,
}

impl WireServer {
    pub fn new(
        cache: Arc<LiveObjectCache>,
        registry: Arc<RequestQueueRegistry>,
        sessions: Arc<SessionManager>,
        auth: Arc<dyn AuthModule>,
        script: Arc<dyn ScriptHost>,
        max_frame_size: usize,
    ) -> Self {
        Self {
            cache,
            registry,
            sessions,
            auth,
            script,
            max_frame_size,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Binds and serves forever; call inside a spawned task.
    pub async fn serve(self: Arc<Self>, addr: SocketAddr) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!("session accept failed: {e}");
                    continue;
                }
            };
            let this = self.clone();
            tokio::spawn(async move {
                this.handle_connection(stream, peer).await;
            });
        }
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        let framed = Framed::new(stream, FrameCodec::new(self.max_frame_size));
        let (mut sink, mut stream) = framed.split();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Value>();
        let session = self.sessions.new_session(tx);

        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let Ok(bytes) = serde_json::to_vec(&msg) else {
                    tracing::error!("outbound message was not serializable, dropping");
                    continue;
                };
                if sink.send(bytes).await.is_err() {
                    break;
                }
            }
        });

        while let Some(frame) = stream.next().await {
            let payload = match frame {
                Ok(bytes) => bytes,
                Err(e) => {
                    // Spec §4.1 "an oversize frame, or any other framing
                    // error, is fatal — close with an error." Spec §7
                    // ProtocolError.
                    tracing::warn!(%peer, error = %e, "framing error, closing session");
                    break;
                }
            };
            if self.dispatch(&session, &payload).await.is_err() {
                break;
            }
        }

        self.on_disconnect(&session).await;
    }

    async fn dispatch(&self, session: &Session, payload: &[u8]) -> Result<(), ()> {
        let msg = match WireMessage::parse(payload) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(session = %session.id(), error = %e, "malformed message, closing session");
                return Err(());
            }
        };

        match msg.msg_type() {
            // Spec §4.1: bypasses the request queue entirely.
            "ping" => {
                let ts = chrono::Utc::now().timestamp();
                let _ = session.send_unchecked(ping_response(msg.msg_id(), ts));
                Ok(())
            }
            "login_start" => self.handle_login_start(session, &msg).await,
            "login_end" => self.handle_login_end(session, &msg).await,
            other => self.handle_generic(session, other, &msg).await,
        }
    }

    /// Spec §4.1 "`login_start` authenticates the session's token and
    /// binds the resulting player TSID before any further message is
    /// processed." Bypasses the queue like `ping`.
    async fn handle_login_start(&self, session: &Session, msg: &WireMessage) -> Result<(), ()> {
        if session.is_logged_in() {
            let _ = session.send_unchecked(error_response(
                "login_start",
                msg.msg_id(),
                "session is already logged in",
            ));
            return Ok(());
        }
        let token = msg.field("token").and_then(Value::as_str).unwrap_or("");
        match self.auth.validate(token).await {
            Ok(player) => {
                session.bind_player(player);
                let mut ack = serde_json::Map::new();
                ack.insert("type".to_string(), Value::String("login_start".to_string()));
                if let Some(id) = msg.msg_id() {
                    ack.insert("msg_id".to_string(), id);
                }
                ack.insert("success".to_string(), Value::Bool(true));
                let _ = session.send_unchecked(Value::Object(ack));
                Ok(())
            }
            Err(e) => {
                let _ = session.send_unchecked(error_response("login_start", msg.msg_id(), &e.to_string()));
                Err(())
            }
        }
    }

    /// Spec §8 scenario 2: completes a login by inserting the player
    /// into `location.players` exactly once and firing `onPlayerEnter`.
    /// Implemented as core logic (not deferred to the absent script
    /// layer) precisely because the scenario requires it to be testable
    /// without one; the `onPlayerEnter` call itself is best-effort.
    async fn handle_login_end(&self, session: &Session, msg: &WireMessage) -> Result<(), ()> {
        let Some(player) = session.player() else {
            let _ = session.send_unchecked(error_response(
                "login_end",
                msg.msg_id(),
                "login_end received before login_start",
            ));
            return Err(());
        };

        let cache = self.cache.clone();
        let script = self.script.clone();
        let queue = self
            .registry
            .get_or_create(match self.cache.resolve_queue_owner(&player).await {
                Ok(owner) => owner,
                Err(e) => {
                    let _ = session.send_unchecked(error_response("login_end", msg.msg_id(), &e.to_string()));
                    return Err(());
                }
            });

        let player_for_body = player.clone();
        let body: RequestFn = Box::new(move || {
            Box::pin(async move {
                let loaded = cache.get(&player_for_body).await?;
                let shard_cache::LoadedEntity::Local(cell) = loaded else {
                    return Err(shard_cache::CacheError::NotLocallyOwned(player_for_body.clone()));
                };
                let location = cell.with(|e| {
                    PlayerBody::from_value(e.body())
                        .ok()
                        .and_then(|p| p.location)
                });
                let Some(location) = location else {
                    return Err(shard_cache::CacheError::OwnershipUnresolved(player_for_body.clone()));
                };

                cell.with_mut(|e| {
                    if let Ok(mut player_body) = PlayerBody::from_value(e.body()) {
                        let _ = player_body.set_active(true);
                        *e.body_mut() = player_body.to_value();
                        e.touch();
                    }
                });
                shard_cache::set_dirty(cell.clone())?;

                let loc_loaded = cache.get(&location).await?;
                if let shard_cache::LoadedEntity::Local(loc_cell) = loc_loaded {
                    loc_cell.with_mut(|e| {
                        if let Ok(mut loc_body) =
                            shard_model::variants::LocationBody::from_value(e.body())
                        {
                            loc_body
                                .players
                                .insert(player_for_body.clone(), ObjrefRecord::new(player_for_body.clone()));
                            *e.body_mut() = loc_body.to_value();
                            e.touch();
                        }
                    });
                    shard_cache::set_dirty(loc_cell)?;
                }

                if let Err(e) = script
                    .invoke_method(CLIENT_CALLER_GSID, &player_for_body, "onPlayerEnter", vec![])
                    .await
                {
                    tracing::debug!(player = %player_for_body, error = %e, "onPlayerEnter not available");
                }

                Ok(Value::String(location.as_str().to_string()))
            })
        });

        let msg_id = msg.msg_id();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let on_done: OnDone = Box::new(move |result| {
            let _ = tx.send(result);
        });

        if queue
            .push("login_end", body, on_done, PushOptions { close: false, wait_for_pers: true })
            .is_err()
        {
            let _ = session.send_unchecked(error_response("login_end", msg_id, "request queue closed"));
            return Err(());
        }

        match rx.await {
            Ok(Ok(location)) => {
                if let Some(location) = location.as_str().and_then(|s| Tsid::parse(s).ok()) {
                    session.set_location(Some(location));
                }
                let mut ack = serde_json::Map::new();
                ack.insert("type".to_string(), Value::String("login_end".to_string()));
                if let Some(id) = msg_id {
                    ack.insert("msg_id".to_string(), id);
                }
                ack.insert("success".to_string(), Value::Bool(true));
                let _ = session.send_unchecked(Value::Object(ack));
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = session.send_unchecked(error_response("login_end", msg_id, &e.to_string()));
                Err(())
            }
            Err(_) => Err(()),
        }
    }

    /// Spec §1 "does not define the client wire schema beyond framing":
    /// anything other than `ping`/`login_start`/`login_end` is routed to
    /// the bound player's queue as a script-layer method call named after
    /// the message type, mirroring how `obj()` RPC requests are
    /// dispatched (spec §4.6).
    async fn handle_generic(&self, session: &Session, msg_type: &str, msg: &WireMessage) -> Result<(), ()> {
        if !session.is_logged_in() {
            let _ = session.send_unchecked(error_response(msg_type, msg.msg_id(), "session is not logged in"));
            return Err(());
        }
        let player = session.player().expect("logged_in implies a bound player");
        let owner = match self.cache.resolve_queue_owner(&player).await {
            Ok(owner) => owner,
            Err(e) => {
                let _ = session.send_unchecked(error_response(msg_type, msg.msg_id(), &e.to_string()));
                return Ok(());
            }
        };
        let queue = self.registry.get_or_create(owner);

        let script = self.script.clone();
        let function_name = msg_type.to_string();
        let args = vec![msg.as_value()];
        let player_for_call = player.clone();
        let body: RequestFn = Box::new(move || {
            Box::pin(async move {
                script
                    .invoke_method(CLIENT_CALLER_GSID, &player_for_call, &function_name, args)
                    .await
            })
        });

        let msg_type_owned = msg_type.to_string();
        let msg_id = msg.msg_id();
        let session_for_done = session.clone();
        let on_done: OnDone = Box::new(move |result| match result {
            Ok(_) => {}
            Err(e) => {
                let _ = session_for_done.send_unchecked(error_response(&msg_type_owned, msg_id, &e.to_string()));
            }
        });

        if queue
            .push(msg_type, body, on_done, PushOptions { close: false, wait_for_pers: false })
            .is_err()
        {
            let _ = session.send_unchecked(error_response(msg_type, msg.msg_id(), "request queue closed"));
        }
        Ok(())
    }

    /// Spec §4.1/§4.8: deregisters the session and, if a player was
    /// bound, enqueues a best-effort `onLogout` and removes the player
    /// from its location, mirroring `login_end`'s reversal.
    async fn on_disconnect(&self, session: &Session) {
        self.sessions.on_close(session.id());
        let Some(player) = session.player() else {
            return;
        };

        let cache = self.cache.clone();
        let script = self.script.clone();
        let owner = match self.cache.resolve_queue_owner(&player).await {
            Ok(owner) => owner,
            Err(e) => {
                tracing::warn!(player = %player, error = %e, "could not resolve queue owner on disconnect");
                return;
            }
        };
        let queue = self.registry.get_or_create(owner);

        let player_for_body = player.clone();
        let body: RequestFn = Box::new(move || {
            Box::pin(async move {
                let loaded = cache.get(&player_for_body).await?;
                let shard_cache::LoadedEntity::Local(cell) = loaded else {
                    return Ok(Value::Null);
                };
                let location = cell.with(|e| {
                    PlayerBody::from_value(e.body())
                        .ok()
                        .and_then(|p| p.location)
                });
                cell.with_mut(|e| {
                    if let Ok(mut player_body) = PlayerBody::from_value(e.body()) {
                        let _ = player_body.set_active(false);
                        *e.body_mut() = player_body.to_value();
                        e.touch();
                    }
                });
                shard_cache::set_dirty(cell)?;

                if let Some(location) = location {
                    if let shard_cache::LoadedEntity::Local(loc_cell) = cache.get(&location).await? {
                        loc_cell.with_mut(|e| {
                            if let Ok(mut loc_body) =
                                shard_model::variants::LocationBody::from_value(e.body())
                            {
                                loc_body.players.remove(&player_for_body);
                                *e.body_mut() = loc_body.to_value();
                                e.touch();
                            }
                        });
                        shard_cache::set_dirty(loc_cell)?;
                    }
                }

                if let Err(e) = script
                    .invoke_method(CLIENT_CALLER_GSID, &player_for_body, "onLogout", vec![])
                    .await
                {
                    tracing::debug!(player = %player_for_body, error = %e, "onLogout not available");
                }
                Ok(Value::Null)
            })
        });

        let on_done: OnDone = Box::new(|result| {
            if let Err(e) = result {
                tracing::warn!(error = %e, "onDisconnect request failed");
            }
        });

        if let Err(e) = queue.push(
            "onDisconnect",
            body,
            on_done,
            PushOptions { close: false, wait_for_pers: false },
        ) {
            tracing::warn!(player = %player, error = %e, "could not enqueue onDisconnect");
        }
    }
}
