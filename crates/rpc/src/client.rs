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

use crate::codec::RpcCodec;
use crate::error::RpcError;
use crate::proto::{RpcFrame, RpcMethod, RpcRequest, RpcResponse};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_util::codec::Framed;

/// Spec §4.6 "Client state machine": `CONNECTING` -> `CONNECTED` ->
/// (`DISCONNECTED` <-> `RECONNECTING`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnState {
    Connecting,
    Connected,
    Disconnected,
    Reconnecting,
}

struct Pending {
    sent_at: Instant,
    reply: oneshot::Sender<Result<Value, RpcError>>,
}

struct Buffered {
    request: RpcRequest,
    reply: oneshot::Sender<Result<Value, RpcError>>,
}

struct Shared {
    addr: SocketAddr,
    rpc_timeout: Duration,
    buffer_window: Duration,
    next_id: AtomicU64,
    state: Mutex<State>,
}

struct State {
    conn: ConnState,
    pending: HashMap<u64, Pending>,
    buffer: VecDeque<Buffered>,
    disconnected_since: Option<Instant>,
    writer: Option<tokio::sync::mpsc::UnboundedSender<RpcFrame>>,
}

/// A per-shard RPC connection, used by the owning shard to reach an
/// entity it does not host locally (spec §4.6 "Client state machine").
///
/// Disconnect buffers outbound calls for `buffer_window`; once that
/// window elapses, new calls fail immediately with
/// [`RpcError::ConnectionUnavailable`] (spec §4.6, §8). A background
/// sweep fails any pending call older than `rpc_timeout` with
/// [`RpcError::Timeout`] (spec §8 "RPC pending request older than
/// timeout is canned exactly once").
#[derive(Clone)]
pub struct RpcClient {
    shared: Arc<Shared>,
}

impl RpcClient {
    /// Connects and spawns the reader/writer/sweep tasks. The client
    /// will attempt to reconnect on its own if the connection drops.
    pub async fn connect(
        addr: SocketAddr,
        rpc_timeout: Duration,
        buffer_window: Duration,
    ) -> Result<Self, RpcError> {
        let shared = Arc::new(Shared {
            addr,
            rpc_timeout,
            buffer_window,
            next_id: AtomicU64::new(1),
            state: Mutex::new(State {
                conn: ConnState::Connecting,
                pending: HashMap::new(),
                buffer: VecDeque::new(),
                disconnected_since: None,
                writer: None,
            }),
        });
        let client = Self { shared };
        client.establish().await?;
        client.spawn_sweep();
        Ok(client)
    }

    pub fn state(&self) -> ConnState {
        self.shared.state.lock().conn
    }

    async fn establish(&self) -> Result<(), RpcError> {
        let stream = TcpStream::connect(self.shared.addr)
            .await
            .map_err(|e| RpcError::Io(e.to_string()))?;
        let framed = Framed::new(stream, RpcCodec);
        let (mut sink, mut stream) = framed.split();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<RpcFrame>();

        {
            let mut state = self.shared.state.lock();
            state.conn = ConnState::Connected;
            state.writer = Some(tx.clone());
            state.disconnected_since = None;
        }

        // writer task: drains the outbound channel onto the socket.
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if sink.send(frame).await.is_err() {
                    break;
                }
            }
        });

        // reader task: routes responses to their pending caller and
        // triggers reconnect on EOF/error.
        let shared = self.shared.clone();
        tokio::spawn(async move {
            loop {
                match stream.next().await {
                    Some(Ok(RpcFrame::Response(resp))) => shared_complete(&shared, resp),
                    Some(Ok(RpcFrame::Request(_))) => {
                        tracing::warn!("rpc client received a request frame, ignoring");
                    }
                    Some(Err(e)) => {
                        tracing::warn!("rpc client read error: {e}");
                        break;
                    }
                    None => break,
                }
            }
            mark_disconnected(&shared);
            spawn_reconnect(shared);
        });

        // flush any buffered calls from a previous disconnection.
        self.drain_buffer();
        Ok(())
    }

    fn drain_buffer(&self) {
        let buffered: Vec<Buffered> = {
            let mut state = self.shared.state.lock();
            state.buffer.drain(..).collect()
        };
        for item in buffered {
            self.dispatch(item.request, item.reply);
        }
    }

    fn dispatch(&self, request: RpcRequest, reply: oneshot::Sender<Result<Value, RpcError>>) {
        let mut state = self.shared.state.lock();
        state.pending.insert(
            request.id,
            Pending {
                sent_at: Instant::now(),
                reply,
            },
        );
        if let Some(writer) = state.writer.clone() {
            drop(state);
            let _ = writer.send(RpcFrame::Request(request));
        }
    }

    /// `obj(callerGsid, tsid, functionName, args[])` (spec §4.6).
    pub async fn send_obj_request(
        &self,
        caller_gsid: &str,
        tsid: &shard_tsid::Tsid,
        function_name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RpcError> {
        let mut params = vec![
            Value::String(caller_gsid.to_string()),
            Value::String(tsid.as_str().to_string()),
            Value::String(function_name.to_string()),
        ];
        params.push(Value::Array(args));
        self.call(RpcMethod::Obj, params).await
    }

    /// `api(functionName, args[])` (spec §4.6).
    pub async fn send_api_request(
        &self,
        function_name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RpcError> {
        let params = vec![Value::String(function_name.to_string()), Value::Array(args)];
        self.call(RpcMethod::Api, params).await
    }

    async fn call(&self, method: RpcMethod, params: Vec<Value>) -> Result<Value, RpcError> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest { id, method, params };
        let (tx, rx) = oneshot::channel();

        {
            let mut state = self.shared.state.lock();
            match state.conn {
                ConnState::Connected => {
                    state.pending.insert(
                        id,
                        Pending {
                            sent_at: Instant::now(),
                            reply: tx,
                        },
                    );
                    let writer = state.writer.clone();
                    drop(state);
                    if let Some(writer) = writer {
                        let _ = writer.send(RpcFrame::Request(request));
                    }
                }
                ConnState::Disconnected | ConnState::Reconnecting => {
                    let within_window = state
                        .disconnected_since
                        .map(|since| since.elapsed() < self.shared.buffer_window)
                        .unwrap_or(true);
                    if within_window {
                        state.buffer.push_back(Buffered { request, reply: tx });
                        return rx.await.unwrap_or(Err(RpcError::ConnectionUnavailable));
                    } else {
                        return Err(RpcError::ConnectionUnavailable);
                    }
                }
                ConnState::Connecting => {
                    state.buffer.push_back(Buffered { request, reply: tx });
                }
            }
        }

        rx.await.unwrap_or(Err(RpcError::ConnectionUnavailable))
    }

    fn spawn_sweep(&self) {
        let shared = self.shared.clone();
        let timeout = self.shared.rpc_timeout;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(timeout.min(Duration::from_secs(1)).max(Duration::from_millis(50)));
            loop {
                interval.tick().await;
                sweep_timeouts(&shared, timeout);
            }
        });
    }
}

fn sweep_timeouts(shared: &Arc<Shared>, timeout: Duration) {
    let mut expired = Vec::new();
    {
        let mut state = shared.state.lock();
        let now = Instant::now();
        let expired_ids: Vec<u64> = state
            .pending
            .iter()
            .filter(|(_, p)| now.duration_since(p.sent_at) > timeout)
            .map(|(id, _)| *id)
            .collect();
        for id in expired_ids {
            if let Some(p) = state.pending.remove(&id) {
                expired.push(p.reply);
            }
        }
    }
    for reply in expired {
        let _ = reply.send(Err(RpcError::Timeout));
    }
}

fn shared_complete(shared: &Arc<Shared>, resp: RpcResponse) {
    let pending = shared.state.lock().pending.remove(&resp.id);
    if let Some(p) = pending {
        let result = match resp.error {
            Some(e) => Err(RpcError::Remote {
                code: e.code,
                message: e.message,
                stack: e.stack,
            }),
            None => Ok(resp.result),
        };
        let _ = p.reply.send(result);
    }
}

fn mark_disconnected(shared: &Arc<Shared>) {
    let mut state = shared.state.lock();
    state.conn = ConnState::Disconnected;
    state.disconnected_since = Some(Instant::now());
    state.writer = None;
}

fn spawn_reconnect(shared: Arc<Shared>) {
    tokio::spawn(async move {
        {
            let mut state = shared.state.lock();
            state.conn = ConnState::Reconnecting;
        }
        loop {
            match TcpStream::connect(shared.addr).await {
                Ok(stream) => {
                    let framed = Framed::new(stream, RpcCodec);
                    let (mut sink, mut stream_half) = framed.split();
                    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<RpcFrame>();
                    {
                        let mut state = shared.state.lock();
                        state.conn = ConnState::Connected;
                        state.writer = Some(tx.clone());
                        state.disconnected_since = None;
                    }
                    tokio::spawn(async move {
                        while let Some(frame) = rx.recv().await {
                            if sink.send(frame).await.is_err() {
                                break;
                            }
                        }
                    });
                    let buffered: Vec<Buffered> = {
                        let mut state = shared.state.lock();
                        state.buffer.drain(..).collect()
                    };
                    for item in buffered {
                        let mut state = shared.state.lock();
                        state.pending.insert(
                            item.request.id,
                            Pending {
                                sent_at: Instant::now(),
                                reply: item.reply,
                            },
                        );
                        let writer = state.writer.clone();
                        drop(state);
                        if let Some(writer) = writer {
                            let _ = writer.send(RpcFrame::Request(item.request));
                        }
                    }
                    let shared_inner = shared.clone();
                    tokio::spawn(async move {
                        loop {
                            match stream_half.next().await {
                                Some(Ok(RpcFrame::Response(resp))) => {
                                    shared_complete(&shared_inner, resp)
                                }
                                Some(Ok(RpcFrame::Request(_))) => {}
                                _ => break,
                            }
                        }
                        mark_disconnected(&shared_inner);
                        spawn_reconnect(shared_inner.clone());
                    });
                    break;
                }
                Err(_) => {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
            }
        }
    });
}
