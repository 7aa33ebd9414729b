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
use crate::dispatch::{GlobalApiDispatch, LocalObjectDispatch};
use crate::error::{json_rpc_codes, RpcError};
use crate::proto::{RpcFrame, RpcMethod, RpcRequest, RpcResponse};
use futures_util::{SinkExt, StreamExt};
use shard_tsid::Tsid;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::codec::Framed;

/// Accepts framed shard-to-shard connections and dispatches `obj`/`api`
/// methods (spec §4.6 "Server side"). Each connection's close is
/// non-fatal to the server; a per-connection closed flag ensures the
/// handler never writes a response onto a socket the peer has already
/// torn down (spec §4.6 "outstanding responses to that connection are
/// discarded when the connection marks itself closed").
pub struct RpcServer {
    obj_dispatch: Arc<dyn LocalObjectDispatch>,
    api_dispatch: Arc<dyn GlobalApiDispatch>,
}

impl RpcServer {
    pub fn new(
        obj_dispatch: Arc<dyn LocalObjectDispatch>,
        api_dispatch: Arc<dyn GlobalApiDispatch>,
    ) -> Self {
        Self {
            obj_dispatch,
            api_dispatch,
        }
    }

    /// Binds and serves forever; call inside a spawned task.
    pub async fn serve(self: Arc<Self>, addr: SocketAddr) -> Result<(), RpcError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RpcError::Io(e.to_string()))?;
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!("rpc accept failed: {e}");
                    continue;
                }
            };
            let this = self.clone();
            tokio::spawn(async move {
                this.handle_connection(stream, peer).await;
            });
        }
    }

    async fn handle_connection(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let framed = Framed::new(stream, RpcCodec);
        let (mut sink, mut stream) = framed.split();
        let closed = Arc::new(AtomicBool::new(false));

        while let Some(frame) = stream.next().await {
            let request = match frame {
                Ok(RpcFrame::Request(req)) => req,
                Ok(RpcFrame::Response(_)) => {
                    tracing::warn!("rpc server received a response frame from {peer}, ignoring");
                    continue;
                }
                Err(e) => {
                    tracing::warn!("rpc server read error from {peer}: {e}");
                    break;
                }
            };
            let response = self.dispatch(request).await;
            if closed.load(Ordering::Relaxed) {
                continue;
            }
            if sink.send(RpcFrame::Response(response)).await.is_err() {
                closed.store(true, Ordering::Relaxed);
                break;
            }
        }
        closed.store(true, Ordering::Relaxed);
        tracing::info!("rpc connection from {peer} closed");
    }

    async fn dispatch(&self, request: RpcRequest) -> RpcResponse {
        let result = match request.method {
            RpcMethod::Obj => self.dispatch_obj(&request.params).await,
            RpcMethod::Api => self.dispatch_api(&request.params).await,
        };
        match result {
            Ok(value) => RpcResponse::ok(request.id, value),
            Err(e) => RpcResponse::err(request.id, e.code(), e.to_string()),
        }
    }

    async fn dispatch_obj(
        &self,
        params: &[serde_json::Value],
    ) -> Result<serde_json::Value, RpcError> {
        let [caller_gsid, tsid, function_name, args] = params else {
            return Err(RpcError::Protocol("obj() expects 4 params".to_string()));
        };
        let caller_gsid = caller_gsid
            .as_str()
            .ok_or_else(|| RpcError::Protocol("callerGsid must be a string".to_string()))?;
        let tsid = Tsid::parse(
            tsid.as_str()
                .ok_or_else(|| RpcError::Protocol("tsid must be a string".to_string()))?,
        )
        .map_err(|e| RpcError::Protocol(e.to_string()))?;
        let function_name = function_name
            .as_str()
            .ok_or_else(|| RpcError::Protocol("functionName must be a string".to_string()))?;
        let args = args
            .as_array()
            .ok_or_else(|| RpcError::Protocol("args must be an array".to_string()))?
            .clone();
        self.obj_dispatch
            .invoke_obj(caller_gsid, &tsid, function_name, args)
            .await
    }

    async fn dispatch_api(
        &self,
        params: &[serde_json::Value],
    ) -> Result<serde_json::Value, RpcError> {
        let [function_name, args] = params else {
            return Err(RpcError::Protocol("api() expects 2 params".to_string()));
        };
        let function_name = function_name
            .as_str()
            .ok_or_else(|| RpcError::Protocol("functionName must be a string".to_string()))?;
        let args = args
            .as_array()
            .ok_or_else(|| RpcError::Protocol("args must be an array".to_string()))?
            .clone();
        self.api_dispatch.invoke_api(function_name, args).await
    }
}

/// Spec §7 "Unknown method -> error frame with 'Requested method does
/// not exist'". Reserved for dispatchers that look a method up in a
/// registry (e.g. `api`'s global table) rather than matching a fixed
/// enum the way `RpcMethod` already does.
pub fn method_not_found_message() -> &'static str {
    "Requested method does not exist"
}

pub const INVALID_JSON_RPC_MESSAGE: &str = "Did not receive valid JSON-RPC data";
pub const INVALID_PARAMS_CODE: i64 = json_rpc_codes::INVALID_PARAMS;
