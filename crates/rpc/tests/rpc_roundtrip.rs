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

use async_trait::async_trait;
use serde_json::{json, Value};
use shard_rpc::{GlobalApiDispatch, LocalObjectDispatch, RpcClient, RpcError, RpcServer};
use shard_tsid::Tsid;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

struct AddDispatch;

#[async_trait]
impl LocalObjectDispatch for AddDispatch {
    async fn invoke_obj(
        &self,
        _caller_gsid: &str,
        _tsid: &Tsid,
        function_name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RpcError> {
        match function_name {
            "foo" => {
                let a = args[0].as_i64().unwrap();
                let b = args[1].as_i64().unwrap();
                Ok(json!(a + b))
            }
            "noop" => Ok(Value::Null),
            _ => Err(RpcError::Remote {
                code: -32601,
                message: "Requested method does not exist".to_string(),
                stack: None,
            }),
        }
    }
}

struct NoopApi;

#[async_trait]
impl GlobalApiDispatch for NoopApi {
    async fn invoke_api(&self, _function_name: &str, _args: Vec<Value>) -> Result<Value, RpcError> {
        Ok(Value::Null)
    }
}

async fn start_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let server = Arc::new(RpcServer::new(Arc::new(AddDispatch), Arc::new(NoopApi)));
    tokio::spawn(async move {
        server.serve(addr).await.unwrap();
    });
    // give the listener a moment to bind
    tokio::time::sleep(Duration::from_millis(50)).await;
    addr
}

#[tokio::test]
async fn cross_shard_obj_call_returns_result() {
    let addr = start_server().await;
    let client = RpcClient::connect(addr, Duration::from_secs(5), Duration::from_secs(5))
        .await
        .unwrap();
    let tsid = Tsid::parse("LREMOTE0001").unwrap();
    let result = client
        .send_obj_request("gsA", &tsid, "foo", vec![json!(17), json!(4)])
        .await
        .unwrap();
    assert_eq!(result, json!(21));
}

#[tokio::test]
async fn undefined_result_normalizes_to_null() {
    let addr = start_server().await;
    let client = RpcClient::connect(addr, Duration::from_secs(5), Duration::from_secs(5))
        .await
        .unwrap();
    let tsid = Tsid::parse("LREMOTE0002").unwrap();
    let result = client
        .send_obj_request("gsA", &tsid, "noop", vec![])
        .await
        .unwrap();
    assert_eq!(result, Value::Null);
}

#[tokio::test]
async fn pending_request_times_out_once() {
    // No server listening on this port: the connect itself will fail,
    // which is a distinct boundary from an in-flight timeout, so
    // instead exercise the timeout sweep directly via a very short
    // configured timeout against a server that never answers this id.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // accept and hold the connection open without responding.
        let (_stream, _peer) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });
    let client = RpcClient::connect(addr, Duration::from_millis(100), Duration::from_secs(5))
        .await
        .unwrap();
    let tsid = Tsid::parse("LREMOTE0003").unwrap();
    let result = client
        .send_obj_request("gsA", &tsid, "foo", vec![json!(1), json!(2)])
        .await;
    assert!(matches!(result, Err(RpcError::Timeout)));
}
