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

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Spec §6 "Shard-to-shard RPC": `{id, method, params}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: u64,
    pub method: RpcMethod,
    pub params: Vec<Value>,
}

/// The two method names the core dispatches (spec §4.6).
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum RpcMethod {
    /// `obj(callerGsid, tsid, functionName, args[])`.
    Obj,
    /// `api(functionName, args[])`.
    Api,
}

/// Spec §6 response shape: `{id, result, error}`. `result` is normalized
/// to JSON `null` for an undefined return value (spec §4.6, §8 scenario
/// 4), never omitted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    pub result: Value,
    pub error: Option<RpcErrorObject>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stack: Option<String>,
}

impl RpcResponse {
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            id,
            result,
            error: None,
        }
    }

    pub fn err(id: u64, code: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            result: Value::Null,
            error: Some(RpcErrorObject {
                code,
                message: message.into(),
                stack: None,
            }),
        }
    }
}

/// Either side of the wire can carry a request or a response over the
/// same framed connection; the codec decodes the raw JSON and callers
/// discriminate on shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcFrame {
    Request(RpcRequest),
    Response(RpcResponse),
}
