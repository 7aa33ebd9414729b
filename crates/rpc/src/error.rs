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

/// Spec §6 "Error codes reuse the well-known JSON-RPC numeric set".
pub mod json_rpc_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Spec §7 taxonomy entries owned by the RPC layer: `RemoteError`,
/// `RpcTimeout`, `ConnectionUnavailable`.
#[derive(Debug, thiserror::Error, Clone)]
pub enum RpcError {
    /// Spec §7 "RemoteError — RPC reported an application error. Bubbled
    /// as-is to the caller."
    #[error("remote error {code}: {message}")]
    Remote {
        code: i64,
        message: String,
        stack: Option<String>,
    },
    /// Spec §8 "RPC pending request older than timeout is canned exactly
    /// once with 'Request Timed Out'".
    #[error("Request Timed Out")]
    Timeout,
    /// Spec §4.6 "after the window closes, further calls fail immediately
    /// with 'Connection Unavailable'".
    #[error("Connection Unavailable")]
    ConnectionUnavailable,
    #[error("malformed RPC frame: {0}")]
    Protocol(String),
    #[error("io error: {0}")]
    Io(String),
}

impl RpcError {
    pub fn code(&self) -> i64 {
        match self {
            RpcError::Remote { code, .. } => *code,
            RpcError::Timeout | RpcError::ConnectionUnavailable => {
                json_rpc_codes::INTERNAL_ERROR
            }
            RpcError::Protocol(_) => json_rpc_codes::PARSE_ERROR,
            RpcError::Io(_) => json_rpc_codes::INTERNAL_ERROR,
        }
    }
}
