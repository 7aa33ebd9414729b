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

//! The shard router and its RPC transport (spec §4.6): deterministic
//! TSID-to-shard mapping, local TSID minting, and the length-prefixed
//! JSON request/response protocol that carries `obj`/`api` calls
//! between shards.

mod client;
mod codec;
mod dispatch;
mod error;
mod proto;
mod proxy;
mod server;
mod shard_table;

pub use client::{ConnState, RpcClient};
pub use codec::RpcCodec;
pub use dispatch::{GlobalApiDispatch, LocalObjectDispatch};
pub use error::{json_rpc_codes, RpcError};
pub use proto::{RpcErrorObject, RpcFrame, RpcMethod, RpcRequest, RpcResponse};
pub use proxy::RpcProxy;
pub use server::{method_not_found_message, RpcServer, INVALID_JSON_RPC_MESSAGE};
pub use shard_table::{ShardEntry, ShardId, ShardTable};
