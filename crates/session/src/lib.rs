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

//! The client wire protocol, per-player outbound diff, and session
//! manager (spec §4.1, §4.7, §4.8): the layer that turns a framed TCP
//! socket into requests on the request engine and turns a commit's
//! dirty set into an outbound diff the client can render.

mod auth;
mod changeset;
mod error;
mod frame_codec;
mod message;
mod outbound;
mod session;
mod session_manager;
mod wire;

pub use auth::{AuthModule, StaticTokenAuth};
pub use changeset::{ChangeScope, Changeset};
pub use error::SessionError;
pub use frame_codec::FrameCodec;
pub use message::{error_response, ping_response, server_message, WireMessage};
pub use outbound::SessionOutboundFlush;
pub use session::Session;
pub use session_manager::SessionManager;
pub use wire::{WireServer, CLIENT_CALLER_GSID};
