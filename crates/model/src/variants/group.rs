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
use shard_tsid::Tsid;

/// Spec §3 "Group" row: an owner backref plus an opaque body. The owner
/// TSID must resolve to a live or loadable entity — enforced by the
/// request engine at the point of use (spec §3), not by this plain data
/// shape.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GroupBody {
    pub owner: Tsid,
    #[serde(default)]
    pub data: Value,
}

impl GroupBody {
    pub fn new(owner: Tsid) -> Self {
        Self {
            owner,
            data: Value::Object(Default::default()),
        }
    }
}
