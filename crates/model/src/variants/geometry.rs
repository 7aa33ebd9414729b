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

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shard_tsid::{Tsid, TypeTag};

/// Layer/connect data, opaque to the core (spec §3). Paired 1:1 with a
/// Location by sharing its TSID suffix.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct GeometryBody {
    pub layers: Value,
}

impl GeometryBody {
    pub fn new(geometry_tsid: &Tsid, layers: Value) -> Result<Self, ModelError> {
        if geometry_tsid.tag() != TypeTag::Geometry {
            return Err(ModelError::WrongTag {
                tsid: geometry_tsid.clone(),
                expected: "geometry",
            });
        }
        Ok(Self { layers })
    }
}
