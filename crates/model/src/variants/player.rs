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
use crate::objref_record::ObjrefRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shard_tsid::{BoundedProperty, Tsid};
use std::collections::BTreeMap;

/// Spec §3 "Player" row. `location` is non-null while the player is
/// active; `session` is a transient backref (never serialized) populated
/// only while the player is online (spec §3, §4.7).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct PlayerBody {
    pub inventory: BTreeMap<Tsid, ObjrefRecord>,
    pub stats: BTreeMap<String, BoundedProperty>,
    pub location: Option<Tsid>,
    pub active: bool,
}

impl PlayerBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spec §8 invariant: "For every live player p, p.active implies
    /// p.location is non-null." Enforced here rather than left as a
    /// documentation comment.
    pub fn set_active(&mut self, active: bool) -> Result<(), ModelError> {
        if active && self.location.is_none() {
            return Err(ModelError::MalformedBody(
                "cannot activate a player with no location".to_string(),
            ));
        }
        self.active = active;
        Ok(())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("PlayerBody is always representable as JSON")
    }

    pub fn from_value(value: &Value) -> Result<Self, ModelError> {
        serde_json::from_value(value.clone()).map_err(|e| ModelError::MalformedBody(e.to_string()))
    }
}
