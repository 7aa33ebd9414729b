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
use shard_tsid::Tsid;

/// The persisted placeholder for a cross-entity reference (spec §4.5): a
/// lightweight `{objref:true, tsid}` record that stands in for another
/// entity without eagerly loading it. `label` is an optional
/// display hint that, per spec, can be read straight off the record
/// without resolving.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjrefRecord {
    /// Always `true`; present so the JSON shape is self-describing and
    /// distinguishable from a plain dict that happens to carry a `tsid`
    /// field (spec §4.5 "must not refify plain dicts that merely happen
    /// to have a tsid key").
    pub objref: bool,
    pub tsid: Tsid,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub label: Option<String>,
}

impl ObjrefRecord {
    pub fn new(tsid: Tsid) -> Self {
        Self {
            objref: true,
            tsid,
            label: None,
        }
    }

    pub fn with_label(tsid: Tsid, label: impl Into<String>) -> Self {
        Self {
            objref: true,
            tsid,
            label: Some(label.into()),
        }
    }
}
