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
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shard_tsid::{Tsid, TypeTag};

/// The wire/storage shape of an entity (spec §6 "Persisted state
/// layout"): one JSON blob per TSID. This is what the persistence
/// gateway reads and writes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SerializedEntity {
    pub tsid: Tsid,
    #[serde(rename = "type")]
    pub entity_type: TypeTag,
    pub body: Value,
    pub last_modified: DateTime<Utc>,
}

/// An in-memory entity (spec §3): an immutable TSID, a type (derived from
/// the TSID's tag), an opaque JSON-serializable body, and two transient
/// flags never persisted.
#[derive(Clone, Debug)]
pub struct Entity {
    tsid: Tsid,
    body: Value,
    last_modified: DateTime<Utc>,
    deleted: bool,
    stale: bool,
}

impl Entity {
    pub fn new(tsid: Tsid, body: Value) -> Self {
        Self {
            tsid,
            body,
            last_modified: Utc::now(),
            deleted: false,
            stale: false,
        }
    }

    pub fn tsid(&self) -> &Tsid {
        &self.tsid
    }

    pub fn entity_type(&self) -> TypeTag {
        self.tsid.tag()
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Value {
        &mut self.body
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// Updates the last-modified stamp; called by the request engine
    /// whenever `rc.setDirty` is invoked on this entity.
    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Marks the entity deleted (spec §3 "Destroyed by `del`"). Deletion
    /// flags scheduling of removal on commit; it does not itself evict
    /// the entity from any cache.
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Produces the persisted shape. Transient flags (`deleted`, `stale`)
    /// are not part of it.
    pub fn serialize(&self) -> SerializedEntity {
        SerializedEntity {
            tsid: self.tsid.clone(),
            entity_type: self.entity_type(),
            body: self.body.clone(),
            last_modified: self.last_modified,
        }
    }

    /// Reconstructs an entity from its persisted shape, validating that
    /// the stored type tag matches the TSID's own tag.
    pub fn from_serialized(se: SerializedEntity) -> Result<Self, ModelError> {
        if se.tsid.tag() != se.entity_type {
            return Err(ModelError::WrongTag {
                tsid: se.tsid,
                expected: tag_name(se.entity_type),
            });
        }
        Ok(Self {
            tsid: se.tsid,
            body: se.body,
            last_modified: se.last_modified,
            deleted: false,
            stale: false,
        })
    }
}

fn tag_name(tag: TypeTag) -> &'static str {
    match tag {
        TypeTag::Location => "location",
        TypeTag::Geometry => "geometry",
        TypeTag::Player => "player",
        TypeTag::Item => "item",
        TypeTag::Bag => "bag",
        TypeTag::Group => "group",
        TypeTag::Quest => "quest",
        TypeTag::DataContainer => "data container",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    #[test]
    fn serialize_round_trip_is_stable() {
        let mut rng = StdRng::seed_from_u64(7);
        let tsid = Tsid::mint(TypeTag::Item, &mut rng);
        let e = Entity::new(tsid, json!({"count": 3}));
        let first = e.serialize();
        let reconstructed = Entity::from_serialized(first.clone()).unwrap();
        let second = reconstructed.serialize();
        assert_eq!(first, second);
    }

    #[test]
    fn from_serialized_rejects_tag_mismatch() {
        let mut rng = StdRng::seed_from_u64(7);
        let tsid = Tsid::mint(TypeTag::Item, &mut rng);
        let se = SerializedEntity {
            tsid,
            entity_type: TypeTag::Player,
            body: json!({}),
            last_modified: Utc::now(),
        };
        assert!(matches!(
            Entity::from_serialized(se),
            Err(ModelError::WrongTag { .. })
        ));
    }
}
