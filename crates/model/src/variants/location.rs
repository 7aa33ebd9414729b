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
use shard_tsid::{Tsid, TypeTag};
use std::collections::BTreeMap;

/// Spec §3: "player and item tables keyed by TSID"; "geometry TSID
/// equals location TSID with `G` prefix".
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LocationBody {
    pub players: BTreeMap<Tsid, ObjrefRecord>,
    pub items: BTreeMap<Tsid, ObjrefRecord>,
    pub geometry: Tsid,
}

impl LocationBody {
    /// Builds a new location body, checking the geometry-suffix invariant
    /// against the location's own TSID.
    pub fn new(location_tsid: &Tsid, geometry: Tsid) -> Result<Self, ModelError> {
        if location_tsid.tag() != TypeTag::Location {
            return Err(ModelError::WrongTag {
                tsid: location_tsid.clone(),
                expected: "location",
            });
        }
        if geometry.suffix() != location_tsid.suffix() {
            return Err(ModelError::GeometrySuffixMismatch {
                location: location_tsid.clone(),
                geometry,
            });
        }
        Ok(Self {
            players: BTreeMap::new(),
            items: BTreeMap::new(),
            geometry,
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("LocationBody is always representable as JSON")
    }

    pub fn from_value(value: &Value) -> Result<Self, ModelError> {
        serde_json::from_value(value.clone()).map_err(|e| ModelError::MalformedBody(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn rejects_mismatched_geometry_suffix() {
        let mut rng = StdRng::seed_from_u64(1);
        let loc = Tsid::mint(TypeTag::Location, &mut rng);
        let bad_geo = Tsid::mint(TypeTag::Geometry, &mut rng);
        assert!(matches!(
            LocationBody::new(&loc, bad_geo),
            Err(ModelError::GeometrySuffixMismatch { .. })
        ));
    }

    #[test]
    fn accepts_matching_geometry_suffix() {
        let mut rng = StdRng::seed_from_u64(1);
        let loc = Tsid::mint(TypeTag::Location, &mut rng);
        let geo = Tsid::with_tag_and_suffix(TypeTag::Geometry, loc.suffix());
        assert!(LocationBody::new(&loc, geo).is_ok());
    }

    #[test]
    fn json_round_trip() {
        let mut rng = StdRng::seed_from_u64(1);
        let loc = Tsid::mint(TypeTag::Location, &mut rng);
        let geo = Tsid::with_tag_and_suffix(TypeTag::Geometry, loc.suffix());
        let body = LocationBody::new(&loc, geo).unwrap();
        let value = body.to_value();
        let back = LocationBody::from_value(&value).unwrap();
        assert_eq!(body, back);
    }
}
