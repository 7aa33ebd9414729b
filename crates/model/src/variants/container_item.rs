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
use shard_tsid::Tsid;

/// The shared shape backing both Item and Bag entities (spec §3 row
/// "Item/Bag"): a single live container backref, an xy-or-slot position,
/// a stack count, a class tag, and a stack limit.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ContainerItemBody {
    /// TSID of the player, location, or bag currently holding this item.
    /// Exactly one container is live at any time (spec §3).
    pub container: Tsid,
    pub slot: Option<u32>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub count: i64,
    pub class_tag: String,
    pub stackmax: i64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub path_tsid: Option<Tsid>,
    /// True while a "growing" or "running" timer is active on this item
    /// (spec §4.4 "Unload policy" — a location may not unload while any
    /// contained item has one of these timers active). The timer itself
    /// is gameplay-script state this crate does not model; this flag is
    /// the narrow signal the unload check consumes.
    #[serde(default)]
    pub has_active_timer: bool,
}

impl ContainerItemBody {
    pub fn new(
        container: Tsid,
        class_tag: impl Into<String>,
        count: i64,
        stackmax: i64,
    ) -> Result<Self, ModelError> {
        if count < 0 {
            return Err(ModelError::NegativeCount(count));
        }
        if stackmax < 1 {
            return Err(ModelError::InvalidStackmax(stackmax));
        }
        Ok(Self {
            container,
            slot: None,
            x: None,
            y: None,
            count,
            class_tag: class_tag.into(),
            stackmax,
            label: None,
            path_tsid: None,
            has_active_timer: false,
        })
    }

    /// Validates the "deletion implies count==0 for stacks" invariant
    /// before a caller marks this item's entity deleted.
    pub fn check_deletable(&self) -> Result<(), ModelError> {
        if self.count != 0 {
            return Err(ModelError::NonZeroCountOnDelete(self.count));
        }
        Ok(())
    }

    pub fn set_count(&mut self, count: i64) -> Result<(), ModelError> {
        if count < 0 {
            return Err(ModelError::NegativeCount(count));
        }
        self.count = count;
        Ok(())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("ContainerItemBody is always representable as JSON")
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
    use shard_tsid::TypeTag;

    #[test]
    fn rejects_negative_count() {
        let mut rng = StdRng::seed_from_u64(3);
        let loc = Tsid::mint(TypeTag::Location, &mut rng);
        assert!(matches!(
            ContainerItemBody::new(loc, "sword", -1, 1),
            Err(ModelError::NegativeCount(-1))
        ));
    }

    #[test]
    fn rejects_zero_stackmax() {
        let mut rng = StdRng::seed_from_u64(3);
        let loc = Tsid::mint(TypeTag::Location, &mut rng);
        assert!(matches!(
            ContainerItemBody::new(loc, "sword", 1, 0),
            Err(ModelError::InvalidStackmax(0))
        ));
    }

    #[test]
    fn non_zero_count_blocks_deletion() {
        let mut rng = StdRng::seed_from_u64(3);
        let loc = Tsid::mint(TypeTag::Location, &mut rng);
        let item = ContainerItemBody::new(loc, "potion", 3, 10).unwrap();
        assert!(item.check_deletable().is_err());
    }

    #[test]
    fn zero_count_allows_deletion() {
        let mut rng = StdRng::seed_from_u64(3);
        let loc = Tsid::mint(TypeTag::Location, &mut rng);
        let item = ContainerItemBody::new(loc, "potion", 0, 10).unwrap();
        assert!(item.check_deletable().is_ok());
    }
}
