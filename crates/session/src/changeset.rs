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

use serde_json::{Map, Value};
use shard_model::variants::PlayerBody;
use shard_tsid::Tsid;
use std::collections::BTreeMap;

/// Where a queued item change belongs (spec §4.7 "`pc` map for the
/// player's own inventory, `location` map for the location the change
/// happened in"). Location-scoped changes only reach the wire once that
/// location is the player's *current* one (spec §4.7 "a change queued for
/// a location the player has since left is dropped, never flushed late").
#[derive(Clone, Debug)]
pub enum ChangeScope {
    PlayerInventory,
    Location(Tsid),
}

#[derive(Clone, Debug, Default)]
struct ItemEntry {
    fields: Map<String, Value>,
}

impl ItemEntry {
    /// Last-value-wins per field (spec §4.7 "queueing the same item twice
    /// in one request keeps only the latest value per field").
    fn merge(&mut self, removed: bool, compact: &Map<String, Value>) {
        for (k, v) in compact {
            self.fields.insert(k.clone(), v.clone());
        }
        if removed {
            self.fields.insert("removed".to_string(), Value::Bool(true));
        }
    }

    fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Accumulates one player's outbound diff across a request (spec §4.7).
/// A fresh `Changeset` is created per `Session` and drained into a single
/// outbound message whenever the request engine commits.
#[derive(Default)]
pub struct Changeset {
    pc: BTreeMap<Tsid, ItemEntry>,
    location: BTreeMap<Tsid, BTreeMap<Tsid, ItemEntry>>,
    annc: Vec<Value>,
    prop_diff: Map<String, Value>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spec §4.7 "`queueChanges(item, removed, compact)`". `compact`
    /// carries whichever of `count`/`slot`/`x`/`y`/`path_tsid`/
    /// `class_tsid`/`label` changed; callers omit fields that did not.
    pub fn queue_changes(&mut self, scope: ChangeScope, item: Tsid, removed: bool, compact: Map<String, Value>) {
        match scope {
            ChangeScope::PlayerInventory => {
                self.pc.entry(item).or_default().merge(removed, &compact);
            }
            ChangeScope::Location(location) => {
                self.location
                    .entry(location)
                    .or_default()
                    .entry(item)
                    .or_default()
                    .merge(removed, &compact);
            }
        }
    }

    /// Spec §4.7 "`queueAnnc(annc)` appends an opaque announcement;
    /// announcements are never coalesced."
    pub fn queue_annc(&mut self, annc: Value) {
        self.annc.push(annc);
    }

    /// Walks `player.stats` for bounded properties that changed and are
    /// not excluded from the client diff (spec §4.7), folds them into
    /// this changeset, and clears `changed` on each so the next commit
    /// starts from a clean slate.
    pub fn collect_property_diff(&mut self, player: &mut PlayerBody) {
        for (name, prop) in player.stats.iter_mut() {
            if prop.changed() && !prop.excluded_from_diff() {
                self.prop_diff
                    .insert(name.clone(), Value::Number(prop.value().into()));
                prop.clear_changed();
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pc.is_empty() && self.location.is_empty() && self.annc.is_empty() && self.prop_diff.is_empty()
    }

    /// Spec §4.7 "flush": drops location-scoped entries for any location
    /// other than `current_location`, renders the rest to a single
    /// `type='update'` message, and resets all accumulator state so the
    /// next request starts from empty (coalescing only ever spans a
    /// single flush interval, never across flushes).
    pub fn flush(&mut self, current_location: Option<&Tsid>) -> Option<Value> {
        if self.is_empty() {
            return None;
        }
        let pc = std::mem::take(&mut self.pc);
        let location_map = std::mem::take(&mut self.location);
        let annc = std::mem::take(&mut self.annc);
        let props = std::mem::take(&mut self.prop_diff);

        let mut pc_out = Map::new();
        for (tsid, entry) in pc {
            pc_out.insert(tsid.as_str().to_string(), entry.into_value());
        }

        let mut location_out = Map::new();
        if let Some(current) = current_location {
            if let Some(items) = location_map.into_iter().find_map(|(loc, items)| (&loc == current).then_some(items)) {
                for (tsid, entry) in items {
                    location_out.insert(tsid.as_str().to_string(), entry.into_value());
                }
            }
        }

        if pc_out.is_empty() && location_out.is_empty() && annc.is_empty() && props.is_empty() {
            return None;
        }

        let mut out = Map::new();
        out.insert("type".to_string(), Value::String("update".to_string()));
        out.insert("pc".to_string(), Value::Object(pc_out));
        out.insert("location".to_string(), Value::Object(location_out));
        if !annc.is_empty() {
            out.insert("annc".to_string(), Value::Array(annc));
        }
        if !props.is_empty() {
            out.insert("stats".to_string(), Value::Object(props));
        }
        Some(Value::Object(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;
    use shard_tsid::TypeTag;

    fn tsid(rng: &mut StdRng, tag: TypeTag) -> Tsid {
        Tsid::mint(tag, rng)
    }

    #[test]
    fn repeated_queue_changes_on_same_item_coalesce_last_value_wins() {
        let mut rng = StdRng::seed_from_u64(1);
        let item = tsid(&mut rng, TypeTag::Item);
        let mut cs = Changeset::new();
        cs.queue_changes(
            ChangeScope::PlayerInventory,
            item.clone(),
            false,
            serde_json::from_value(json!({"count": 1})).unwrap(),
        );
        cs.queue_changes(
            ChangeScope::PlayerInventory,
            item.clone(),
            false,
            serde_json::from_value(json!({"count": 5})).unwrap(),
        );
        let msg = cs.flush(None).unwrap();
        assert_eq!(msg["pc"][item.as_str()]["count"], json!(5));
    }

    #[test]
    fn location_scoped_change_dropped_when_player_has_left() {
        let mut rng = StdRng::seed_from_u64(2);
        let loc_a = tsid(&mut rng, TypeTag::Location);
        let loc_b = tsid(&mut rng, TypeTag::Location);
        let item = tsid(&mut rng, TypeTag::Item);
        let mut cs = Changeset::new();
        cs.queue_changes(
            ChangeScope::Location(loc_a),
            item,
            false,
            serde_json::from_value(json!({"x": 1.0})).unwrap(),
        );
        let msg = cs.flush(Some(&loc_b));
        assert!(msg.is_none());
    }

    #[test]
    fn flush_resets_state() {
        let mut rng = StdRng::seed_from_u64(3);
        let item = tsid(&mut rng, TypeTag::Item);
        let mut cs = Changeset::new();
        cs.queue_changes(ChangeScope::PlayerInventory, item, false, Map::new());
        assert!(cs.flush(None).is_some());
        assert!(cs.is_empty());
        assert!(cs.flush(None).is_none());
    }

    #[test]
    fn announcements_never_coalesce() {
        let mut cs = Changeset::new();
        cs.queue_annc(json!({"msg": "a"}));
        cs.queue_annc(json!({"msg": "b"}));
        let msg = cs.flush(None).unwrap();
        assert_eq!(msg["annc"].as_array().unwrap().len(), 2);
    }
}
