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

use crate::error::ObjrefError;
use async_trait::async_trait;
use serde_json::Value;
use shard_model::ObjrefRecord;
use shard_tsid::Tsid;
use std::sync::Arc;

/// Whatever can load and mutate the body of a cross-shard-reachable
/// entity on behalf of a resolver proxy (spec §4.5). Implemented by
/// `shard-cache`'s live-object cache; this crate only depends on the
/// trait so `shard-objref` stays below `shard-cache` in the dependency
/// order of spec §2.
///
/// `resolve_body`/`mutate_body` may cross shards via RPC (spec §4.5
/// "this may cross shards via RPC"); both are `async` so the calling
/// queue worker suspends rather than blocks (spec §5).
#[async_trait]
pub trait EntityResolver: Send + Sync {
    async fn resolve_body(&self, tsid: &Tsid) -> Result<Value, ObjrefError>;

    async fn mutate_body(
        &self,
        tsid: &Tsid,
        mutator: Box<dyn FnOnce(&mut Value) + Send>,
    ) -> Result<(), ObjrefError>;
}

/// A handle wrapping an [`ObjrefRecord`] (spec §4.5 "resolver proxy").
///
/// Reading `tsid`/`label` is direct, no resolution. Reading any other
/// attribute, or any write/delete, goes through the [`EntityResolver`]
/// and may load or cross shards. There is deliberately no `new`/`call`
/// API on this type: spec §4.5 "construction or invocation on a proxy
/// is an error" is enforced by the type simply not offering those
/// operations.
#[derive(Clone)]
pub struct ObjrefHandle {
    record: ObjrefRecord,
    resolver: Arc<dyn EntityResolver>,
}

impl ObjrefHandle {
    pub fn new(record: ObjrefRecord, resolver: Arc<dyn EntityResolver>) -> Self {
        Self { record, resolver }
    }

    pub fn record(&self) -> &ObjrefRecord {
        &self.record
    }

    pub fn tsid(&self) -> &Tsid {
        &self.record.tsid
    }

    /// Direct read off the objref record itself; never resolves.
    pub fn label(&self) -> Option<&str> {
        self.record.label.as_deref()
    }

    /// Resolves the target and reads `key` off its body.
    pub async fn get(&self, key: &str) -> Result<Option<Value>, ObjrefError> {
        let body = self.resolver.resolve_body(self.tsid()).await?;
        Ok(body.get(key).cloned())
    }

    /// Resolves the target and checks whether `key` is present ("has"
    /// semantics reflect the loaded entity, spec §4.5).
    pub async fn has(&self, key: &str) -> Result<bool, ObjrefError> {
        let body = self.resolver.resolve_body(self.tsid()).await?;
        Ok(body.get(key).is_some())
    }

    /// Resolves the target and lists its own keys.
    pub async fn keys(&self) -> Result<Vec<String>, ObjrefError> {
        let body = self.resolver.resolve_body(self.tsid()).await?;
        Ok(match body {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        })
    }

    /// Writes target the loaded entity (spec §4.5).
    pub async fn set(&self, key: &str, value: Value) -> Result<(), ObjrefError> {
        let key = key.to_string();
        self.resolver
            .mutate_body(
                self.tsid(),
                Box::new(move |body| {
                    if let Value::Object(map) = body {
                        map.insert(key, value);
                    }
                }),
            )
            .await
    }

    /// Deletes target the loaded entity.
    pub async fn delete(&self, key: &str) -> Result<(), ObjrefError> {
        let key = key.to_string();
        self.resolver
            .mutate_body(
                self.tsid(),
                Box::new(move |body| {
                    if let Value::Object(map) = body {
                        map.remove(&key);
                    }
                }),
            )
            .await
    }
}

impl std::fmt::Debug for ObjrefHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjrefHandle")
            .field("tsid", &self.record.tsid)
            .field("label", &self.record.label)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;
    use shard_tsid::TypeTag;
    use std::sync::Mutex;

    struct FakeResolver {
        body: Mutex<Value>,
    }

    #[async_trait]
    impl EntityResolver for FakeResolver {
        async fn resolve_body(&self, _tsid: &Tsid) -> Result<Value, ObjrefError> {
            Ok(self.body.lock().unwrap().clone())
        }

        async fn mutate_body(
            &self,
            _tsid: &Tsid,
            mutator: Box<dyn FnOnce(&mut Value) + Send>,
        ) -> Result<(), ObjrefError> {
            mutator(&mut self.body.lock().unwrap());
            Ok(())
        }
    }

    #[tokio::test]
    async fn label_reads_direct_without_resolving() {
        let mut rng = StdRng::seed_from_u64(1);
        let tsid = Tsid::mint(TypeTag::Item, &mut rng);
        let record = ObjrefRecord::with_label(tsid, "a sword");
        let resolver = Arc::new(FakeResolver {
            body: Mutex::new(json!({"count": 1})),
        });
        let handle = ObjrefHandle::new(record, resolver);
        assert_eq!(handle.label(), Some("a sword"));
    }

    #[tokio::test]
    async fn get_resolves_and_reads_attribute() {
        let mut rng = StdRng::seed_from_u64(2);
        let tsid = Tsid::mint(TypeTag::Item, &mut rng);
        let record = ObjrefRecord::new(tsid);
        let resolver = Arc::new(FakeResolver {
            body: Mutex::new(json!({"count": 3})),
        });
        let handle = ObjrefHandle::new(record, resolver);
        assert_eq!(handle.get("count").await.unwrap(), Some(json!(3)));
        assert_eq!(handle.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_mutates_loaded_entity() {
        let mut rng = StdRng::seed_from_u64(3);
        let tsid = Tsid::mint(TypeTag::Item, &mut rng);
        let record = ObjrefRecord::new(tsid);
        let resolver = Arc::new(FakeResolver {
            body: Mutex::new(json!({"count": 3})),
        });
        let handle = ObjrefHandle::new(record, resolver);
        handle.set("count", json!(9)).await.unwrap();
        assert_eq!(handle.get("count").await.unwrap(), Some(json!(9)));
    }
}
