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

use rand::Rng;
use serde::{Deserialize, Serialize};
use shard_tsid::{Tsid, TypeTag};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;

/// One entry of `net.gameServers` (spec §6): a shard's stable id plus
/// where to reach its RPC listener.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ShardId(pub String);

impl std::fmt::Display for ShardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShardEntry {
    pub id: ShardId,
    pub rpc_addr: SocketAddr,
}

/// The cluster's shard configuration (spec §4.6 "the mapping is
/// deterministic given the cluster configuration"). Only TOP-LEVEL
/// entities (Location, Geometry, Group — spec §4.6 "Local TSID
/// minting") hash directly into this table; the owning shard of every
/// other entity kind is derived by walking to its top-level container
/// first (spec §3 "Ownership" — a job for `shard-cache`, which has the
/// entity graph this crate does not).
#[derive(Clone, Debug)]
pub struct ShardTable {
    shards: Vec<ShardEntry>,
    local: ShardId,
}

impl ShardTable {
    pub fn new(shards: Vec<ShardEntry>, local: ShardId) -> Self {
        assert!(
            shards.iter().any(|s| s.id == local),
            "local shard id must be present in its own shard table"
        );
        Self { shards, local }
    }

    pub fn local_shard(&self) -> &ShardId {
        &self.local
    }

    pub fn entry(&self, id: &ShardId) -> Option<&ShardEntry> {
        self.shards.iter().find(|s| &s.id == id)
    }

    /// Every shard in the cluster, including this one. Used at daemon
    /// startup to connect an `RpcClient` to each peer.
    pub fn shards(&self) -> &[ShardEntry] {
        &self.shards
    }

    pub fn is_local(&self, id: &ShardId) -> bool {
        id == &self.local
    }

    /// Deterministic hash of a top-level TSID into the shard table (spec
    /// §4.6 "a hash of the TSID into the configured shard table").
    pub fn map_to_shard(&self, tsid: &Tsid) -> ShardId {
        assert!(
            !self.shards.is_empty(),
            "shard table must have at least one shard"
        );
        let mut hasher = DefaultHasher::new();
        tsid.as_str().hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.shards.len();
        self.shards[idx].id.clone()
    }

    /// Mints a TSID that maps back to the current shard, retrying a
    /// bounded number of candidates (spec §4.6 "Local TSID minting").
    /// Only valid for top-level types; callers must not use this for
    /// item/bag/quest/data-container TSIDs, which inherit placement
    /// from their container instead.
    pub fn make_local_tsid(
        &self,
        tag: TypeTag,
        rng: &mut impl Rng,
        max_attempts: u32,
    ) -> Option<Tsid> {
        assert!(
            tag.is_top_level(),
            "make_local_tsid is only valid for top-level entity types"
        );
        for _ in 0..max_attempts {
            let candidate = Tsid::mint(tag, rng);
            if self.map_to_shard(&candidate) == self.local {
                return Some(candidate);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn table(n: usize, local_idx: usize) -> ShardTable {
        let shards: Vec<_> = (0..n)
            .map(|i| ShardEntry {
                id: ShardId(format!("gs{i}")),
                rpc_addr: "127.0.0.1:0".parse().unwrap(),
            })
            .collect();
        let local = shards[local_idx].id.clone();
        ShardTable::new(shards, local)
    }

    #[test]
    fn map_to_shard_is_deterministic() {
        let t = table(4, 0);
        let mut rng = StdRng::seed_from_u64(1);
        let tsid = Tsid::mint(TypeTag::Location, &mut rng);
        assert_eq!(t.map_to_shard(&tsid), t.map_to_shard(&tsid));
    }

    #[test]
    fn make_local_tsid_maps_back_to_local_shard() {
        let t = table(4, 2);
        let mut rng = StdRng::seed_from_u64(5);
        let tsid = t
            .make_local_tsid(TypeTag::Location, &mut rng, 10_000)
            .expect("should find a candidate within bounded retries");
        assert_eq!(t.map_to_shard(&tsid), *t.local_shard());
    }

    #[test]
    #[should_panic]
    fn make_local_tsid_rejects_non_top_level_type() {
        let t = table(1, 0);
        let mut rng = StdRng::seed_from_u64(1);
        let _ = t.make_local_tsid(TypeTag::Item, &mut rng, 1);
    }
}
