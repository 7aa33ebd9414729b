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

use crate::tag::TypeTag;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Crockford base32, minus the visually ambiguous `U`.
const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

#[derive(Debug, thiserror::Error, Clone, Eq, PartialEq)]
pub enum TsidError {
    #[error("tsid is empty")]
    Empty,
    #[error("unrecognized type tag {0:?}")]
    UnknownTag(char),
    #[error("tsid has no suffix after its type tag")]
    EmptySuffix,
    #[error("invalid base32 character {0:?} in tsid suffix")]
    InvalidSuffixChar(char),
}

/// A stable, type-tagged, immutable identifier for an entity (spec §3).
///
/// Equal TSIDs denote the same entity forever; TSIDs are never mutated or
/// recycled.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tsid(String);

impl Tsid {
    /// Parses and validates a raw TSID string.
    pub fn parse(raw: impl Into<String>) -> Result<Self, TsidError> {
        let raw = raw.into();
        let mut chars = raw.chars();
        let tag_char = chars.next().ok_or(TsidError::Empty)?;
        TypeTag::from_char(tag_char).ok_or(TsidError::UnknownTag(tag_char))?;
        let suffix: String = chars.collect();
        if suffix.is_empty() {
            return Err(TsidError::EmptySuffix);
        }
        for c in suffix.chars() {
            if !ALPHABET.contains(&(c as u8)) {
                return Err(TsidError::InvalidSuffixChar(c));
            }
        }
        Ok(Tsid(raw))
    }

    /// Mints a fresh random TSID of the given type. Collisions are left to
    /// the caller to detect (the live-object cache asserts non-presence on
    /// `create`, spec §4.4).
    pub fn mint(tag: TypeTag, rng: &mut impl Rng) -> Self {
        let value: u64 = rng.r#gen();
        Tsid(format!("{}{}", tag.as_char(), encode_base32(value)))
    }

    /// Builds a TSID deterministically from an existing suffix, used when
    /// pairing a Geometry 1:1 with its Location (same suffix, spec §3).
    pub fn with_tag_and_suffix(tag: TypeTag, suffix: &str) -> Self {
        Tsid(format!("{}{}", tag.as_char(), suffix))
    }

    pub fn tag(&self) -> TypeTag {
        TypeTag::from_char(self.0.chars().next().expect("Tsid is never empty"))
            .expect("Tsid was validated on construction")
    }

    pub fn suffix(&self) -> &str {
        &self.0[1..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tsid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Tsid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tsid({})", self.0)
    }
}

impl TryFrom<String> for Tsid {
    type Error = TsidError;
    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Tsid::parse(raw)
    }
}

impl TryFrom<&str> for Tsid {
    type Error = TsidError;
    fn try_from(raw: &str) -> Result<Self, Self::Error> {
        Tsid::parse(raw)
    }
}

fn encode_base32(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::with_capacity(13);
    while value > 0 {
        let idx = (value & 0x1f) as usize;
        buf.push(ALPHABET[idx]);
        value >>= 5;
    }
    buf.reverse();
    String::from_utf8(buf).expect("alphabet is ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn parses_valid_tsid() {
        let t = Tsid::parse("L1A2B3").unwrap();
        assert_eq!(t.tag(), TypeTag::Location);
        assert_eq!(t.suffix(), "1A2B3");
    }

    #[test]
    fn rejects_unknown_tag() {
        assert!(matches!(Tsid::parse("Z123"), Err(TsidError::UnknownTag('Z'))));
    }

    #[test]
    fn rejects_empty_suffix() {
        assert!(matches!(Tsid::parse("L"), Err(TsidError::EmptySuffix)));
    }

    #[test]
    fn rejects_ambiguous_u() {
        assert!(matches!(
            Tsid::parse("LU1"),
            Err(TsidError::InvalidSuffixChar('U'))
        ));
    }

    #[test]
    fn mint_is_stable_and_well_formed() {
        let mut rng = StdRng::seed_from_u64(42);
        let t = Tsid::mint(TypeTag::Player, &mut rng);
        assert_eq!(t.tag(), TypeTag::Player);
        // round-trips through string form unchanged
        let reparsed = Tsid::parse(t.as_str().to_string()).unwrap();
        assert_eq!(t, reparsed);
    }

    #[test]
    fn geometry_pairs_with_location_suffix() {
        let loc = Tsid::parse("L1A2B3").unwrap();
        let geo = Tsid::with_tag_and_suffix(TypeTag::Geometry, loc.suffix());
        assert_eq!(geo.suffix(), loc.suffix());
        assert_eq!(geo.tag(), TypeTag::Geometry);
    }
}
