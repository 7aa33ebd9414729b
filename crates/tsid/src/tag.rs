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
use std::fmt;

/// The type tag encoded as the first character of every TSID (spec §3).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    Location,
    Geometry,
    Player,
    Item,
    Bag,
    Group,
    Quest,
    DataContainer,
}

impl TypeTag {
    pub const fn as_char(self) -> char {
        match self {
            TypeTag::Location => 'L',
            TypeTag::Geometry => 'G',
            TypeTag::Player => 'P',
            TypeTag::Item => 'I',
            TypeTag::Bag => 'B',
            TypeTag::Group => 'R',
            TypeTag::Quest => 'Q',
            TypeTag::DataContainer => 'D',
        }
    }

    pub const fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'L' => TypeTag::Location,
            'G' => TypeTag::Geometry,
            'P' => TypeTag::Player,
            'I' => TypeTag::Item,
            'B' => TypeTag::Bag,
            'R' => TypeTag::Group,
            'Q' => TypeTag::Quest,
            'D' => TypeTag::DataContainer,
            _ => return None,
        })
    }

    /// Top-level types are minted directly on a shard (§4.6 "Local TSID
    /// minting"); everything else inherits placement from its container.
    pub const fn is_top_level(self) -> bool {
        matches!(self, TypeTag::Location | TypeTag::Geometry | TypeTag::Group)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}
