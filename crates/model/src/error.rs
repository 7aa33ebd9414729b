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

use shard_tsid::{Tsid, TsidError};

#[derive(Debug, thiserror::Error, Clone, Eq, PartialEq)]
pub enum ModelError {
    #[error("tsid error: {0}")]
    Tsid(#[from] TsidError),
    #[error("{tsid} is not a {expected} tsid")]
    WrongTag { tsid: Tsid, expected: &'static str },
    #[error("location {location} geometry must share its suffix, got {geometry}")]
    GeometrySuffixMismatch { location: Tsid, geometry: Tsid },
    #[error("count must be >= 0, got {0}")]
    NegativeCount(i64),
    #[error("stackmax must be >= 1, got {0}")]
    InvalidStackmax(i64),
    #[error("cannot delete a stack with count {0} != 0")]
    NonZeroCountOnDelete(i64),
    #[error("malformed entity body: {0}")]
    MalformedBody(String),
}
