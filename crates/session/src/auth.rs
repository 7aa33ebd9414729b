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

use crate::error::SessionError;
use async_trait::async_trait;
use shard_tsid::Tsid;
use std::collections::HashMap;

/// Authenticates a `login_start` token into the player TSID it grants
/// access to (spec §4.1 "the concrete token scheme is out of scope; the
/// session layer only needs something implementing this trait"). The
/// production auth module lives outside this crate (spec §1 Non-goals).
#[async_trait]
pub trait AuthModule: Send + Sync {
    async fn validate(&self, token: &str) -> Result<Tsid, SessionError>;
}

/// A fixed token→player map, useful for tests and any deployment that
/// provisions tokens out of band rather than through a live auth service.
#[derive(Default)]
pub struct StaticTokenAuth {
    tokens: HashMap<String, Tsid>,
}

impl StaticTokenAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, player: Tsid) -> Self {
        self.tokens.insert(token.into(), player);
        self
    }
}

#[async_trait]
impl AuthModule for StaticTokenAuth {
    async fn validate(&self, token: &str) -> Result<Tsid, SessionError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| SessionError::Auth(format!("unknown token: {token}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use shard_tsid::TypeTag;

    #[tokio::test]
    async fn validates_known_token() {
        let mut rng = StdRng::seed_from_u64(1);
        let player = Tsid::mint(TypeTag::Player, &mut rng);
        let auth = StaticTokenAuth::new().with_token("tok-1", player.clone());
        assert_eq!(auth.validate("tok-1").await.unwrap(), player);
    }

    #[tokio::test]
    async fn rejects_unknown_token() {
        let auth = StaticTokenAuth::new();
        assert!(matches!(
            auth.validate("nope").await,
            Err(SessionError::Auth(_))
        ));
    }
}
