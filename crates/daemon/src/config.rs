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

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

/// One entry of `net.gameServers` (spec §6): this shard's view of every
/// shard in the cluster, including itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameServerConfig {
    pub id: String,
    pub rpc_addr: SocketAddr,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetConfig {
    /// `net.maxMsgSize`.
    pub max_msg_size: usize,
    /// `net.gameServers`.
    pub game_servers: Vec<GameServerConfig>,
    /// Which entry of `game_servers` this process is.
    pub local_shard: String,
    /// Address this process's wire session listener binds.
    pub wire_listen: SocketAddr,
    /// `net.rpc.basePort` — overrides the port of this shard's own
    /// `game_servers` entry when binding the RPC listener, so one
    /// `game_servers.yaml` can be shared across a cluster with only the
    /// host portion differing per machine.
    pub rpc_base_port: Option<u16>,
    /// `net.rpc.timeout`, milliseconds.
    pub rpc_timeout_ms: u64,
    /// Spec §4.6 "disconnect buffer window" before a buffered call fails
    /// with `ConnectionUnavailable`.
    pub rpc_buffer_window_ms: u64,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            max_msg_size: 1 << 20,
            game_servers: Vec::new(),
            local_shard: "s1".to_string(),
            wire_listen: "0.0.0.0:7000".parse().unwrap(),
            rpc_base_port: None,
            rpc_timeout_ms: 5_000,
            rpc_buffer_window_ms: 2_000,
        }
    }
}

/// `pers.backEnd.module`: which [`shard_persistence`] backend to open.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceModule {
    #[default]
    Fjall,
    Memory,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersConfig {
    /// `pers.backEnd.module`.
    pub back_end_module: PersistenceModule,
    /// `pers.backEnd.config` — for `fjall`, the on-disk path.
    pub back_end_path: PathBuf,
    /// `pers.locUnloadInt`, seconds.
    pub loc_unload_interval_secs: u64,
}

impl Default for PersConfig {
    fn default() -> Self {
        Self {
            back_end_module: PersistenceModule::default(),
            back_end_path: PathBuf::from("data/entities"),
            loc_unload_interval_secs: 300,
        }
    }
}

/// `auth.module` — the only built-in option is a fixed token table;
/// production deployments supply their own [`shard_session::AuthModule`]
/// by embedding this crate rather than configuring one here (spec §1
/// Non-goals "out of scope... the concrete token scheme").
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub module: String,
    pub static_tokens: HashMap<String, String>,
}

/// Top-level configuration (spec §6's Configuration table). Loaded by
/// layering defaults, an optional YAML file, and `SHARD_`-prefixed
/// environment variables, in that order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub data_dir: PathBuf,
    pub net: NetConfig,
    pub pers: PersConfig,
    pub auth: AuthConfig,
    /// `gsjs.config` — an opaque bundle handed to whatever scripting
    /// layer is wired in; the core never interprets it (spec §1
    /// Non-goals "does not evaluate game logic").
    pub gsjs_config: serde_json::Value,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            net: NetConfig::default(),
            pers: PersConfig::default(),
            auth: AuthConfig::default(),
            gsjs_config: serde_json::Value::Null,
        }
    }
}

impl Config {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.net.rpc_timeout_ms)
    }

    pub fn rpc_buffer_window(&self) -> Duration {
        Duration::from_millis(self.net.rpc_buffer_window_ms)
    }

    pub fn loc_unload_interval(&self) -> Duration {
        Duration::from_secs(self.pers.loc_unload_interval_secs)
    }

    pub fn local_shard_entry(&self) -> Option<&GameServerConfig> {
        self.net
            .game_servers
            .iter()
            .find(|s| s.id == self.net.local_shard)
    }

    /// Spec §6: layers defaults, an optional YAML file, then
    /// `SHARD_`-prefixed environment variables, lowest to highest
    /// priority. Command-line flags are merged in afterwards by
    /// [`crate::args::Args::merge_config`].
    pub fn load(config_file: Option<&Path>) -> Result<Config, figment::Error> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = config_file {
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed("SHARD_").split("_"))
            .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_json() {
        let config = Config::default();
        let value = serde_json::to_value(&config).unwrap();
        let back: Config = serde_json::from_value(value).unwrap();
        assert_eq!(back.net.max_msg_size, config.net.max_msg_size);
    }
}
