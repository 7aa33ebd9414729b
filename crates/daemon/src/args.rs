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

use crate::config::Config;
use clap::builder::ValueHint;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "shard-daemon")]
#[command(about = "One shard of a sharded persistent 2D social world")]
pub struct Args {
    #[arg(
        short,
        long,
        value_name = "config",
        help = "Path to a YAML configuration file. Command-line flags override values it sets.",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[arg(
        long,
        value_name = "data-dir",
        help = "Directory this shard owns: the persistence back-end's files and the lock file that keeps two daemons from sharing it"
    )]
    pub data_dir: Option<PathBuf>,

    #[arg(
        long,
        value_name = "wire-listen",
        help = "Address the client wire session listener binds"
    )]
    pub wire_listen: Option<SocketAddr>,

    #[arg(long, help = "Enable debug-level logging")]
    pub debug: bool,
}

impl Args {
    /// Spec §6: command-line flags are the last, highest-priority layer
    /// over the YAML file and environment.
    pub fn merge_config(&self, mut config: Config) -> Config {
        if let Some(data_dir) = self.data_dir.clone() {
            config.data_dir = data_dir;
        }
        if let Some(wire_listen) = self.wire_listen {
            config.net.wire_listen = wire_listen;
        }
        config
    }
}
