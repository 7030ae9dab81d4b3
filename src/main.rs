//! Feldspar ClassiCube Server
//!
//! A ClassiCube Classic Protocol v7 server written in Rust.

#![deny(
    clippy::too_many_lines,
    missing_docs,
    clippy::panic,
)]

use clap::Parser;
use feldspar::config::ServerConfig;
use feldspar::game::world::loader;
use feldspar::plugins;
use feldspar::server::ClassicServer;
use feldspar::{Result, logger};
use std::path::{Path, PathBuf};

/// Where the JSON configuration is read from
const CONFIG_PATH: &str = "feldspar.json";

/// Where log files are written
const LOG_DIR: &str = "logs";

/// A simple server for ClassiCube
#[derive(Parser, Debug)]
#[command(name = "feldspar", version, about)]
struct Args {
    /// Name of the server
    #[arg(long)]
    name: Option<String>,

    /// Message of the day
    #[arg(long)]
    motd: Option<String>,

    /// Level file the server should serve
    #[arg(long)]
    level: Option<PathBuf>,

    /// Port the server will listen on
    #[arg(long)]
    port: Option<u16>,

    /// Maximum number of players
    #[arg(long)]
    players: Option<usize>,

    /// Disable name verification
    #[arg(long)]
    no_verify: bool,

    /// Show more verbose output in the terminal
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// CLI values override whatever the config file said
    fn apply(self, config: &mut ServerConfig) {
        if let Some(name) = self.name {
            config.name = name;
        }
        if let Some(motd) = self.motd {
            config.motd = motd;
        }
        if let Some(level) = self.level {
            config.level = Some(level);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(players) = self.players {
            config.max_players = players;
        }
        if self.no_verify {
            config.verify_names = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(args.verbose, Path::new(LOG_DIR))?;
    tracing::info!("Feldspar v{}", env!("CARGO_PKG_VERSION"));

    let mut config = ServerConfig::load_or_default(CONFIG_PATH);
    args.apply(&mut config);

    if !config.verify_names {
        tracing::warn!(
            "name verification is disabled; usernames are not checked against the tracker"
        );
    }

    let world = match &config.level {
        Some(path) => loader::load_level(path, config.level_dims())?,
        None => loader::flat_level(config.level_dims())?,
    };
    let size = world.size();
    tracing::info!("level ready ({}x{}x{} blocks)", size.x, size.y, size.z);

    let mut server = ClassicServer::new(config, world);
    plugins::register_all(&mut server);
    server.run().await
}
