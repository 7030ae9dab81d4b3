//! Server configuration settings
//!
//! Configuration comes from three layers: built-in defaults, an optional
//! JSON file merged over them, and command-line flags overriding both.
//! A missing or malformed file is a warning, never fatal.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server name sent in the identification packet
    pub name: String,

    /// Message of the day shown on join
    pub motd: String,

    /// Address to bind the listener to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum number of concurrent players, at most the protocol's 128
    pub max_players: usize,

    /// Whether to verify names against the shared-secret digest
    pub verify_names: bool,

    /// Level file to serve; a flat world is generated when unset
    pub level: Option<PathBuf>,

    /// Level dimensions, used when loading raw block arrays
    pub level_size: [usize; 3],

    /// Player names granted operator status on join
    pub operators: Vec<String>,

    /// Player names refused entry
    pub bans: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "Feldspar Server".to_string(),
            motd: "A ClassiCube server written in Rust".to_string(),
            host: "0.0.0.0".to_string(),
            port: 25565,
            max_players: 20,
            verify_names: true,
            level: None,
            level_size: [128, 32, 128],
            operators: Vec::new(),
            bans: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file, falling back to defaults.
    ///
    /// A missing file is expected on first run; an unreadable or
    /// malformed one logs a warning and the defaults apply.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!("ignoring malformed config {}: {err}", path.display());
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no config file at {}, using defaults", path.display());
                Self::default()
            }
            Err(err) => {
                tracing::warn!("could not read config {}: {err}", path.display());
                Self::default()
            }
        }
    }

    /// The address the listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Level dimensions as a tuple
    pub fn level_dims(&self) -> (usize, usize, usize) {
        (self.level_size[0], self.level_size[1], self.level_size[2])
    }
}
