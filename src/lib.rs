//! Feldspar ClassiCube Server Library
//!
//! A complete implementation of the Classic Protocol v7 (with the CPE
//! marker byte) for running multiplayer voxel servers compatible with
//! ClassiCube and Minecraft Classic clients.
//!
//! # Architecture
//!
//! The server is organized into several key modules:
//!
//! - [`protocol`] - the wire codec: typed fields, packet descriptors, and
//!   the packet structs themselves
//! - [`network`] - connection management: the accept loop and the
//!   per-connection task trio
//! - [`game`] - player and world state
//! - [`server`] - the dispatch loop tying everything together
//! - [`events`] / [`command`] / [`plugins`] - the plugin surface
//! - [`config`] - configuration management
//!
//! # Example
//!
//! ```rust,no_run
//! use feldspar::config::ServerConfig;
//! use feldspar::game::world::loader;
//! use feldspar::plugins;
//! use feldspar::server::ClassicServer;
//!
//! #[tokio::main]
//! async fn main() -> feldspar::Result<()> {
//!     let config = ServerConfig::default();
//!     let world = loader::flat_level(config.level_dims())?;
//!     let mut server = ClassicServer::new(config, world);
//!     plugins::register_all(&mut server);
//!     server.run().await
//! }
//! ```

#![deny(
    clippy::too_many_lines,
    missing_docs,
    clippy::panic,
)]

pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod game;
pub mod logger;
pub mod network;
pub mod plugins;
pub mod protocol;
pub mod server;

pub use error::{Result, ServerError};
