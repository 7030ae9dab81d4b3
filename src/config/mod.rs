//! Configuration management for Feldspar
//!
//! Defaults, the JSON config file, and the CLI override surface.

pub mod server;

pub use server::ServerConfig;
