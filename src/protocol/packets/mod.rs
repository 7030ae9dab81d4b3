//! Classic protocol packets
//!
//! This module contains all packet definitions organized by direction.
//! Bidirectional packets (position updates and chat) live with the
//! serverbound set, where they are parsed.

pub mod clientbound;
pub mod serverbound;

pub use clientbound::{
    DespawnPlayer, Disconnect, LevelDataChunk, LevelFinalize, ServerIdentification, ServerPacket,
    ServerSetBlock, SpawnPlayer, UpdateUserType,
};
pub use serverbound::{ChatMessage, ClientPacket, ClientSetBlock, PlayerIdentification, PositionUpdate};
