//! Game state
//!
//! Player and world models: per-connection player state, the slot table,
//! and the voxel world with its streaming helpers.

pub mod player;
pub mod world;

pub use player::{Player, PlayerTable};
pub use world::VoxelWorld;
