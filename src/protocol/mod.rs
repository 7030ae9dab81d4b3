//! Classic protocol implementation
//!
//! This module implements the Classic Protocol v7 wire format: typed
//! field primitives, the declarative packet descriptor table, and the
//! packet structs themselves.

pub mod packet;
pub mod packets;
pub mod types;

pub use packet::{Packet, PacketDescriptor, parseable};
pub use packets::{ClientPacket, ServerPacket};
pub use types::Position;

/// Classic protocol version spoken by this server
pub const PROTOCOL_VERSION: u8 = 7;

/// Wire user type for operators
pub const USER_TYPE_OP: u8 = 0x64;

/// Wire user type for normal players
pub const USER_TYPE_NORMAL: u8 = 0x00;

/// CPE support marker sent in the identification packet
pub const CPE_MAGIC: u8 = 0x42;

/// Player ID clients interpret as "yourself" in spawn packets
pub const SELF_ID: i8 = -1;

/// Size of the player ID space; slots are 0..127
pub const MAX_PLAYER_SLOTS: usize = 128;
