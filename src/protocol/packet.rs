//! Packet descriptors
//!
//! The Classic protocol frames every packet as a one-byte ID followed by a
//! fixed-size payload. This module carries the declarative descriptor table
//! for the whole packet set: each descriptor names a packet and lists its
//! typed fields in wire order, which is enough to derive payload sizes and
//! drive the inbound framing loop.

use crate::error::Result;
use crate::protocol::types::{BYTE_ARRAY_LENGTH, STRING_LENGTH};
use std::io::{Read, Write};

/// Wire type of a single packet field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Integer 0..255, one byte
    UnsignedByte,
    /// Integer -128..127, one byte
    SignedByte,
    /// Big-endian i16, two bytes
    Short,
    /// 64-byte space-padded ASCII string
    String,
    /// 1024-byte null-padded array
    ByteArray,
    /// Whole-block position, three big-endian i16
    CoarseVector,
    /// 1/32-block position plus yaw and pitch
    FineVector,
}

impl FieldType {
    /// Encoded size of this field in bytes
    pub const fn size(self) -> usize {
        match self {
            FieldType::UnsignedByte | FieldType::SignedByte => 1,
            FieldType::Short => 2,
            FieldType::String => STRING_LENGTH,
            FieldType::ByteArray => BYTE_ARRAY_LENGTH,
            FieldType::CoarseVector => 6,
            FieldType::FineVector => 8,
        }
    }
}

/// A named, typed field within a packet
#[derive(Debug, Clone, Copy)]
pub struct Field {
    /// Wire type of the field
    pub ty: FieldType,
    /// Field name as referenced by handlers
    pub name: &'static str,
}

impl Field {
    const fn new(ty: FieldType, name: &'static str) -> Self {
        Self { ty, name }
    }
}

/// Metadata for one packet kind: its ID and ordered field list
#[derive(Debug)]
pub struct PacketDescriptor {
    /// Packet ID byte
    pub id: u8,
    /// Packet name, for diagnostics
    pub name: &'static str,
    /// Fields in wire order
    pub fields: &'static [Field],
}

impl PacketDescriptor {
    /// Payload size in bytes (the ID byte is not included)
    pub fn size(&self) -> usize {
        self.fields.iter().map(|field| field.ty.size()).sum()
    }
}

/// Player Identification (Client -> Server, 0x00)
pub static PLAYER_IDENTIFICATION: PacketDescriptor = PacketDescriptor {
    id: 0x00,
    name: "PlayerIdentification",
    fields: &[
        Field::new(FieldType::UnsignedByte, "version"),
        Field::new(FieldType::String, "username"),
        Field::new(FieldType::String, "mp_pass"),
        Field::new(FieldType::UnsignedByte, "cpe_byte"),
    ],
};

/// Server Identification (Server -> Client, 0x00)
pub static SERVER_IDENTIFICATION: PacketDescriptor = PacketDescriptor {
    id: 0x00,
    name: "ServerIdentification",
    fields: &[
        Field::new(FieldType::UnsignedByte, "version"),
        Field::new(FieldType::String, "name"),
        Field::new(FieldType::String, "motd"),
        Field::new(FieldType::UnsignedByte, "user_type"),
    ],
};

/// Ping (Server -> Client, 0x01)
pub static PING: PacketDescriptor = PacketDescriptor {
    id: 0x01,
    name: "Ping",
    fields: &[],
};

/// Level Initialize (Server -> Client, 0x02)
pub static LEVEL_INITIALIZE: PacketDescriptor = PacketDescriptor {
    id: 0x02,
    name: "LevelInitialize",
    fields: &[],
};

/// Level Data Chunk (Server -> Client, 0x03)
pub static LEVEL_DATA_CHUNK: PacketDescriptor = PacketDescriptor {
    id: 0x03,
    name: "LevelDataChunk",
    fields: &[
        Field::new(FieldType::Short, "length"),
        Field::new(FieldType::ByteArray, "data"),
        Field::new(FieldType::UnsignedByte, "percent"),
    ],
};

/// Level Finalize (Server -> Client, 0x04)
pub static LEVEL_FINALIZE: PacketDescriptor = PacketDescriptor {
    id: 0x04,
    name: "LevelFinalize",
    fields: &[Field::new(FieldType::CoarseVector, "map_size")],
};

/// Set Block (Client -> Server, 0x05)
pub static CLIENT_SET_BLOCK: PacketDescriptor = PacketDescriptor {
    id: 0x05,
    name: "ClientSetBlock",
    fields: &[
        Field::new(FieldType::CoarseVector, "position"),
        Field::new(FieldType::UnsignedByte, "mode"),
        Field::new(FieldType::UnsignedByte, "block"),
    ],
};

/// Set Block (Server -> Client, 0x06)
pub static SERVER_SET_BLOCK: PacketDescriptor = PacketDescriptor {
    id: 0x06,
    name: "ServerSetBlock",
    fields: &[
        Field::new(FieldType::CoarseVector, "position"),
        Field::new(FieldType::UnsignedByte, "block"),
    ],
};

/// Spawn Player (Server -> Client, 0x07)
pub static SPAWN_PLAYER: PacketDescriptor = PacketDescriptor {
    id: 0x07,
    name: "SpawnPlayer",
    fields: &[
        Field::new(FieldType::SignedByte, "player_id"),
        Field::new(FieldType::String, "name"),
        Field::new(FieldType::FineVector, "position"),
    ],
};

/// Position Update (Server <-> Client, 0x08)
pub static POSITION_UPDATE: PacketDescriptor = PacketDescriptor {
    id: 0x08,
    name: "PositionUpdate",
    fields: &[
        Field::new(FieldType::SignedByte, "player_id"),
        Field::new(FieldType::FineVector, "position"),
    ],
};

/// Despawn Player (Server -> Client, 0x0c)
pub static DESPAWN_PLAYER: PacketDescriptor = PacketDescriptor {
    id: 0x0c,
    name: "DespawnPlayer",
    fields: &[Field::new(FieldType::SignedByte, "player_id")],
};

/// Chat Message (Server <-> Client, 0x0d)
pub static CHAT_MESSAGE: PacketDescriptor = PacketDescriptor {
    id: 0x0d,
    name: "ChatMessage",
    fields: &[
        Field::new(FieldType::SignedByte, "player_id"),
        Field::new(FieldType::String, "message"),
    ],
};

/// Disconnect (Server -> Client, 0x0e)
pub static DISCONNECT: PacketDescriptor = PacketDescriptor {
    id: 0x0e,
    name: "Disconnect",
    fields: &[Field::new(FieldType::String, "reason")],
};

/// Update User Type (Server -> Client, 0x0f)
pub static UPDATE_USER_TYPE: PacketDescriptor = PacketDescriptor {
    id: 0x0f,
    name: "UpdateUserType",
    fields: &[Field::new(FieldType::UnsignedByte, "mode")],
};

/// Look up the descriptor for a client-to-server packet ID.
///
/// Exactly {0x00, 0x05, 0x08, 0x0d} are parseable; any other ID received
/// from a client is a framing error and drops the connection.
pub fn parseable(id: u8) -> Option<&'static PacketDescriptor> {
    match id {
        0x00 => Some(&PLAYER_IDENTIFICATION),
        0x05 => Some(&CLIENT_SET_BLOCK),
        0x08 => Some(&POSITION_UPDATE),
        0x0d => Some(&CHAT_MESSAGE),
        _ => None,
    }
}

/// Trait for all Classic protocol packets
pub trait Packet: Sized {
    /// The packet ID
    const ID: u8;

    /// The packet's wire descriptor
    fn descriptor() -> &'static PacketDescriptor;

    /// Read packet payload from a reader
    fn read<R: Read>(reader: &mut R) -> Result<Self>;

    /// Write packet payload to a writer
    fn write<W: Write>(&self, writer: &mut W) -> Result<()>;
}

/// Trait for clientbound packets (server -> client)
pub trait ClientboundPacket: Packet {}

/// Trait for serverbound packets (client -> server)
pub trait ServerboundPacket: Packet {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_sizes() {
        assert_eq!(PLAYER_IDENTIFICATION.size(), 130);
        assert_eq!(SERVER_IDENTIFICATION.size(), 130);
        assert_eq!(PING.size(), 0);
        assert_eq!(LEVEL_INITIALIZE.size(), 0);
        assert_eq!(LEVEL_DATA_CHUNK.size(), 1027);
        assert_eq!(LEVEL_FINALIZE.size(), 6);
        assert_eq!(CLIENT_SET_BLOCK.size(), 8);
        assert_eq!(SERVER_SET_BLOCK.size(), 7);
        assert_eq!(SPAWN_PLAYER.size(), 73);
        assert_eq!(POSITION_UPDATE.size(), 9);
        assert_eq!(DESPAWN_PLAYER.size(), 1);
        assert_eq!(CHAT_MESSAGE.size(), 65);
        assert_eq!(DISCONNECT.size(), 64);
        assert_eq!(UPDATE_USER_TYPE.size(), 1);
    }

    #[test]
    fn test_parseable_set() {
        assert!(parseable(0x00).is_some());
        assert!(parseable(0x05).is_some());
        assert!(parseable(0x08).is_some());
        assert!(parseable(0x0d).is_some());

        for id in [0x01, 0x02, 0x03, 0x04, 0x06, 0x07, 0x0c, 0x0e, 0x0f, 0xff] {
            assert!(parseable(id).is_none(), "0x{id:02x} must not be parseable");
        }
    }

    #[test]
    fn test_parseable_descriptors_match_ids() {
        for id in [0x00, 0x05, 0x08, 0x0d] {
            assert_eq!(parseable(id).unwrap().id, id);
        }
    }
}
