//! Clientbound packets
//!
//! Packets the server sends to clients, and the [`ServerPacket`] union
//! that outbound queues and broadcast primitives carry.

use crate::error::Result;
use crate::protocol::packet::{self, ClientboundPacket, Packet, PacketDescriptor};
use crate::protocol::packets::serverbound::{ChatMessage, PositionUpdate};
use crate::protocol::types::{
    Position, read_byte_array, read_coarse_vector, read_fine_vector, read_short, read_signed_byte,
    read_string, read_unsigned_byte, write_byte_array, write_coarse_vector, write_fine_vector,
    write_short, write_signed_byte, write_string, write_unsigned_byte,
};
use std::io::{Read, Write};

/// Server identification packet (clientbound, 0x00)
#[derive(Debug, Clone)]
pub struct ServerIdentification {
    /// Classic protocol version, 7
    pub version: u8,
    /// Server name
    pub name: String,
    /// Message of the day
    pub motd: String,
    /// 0x64 for operators, 0x00 for normal users
    pub user_type: u8,
}

impl Packet for ServerIdentification {
    const ID: u8 = 0x00;

    fn descriptor() -> &'static PacketDescriptor {
        &packet::SERVER_IDENTIFICATION
    }

    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let version = read_unsigned_byte(reader)?;
        let name = read_string(reader)?;
        let motd = read_string(reader)?;
        let user_type = read_unsigned_byte(reader)?;
        Ok(ServerIdentification {
            version,
            name,
            motd,
            user_type,
        })
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_unsigned_byte(self.version, writer)?;
        write_string(&self.name, writer)?;
        write_string(&self.motd, writer)?;
        write_unsigned_byte(self.user_type, writer)?;
        Ok(())
    }
}

impl ClientboundPacket for ServerIdentification {}

/// Level data chunk packet (clientbound, 0x03)
///
/// One 1024-byte slice of the gzipped level stream. `length` is the
/// meaningful prefix of `data` before null padding.
#[derive(Debug, Clone)]
pub struct LevelDataChunk {
    /// Bytes of `data` that carry level content
    pub length: i16,
    /// Chunk payload, at most 1024 bytes before padding
    pub data: Vec<u8>,
    /// Whole-number percentage of the level already sent
    pub percent: u8,
}

impl Packet for LevelDataChunk {
    const ID: u8 = 0x03;

    fn descriptor() -> &'static PacketDescriptor {
        &packet::LEVEL_DATA_CHUNK
    }

    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let length = read_short(reader)?;
        let data = read_byte_array(reader)?;
        let percent = read_unsigned_byte(reader)?;
        Ok(LevelDataChunk {
            length,
            data,
            percent,
        })
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_short(self.length, writer)?;
        write_byte_array(&self.data, writer)?;
        write_unsigned_byte(self.percent, writer)?;
        Ok(())
    }
}

impl ClientboundPacket for LevelDataChunk {}

/// Level finalize packet (clientbound, 0x04)
#[derive(Debug, Clone)]
pub struct LevelFinalize {
    /// Level dimensions in blocks
    pub map_size: Position,
}

impl Packet for LevelFinalize {
    const ID: u8 = 0x04;

    fn descriptor() -> &'static PacketDescriptor {
        &packet::LEVEL_FINALIZE
    }

    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let map_size = read_coarse_vector(reader)?;
        Ok(LevelFinalize { map_size })
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_coarse_vector(&self.map_size, writer)
    }
}

impl ClientboundPacket for LevelFinalize {}

/// Set block packet (clientbound, 0x06)
#[derive(Debug, Clone)]
pub struct ServerSetBlock {
    /// Block position being set
    pub position: Position,
    /// Block ID the cell now holds
    pub block: u8,
}

impl Packet for ServerSetBlock {
    const ID: u8 = 0x06;

    fn descriptor() -> &'static PacketDescriptor {
        &packet::SERVER_SET_BLOCK
    }

    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let position = read_coarse_vector(reader)?;
        let block = read_unsigned_byte(reader)?;
        Ok(ServerSetBlock { position, block })
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_coarse_vector(&self.position, writer)?;
        write_unsigned_byte(self.block, writer)?;
        Ok(())
    }
}

impl ClientboundPacket for ServerSetBlock {}

/// Spawn player packet (clientbound, 0x07)
///
/// `player_id = -1` spawns the receiving player itself.
#[derive(Debug, Clone)]
pub struct SpawnPlayer {
    /// ID of the spawning player, or -1 for self
    pub player_id: i8,
    /// Player name shown above the model
    pub name: String,
    /// Spawn position including view direction
    pub position: Position,
}

impl Packet for SpawnPlayer {
    const ID: u8 = 0x07;

    fn descriptor() -> &'static PacketDescriptor {
        &packet::SPAWN_PLAYER
    }

    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let player_id = read_signed_byte(reader)?;
        let name = read_string(reader)?;
        let position = read_fine_vector(reader)?;
        Ok(SpawnPlayer {
            player_id,
            name,
            position,
        })
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_signed_byte(self.player_id, writer)?;
        write_string(&self.name, writer)?;
        write_fine_vector(&self.position, writer)?;
        Ok(())
    }
}

impl ClientboundPacket for SpawnPlayer {}

/// Despawn player packet (clientbound, 0x0c)
#[derive(Debug, Clone)]
pub struct DespawnPlayer {
    /// ID of the departing player
    pub player_id: i8,
}

impl Packet for DespawnPlayer {
    const ID: u8 = 0x0c;

    fn descriptor() -> &'static PacketDescriptor {
        &packet::DESPAWN_PLAYER
    }

    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let player_id = read_signed_byte(reader)?;
        Ok(DespawnPlayer { player_id })
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_signed_byte(self.player_id, writer)
    }
}

impl ClientboundPacket for DespawnPlayer {}

/// Disconnect packet (clientbound, 0x0e)
#[derive(Debug, Clone)]
pub struct Disconnect {
    /// Reason shown to the player
    pub reason: String,
}

impl Packet for Disconnect {
    const ID: u8 = 0x0e;

    fn descriptor() -> &'static PacketDescriptor {
        &packet::DISCONNECT
    }

    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let reason = read_string(reader)?;
        Ok(Disconnect { reason })
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_string(&self.reason, writer)
    }
}

impl ClientboundPacket for Disconnect {}

/// Update user type packet (clientbound, 0x0f)
#[derive(Debug, Clone)]
pub struct UpdateUserType {
    /// 0x64 grants operator status, 0x00 revokes it
    pub mode: u8,
}

impl Packet for UpdateUserType {
    const ID: u8 = 0x0f;

    fn descriptor() -> &'static PacketDescriptor {
        &packet::UPDATE_USER_TYPE
    }

    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mode = read_unsigned_byte(reader)?;
        Ok(UpdateUserType { mode })
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_unsigned_byte(self.mode, writer)
    }
}

impl ClientboundPacket for UpdateUserType {}

/// A server-to-client packet ready for an outbound queue.
///
/// Relay primitives rewrite the carried player ID before fan-out, so the
/// union exposes [`ServerPacket::set_player_id`] for the variants that
/// have one.
#[derive(Debug, Clone)]
pub enum ServerPacket {
    /// Server identification, 0x00
    Identification(ServerIdentification),
    /// Keep-alive ping, 0x01
    Ping,
    /// Level transfer start, 0x02
    LevelInitialize,
    /// Level transfer chunk, 0x03
    LevelDataChunk(LevelDataChunk),
    /// Level transfer end, 0x04
    LevelFinalize(LevelFinalize),
    /// Block change, 0x06
    SetBlock(ServerSetBlock),
    /// Player spawn, 0x07
    Spawn(SpawnPlayer),
    /// Player motion, 0x08
    Move(PositionUpdate),
    /// Player despawn, 0x0c
    Despawn(DespawnPlayer),
    /// Chat message, 0x0d
    Chat(ChatMessage),
    /// Connection drop notice, 0x0e
    Disconnect(Disconnect),
    /// Operator status change, 0x0f
    UserType(UpdateUserType),
}

impl ServerPacket {
    /// The packet's ID byte
    pub fn id(&self) -> u8 {
        match self {
            ServerPacket::Identification(_) => ServerIdentification::ID,
            ServerPacket::Ping => packet::PING.id,
            ServerPacket::LevelInitialize => packet::LEVEL_INITIALIZE.id,
            ServerPacket::LevelDataChunk(_) => LevelDataChunk::ID,
            ServerPacket::LevelFinalize(_) => LevelFinalize::ID,
            ServerPacket::SetBlock(_) => ServerSetBlock::ID,
            ServerPacket::Spawn(_) => SpawnPlayer::ID,
            ServerPacket::Move(_) => PositionUpdate::ID,
            ServerPacket::Despawn(_) => DespawnPlayer::ID,
            ServerPacket::Chat(_) => ChatMessage::ID,
            ServerPacket::Disconnect(_) => Disconnect::ID,
            ServerPacket::UserType(_) => UpdateUserType::ID,
        }
    }

    /// Serialize to wire form: the ID byte followed by the fixed payload
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(64);
        write_unsigned_byte(self.id(), &mut buffer)?;
        match self {
            ServerPacket::Identification(p) => p.write(&mut buffer)?,
            ServerPacket::Ping | ServerPacket::LevelInitialize => {}
            ServerPacket::LevelDataChunk(p) => p.write(&mut buffer)?,
            ServerPacket::LevelFinalize(p) => p.write(&mut buffer)?,
            ServerPacket::SetBlock(p) => p.write(&mut buffer)?,
            ServerPacket::Spawn(p) => p.write(&mut buffer)?,
            ServerPacket::Move(p) => p.write(&mut buffer)?,
            ServerPacket::Despawn(p) => p.write(&mut buffer)?,
            ServerPacket::Chat(p) => p.write(&mut buffer)?,
            ServerPacket::Disconnect(p) => p.write(&mut buffer)?,
            ServerPacket::UserType(p) => p.write(&mut buffer)?,
        }
        Ok(buffer)
    }

    /// Overwrite the carried player ID on variants that have one
    pub fn set_player_id(&mut self, id: i8) {
        match self {
            ServerPacket::Spawn(p) => p.player_id = id,
            ServerPacket::Move(p) => p.player_id = id,
            ServerPacket::Despawn(p) => p.player_id = id,
            ServerPacket::Chat(p) => p.player_id = id,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packets() -> Vec<ServerPacket> {
        vec![
            ServerPacket::Identification(ServerIdentification {
                version: 7,
                name: "Feldspar".to_string(),
                motd: "hello".to_string(),
                user_type: 0x00,
            }),
            ServerPacket::Ping,
            ServerPacket::LevelInitialize,
            ServerPacket::LevelDataChunk(LevelDataChunk {
                length: 3,
                data: vec![1, 2, 3],
                percent: 50,
            }),
            ServerPacket::LevelFinalize(LevelFinalize {
                map_size: Position::new(128.0, 32.0, 128.0),
            }),
            ServerPacket::SetBlock(ServerSetBlock {
                position: Position::new(1.0, 2.0, 3.0),
                block: 0x25,
            }),
            ServerPacket::Spawn(SpawnPlayer {
                player_id: 0,
                name: "alice".to_string(),
                position: Position::new(49.0, 7.0, 49.0),
            }),
            ServerPacket::Move(PositionUpdate {
                player_id: 1,
                position: Position::new(10.0, 20.0, 30.0),
            }),
            ServerPacket::Despawn(DespawnPlayer { player_id: 1 }),
            ServerPacket::Chat(ChatMessage {
                player_id: -1,
                message: "welcome".to_string(),
            }),
            ServerPacket::Disconnect(Disconnect {
                reason: "Banned".to_string(),
            }),
            ServerPacket::UserType(UpdateUserType { mode: 0x64 }),
        ]
    }

    #[test]
    fn test_encoded_size_matches_descriptor() {
        let expected = [
            packet::SERVER_IDENTIFICATION.size(),
            packet::PING.size(),
            packet::LEVEL_INITIALIZE.size(),
            packet::LEVEL_DATA_CHUNK.size(),
            packet::LEVEL_FINALIZE.size(),
            packet::SERVER_SET_BLOCK.size(),
            packet::SPAWN_PLAYER.size(),
            packet::POSITION_UPDATE.size(),
            packet::DESPAWN_PLAYER.size(),
            packet::CHAT_MESSAGE.size(),
            packet::DISCONNECT.size(),
            packet::UPDATE_USER_TYPE.size(),
        ];

        for (packet, payload_size) in sample_packets().iter().zip(expected) {
            let encoded = packet.encode().unwrap();
            assert_eq!(
                encoded.len(),
                payload_size + 1,
                "0x{:02x} framing mismatch",
                packet.id()
            );
            assert_eq!(encoded[0], packet.id());
        }
    }

    #[test]
    fn test_spawn_player_roundtrip() {
        let original = SpawnPlayer {
            player_id: -1,
            name: "alice".to_string(),
            position: Position::with_rotation(49.0, 7.0, 49.0, 0.0, 0.0),
        };

        let mut buffer = Vec::new();
        original.write(&mut buffer).unwrap();

        let mut cursor = std::io::Cursor::new(buffer);
        let decoded = SpawnPlayer::read(&mut cursor).unwrap();

        assert_eq!(decoded.player_id, -1);
        assert_eq!(decoded.name, "alice");
        assert_eq!(decoded.position, original.position);
    }

    #[test]
    fn test_set_player_id_rewrites_relayed_variants() {
        let mut chat = ServerPacket::Chat(ChatMessage {
            player_id: -1,
            message: "hi".to_string(),
        });
        chat.set_player_id(5);
        match chat {
            ServerPacket::Chat(ref p) => assert_eq!(p.player_id, 5),
            _ => unreachable!(),
        }

        // Variants without a player ID are untouched.
        let mut ping = ServerPacket::Ping;
        ping.set_player_id(5);
        assert_eq!(ping.encode().unwrap(), vec![0x01]);
    }

    #[test]
    fn test_level_chunk_padding_on_wire() {
        let chunk = ServerPacket::LevelDataChunk(LevelDataChunk {
            length: 2,
            data: vec![0xAA, 0xBB],
            percent: 0,
        });

        let encoded = chunk.encode().unwrap();
        assert_eq!(encoded.len(), 1028);
        // short length prefix, then data, then nulls to 1024, then percent
        assert_eq!(&encoded[1..3], &[0, 2]);
        assert_eq!(&encoded[3..5], &[0xAA, 0xBB]);
        assert!(encoded[5..1027].iter().all(|&b| b == 0));
        assert_eq!(encoded[1027], 0);
    }
}
