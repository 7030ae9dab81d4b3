//! Serverbound packets
//!
//! Packets parsed from clients, plus the two bidirectional packets
//! (position updates and chat messages) that are also relayed back out.

use crate::error::{Result, ServerError};
use crate::protocol::packet::{
    self, ClientboundPacket, Packet, PacketDescriptor, ServerboundPacket,
};
use crate::protocol::types::{
    Position, read_coarse_vector, read_fine_vector, read_signed_byte, read_string,
    read_unsigned_byte, write_coarse_vector, write_fine_vector, write_signed_byte, write_string,
    write_unsigned_byte,
};
use std::io::{Cursor, Read, Write};

/// Player identification packet (serverbound, 0x00)
///
/// The first packet a client sends: protocol version, username, the
/// verification digest from the coordinator service, and the CPE marker
/// byte.
#[derive(Debug, Clone)]
pub struct PlayerIdentification {
    /// Classic protocol version the client speaks
    pub version: u8,
    /// Username of the connecting player
    pub username: String,
    /// 32-character hex digest used for name verification
    pub mp_pass: String,
    /// 0x42 when the client supports CPE
    pub cpe_byte: u8,
}

impl Packet for PlayerIdentification {
    const ID: u8 = 0x00;

    fn descriptor() -> &'static PacketDescriptor {
        &packet::PLAYER_IDENTIFICATION
    }

    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let version = read_unsigned_byte(reader)?;
        let username = read_string(reader)?;
        let mp_pass = read_string(reader)?;
        let cpe_byte = read_unsigned_byte(reader)?;
        Ok(PlayerIdentification {
            version,
            username,
            mp_pass,
            cpe_byte,
        })
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_unsigned_byte(self.version, writer)?;
        write_string(&self.username, writer)?;
        write_string(&self.mp_pass, writer)?;
        write_unsigned_byte(self.cpe_byte, writer)?;
        Ok(())
    }
}

impl ServerboundPacket for PlayerIdentification {}

/// Set block packet (serverbound, 0x05)
///
/// Mode 1 places the held block, mode 0 destroys; the block ID is
/// reported either way.
#[derive(Debug, Clone)]
pub struct ClientSetBlock {
    /// Block position being changed
    pub position: Position,
    /// 1 for place, 0 for destroy
    pub mode: u8,
    /// Block ID held by the player
    pub block: u8,
}

impl Packet for ClientSetBlock {
    const ID: u8 = 0x05;

    fn descriptor() -> &'static PacketDescriptor {
        &packet::CLIENT_SET_BLOCK
    }

    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let position = read_coarse_vector(reader)?;
        let mode = read_unsigned_byte(reader)?;
        let block = read_unsigned_byte(reader)?;
        Ok(ClientSetBlock {
            position,
            mode,
            block,
        })
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_coarse_vector(&self.position, writer)?;
        write_unsigned_byte(self.mode, writer)?;
        write_unsigned_byte(self.block, writer)?;
        Ok(())
    }
}

impl ServerboundPacket for ClientSetBlock {}

/// Position update packet (bidirectional, 0x08)
///
/// Clients report their own motion with `player_id = -1`; the server
/// relays it with the sender's assigned ID.
#[derive(Debug, Clone)]
pub struct PositionUpdate {
    /// Moving player's ID
    pub player_id: i8,
    /// New position including view direction
    pub position: Position,
}

impl Packet for PositionUpdate {
    const ID: u8 = 0x08;

    fn descriptor() -> &'static PacketDescriptor {
        &packet::POSITION_UPDATE
    }

    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let player_id = read_signed_byte(reader)?;
        let position = read_fine_vector(reader)?;
        Ok(PositionUpdate {
            player_id,
            position,
        })
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_signed_byte(self.player_id, writer)?;
        write_fine_vector(&self.position, writer)?;
        Ok(())
    }
}

impl ServerboundPacket for PositionUpdate {}
impl ClientboundPacket for PositionUpdate {}

/// Chat message packet (bidirectional, 0x0d)
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Sending player's ID; -1 for server announcements
    pub player_id: i8,
    /// Message text
    pub message: String,
}

impl Packet for ChatMessage {
    const ID: u8 = 0x0d;

    fn descriptor() -> &'static PacketDescriptor {
        &packet::CHAT_MESSAGE
    }

    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let player_id = read_signed_byte(reader)?;
        let message = read_string(reader)?;
        Ok(ChatMessage { player_id, message })
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_signed_byte(self.player_id, writer)?;
        write_string(&self.message, writer)?;
        Ok(())
    }
}

impl ServerboundPacket for ChatMessage {}
impl ClientboundPacket for ChatMessage {}

/// A parsed client-to-server packet
#[derive(Debug, Clone)]
pub enum ClientPacket {
    /// Player identification, 0x00
    Identify(PlayerIdentification),
    /// Block place or destroy, 0x05
    SetBlock(ClientSetBlock),
    /// Player motion, 0x08
    Move(PositionUpdate),
    /// Chat message, 0x0d
    Chat(ChatMessage),
}

impl ClientPacket {
    /// Decode a packet payload by its ID byte.
    ///
    /// The payload must be exactly the descriptor's size; IDs outside the
    /// parseable set are a framing error.
    pub fn decode(id: u8, payload: &[u8]) -> Result<Self> {
        let descriptor = packet::parseable(id)
            .ok_or_else(|| ServerError::Protocol(format!("unparseable packet ID 0x{id:02x}")))?;

        if payload.len() != descriptor.size() {
            return Err(ServerError::Protocol(format!(
                "{} payload is {} bytes, expected {}",
                descriptor.name,
                payload.len(),
                descriptor.size()
            )));
        }

        let mut cursor = Cursor::new(payload);
        match id {
            PlayerIdentification::ID => {
                Ok(ClientPacket::Identify(PlayerIdentification::read(&mut cursor)?))
            }
            ClientSetBlock::ID => Ok(ClientPacket::SetBlock(ClientSetBlock::read(&mut cursor)?)),
            PositionUpdate::ID => Ok(ClientPacket::Move(PositionUpdate::read(&mut cursor)?)),
            ChatMessage::ID => Ok(ClientPacket::Chat(ChatMessage::read(&mut cursor)?)),
            _ => unreachable!("parseable() returned a descriptor for 0x{id:02x}"),
        }
    }
}
