//! Classic protocol data types
//!
//! This module implements the wire-level data types used by the Classic
//! protocol: bytes, big-endian shorts, space-padded strings, fixed-size
//! byte arrays, and the two position encodings (coarse and fine vectors).

use crate::error::{Result, ServerError};
use std::io::{Read, Write};
use std::ops::{Add, Mul, Sub};

/// Wire length of a protocol string in bytes
pub const STRING_LENGTH: usize = 64;

/// Wire length of a level data chunk payload in bytes
pub const BYTE_ARRAY_LENGTH: usize = 1024;

/// A point in 3D space with a view direction.
///
/// Coordinates are in blocks, yaw and pitch in degrees. On the wire a
/// position is encoded either as a coarse vector (whole blocks, no
/// rotation) or a fine vector (1/32 block steps plus yaw and pitch
/// remapped to a byte).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    /// X coordinate in blocks
    pub x: f32,
    /// Y coordinate in blocks
    pub y: f32,
    /// Z coordinate in blocks
    pub z: f32,
    /// Heading in degrees
    pub yaw: f32,
    /// Pitch in degrees
    pub pitch: f32,
}

impl Position {
    /// Create a position with no rotation
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// Create a position with a view direction
    pub fn with_rotation(x: f32, y: f32, z: f32, yaw: f32, pitch: f32) -> Self {
        Self {
            x,
            y,
            z,
            yaw,
            pitch,
        }
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
            yaw: self.yaw + rhs.yaw,
            pitch: self.pitch + rhs.pitch,
        }
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
            yaw: self.yaw - rhs.yaw,
            pitch: self.pitch - rhs.pitch,
        }
    }
}

impl Mul<f32> for Position {
    type Output = Position;

    /// Scale the coordinates; rotations are left untouched
    fn mul(self, rhs: f32) -> Position {
        Position {
            x: self.x * rhs,
            y: self.y * rhs,
            z: self.z * rhs,
            yaw: self.yaw,
            pitch: self.pitch,
        }
    }
}

/// Remap degrees onto the protocol's 0..255 rotation scale
fn rotation_to_byte(degrees: f32) -> u8 {
    (degrees.rem_euclid(360.0) * 255.0 / 360.0) as u8
}

/// Map a wire rotation byte back to degrees
fn byte_to_rotation(byte: u8) -> f32 {
    f32::from(byte) * 360.0 / 255.0
}

/// Read an unsigned byte (u8) from a reader
pub fn read_unsigned_byte<R: Read>(reader: &mut R) -> Result<u8> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte)?;
    Ok(byte[0])
}

/// Write an unsigned byte (u8) to a writer
pub fn write_unsigned_byte<W: Write>(value: u8, writer: &mut W) -> Result<()> {
    writer.write_all(&[value])?;
    Ok(())
}

/// Read a signed byte (i8) from a reader
pub fn read_signed_byte<R: Read>(reader: &mut R) -> Result<i8> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte)?;
    Ok(byte[0] as i8)
}

/// Write a signed byte (i8) to a writer
pub fn write_signed_byte<W: Write>(value: i8, writer: &mut W) -> Result<()> {
    writer.write_all(&[value as u8])?;
    Ok(())
}

/// Read a big-endian signed short (i16) from a reader
pub fn read_short<R: Read>(reader: &mut R) -> Result<i16> {
    let mut bytes = [0u8; 2];
    reader.read_exact(&mut bytes)?;
    Ok(i16::from_be_bytes(bytes))
}

/// Write a big-endian signed short (i16) to a writer
pub fn write_short<W: Write>(value: i16, writer: &mut W) -> Result<()> {
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

/// Read a 64-byte protocol string from a reader.
///
/// Trailing space padding (0x20) is stripped; embedded spaces are kept.
pub fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let mut bytes = [0u8; STRING_LENGTH];
    reader.read_exact(&mut bytes)?;

    let mut end = bytes.len();
    while end > 0 && bytes[end - 1] == b' ' {
        end -= 1;
    }

    Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
}

/// Write a string as 64 bytes, right-padded with spaces.
///
/// Input longer than 64 bytes is truncated; non-ASCII bytes are replaced
/// with `?` since the protocol only carries US-ASCII.
pub fn write_string<W: Write>(value: &str, writer: &mut W) -> Result<()> {
    let mut bytes = [b' '; STRING_LENGTH];
    for (slot, byte) in bytes.iter_mut().zip(value.bytes()) {
        *slot = if byte.is_ascii() { byte } else { b'?' };
    }
    writer.write_all(&bytes)?;
    Ok(())
}

/// Read a 1024-byte array from a reader, padding included
pub fn read_byte_array<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; BYTE_ARRAY_LENGTH];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}

/// Write a byte array as 1024 bytes, null-padded at the end
pub fn write_byte_array<W: Write>(value: &[u8], writer: &mut W) -> Result<()> {
    if value.len() > BYTE_ARRAY_LENGTH {
        return Err(ServerError::Protocol(format!(
            "Byte array too long: {} > {}",
            value.len(),
            BYTE_ARRAY_LENGTH
        )));
    }

    writer.write_all(value)?;
    let padding = [0u8; BYTE_ARRAY_LENGTH];
    writer.write_all(&padding[value.len()..])?;
    Ok(())
}

/// Read a coarse vector (three big-endian shorts, whole blocks)
pub fn read_coarse_vector<R: Read>(reader: &mut R) -> Result<Position> {
    let x = read_short(reader)?;
    let y = read_short(reader)?;
    let z = read_short(reader)?;
    Ok(Position::new(f32::from(x), f32::from(y), f32::from(z)))
}

/// Write a position as a coarse vector, truncating to whole blocks
pub fn write_coarse_vector<W: Write>(position: &Position, writer: &mut W) -> Result<()> {
    write_short(position.x.trunc() as i16, writer)?;
    write_short(position.y.trunc() as i16, writer)?;
    write_short(position.z.trunc() as i16, writer)?;
    Ok(())
}

/// Read a fine vector (1/32 block coordinates plus yaw and pitch)
pub fn read_fine_vector<R: Read>(reader: &mut R) -> Result<Position> {
    let x = read_short(reader)?;
    let y = read_short(reader)?;
    let z = read_short(reader)?;
    let yaw = read_unsigned_byte(reader)?;
    let pitch = read_unsigned_byte(reader)?;
    Ok(Position::with_rotation(
        f32::from(x) / 32.0,
        f32::from(y) / 32.0,
        f32::from(z) / 32.0,
        byte_to_rotation(yaw),
        byte_to_rotation(pitch),
    ))
}

/// Write a position as a fine vector in 1/32 block steps
pub fn write_fine_vector<W: Write>(position: &Position, writer: &mut W) -> Result<()> {
    let scaled = *position * 32.0;
    write_short(scaled.x.trunc() as i16, writer)?;
    write_short(scaled.y.trunc() as i16, writer)?;
    write_short(scaled.z.trunc() as i16, writer)?;
    write_unsigned_byte(rotation_to_byte(position.yaw), writer)?;
    write_unsigned_byte(rotation_to_byte(position.pitch), writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_short_roundtrip() {
        let values = [0i16, 1, -1, 127, 128, 255, 256, i16::MIN, i16::MAX];

        for &value in &values {
            let mut buffer = Vec::new();
            write_short(value, &mut buffer).unwrap();
            assert_eq!(buffer.len(), 2);

            let mut cursor = Cursor::new(buffer);
            let decoded = read_short(&mut cursor).unwrap();
            assert_eq!(value, decoded);
        }
    }

    #[test]
    fn test_string_pads_to_64_bytes() {
        let mut buffer = Vec::new();
        write_string("alice", &mut buffer).unwrap();

        assert_eq!(buffer.len(), STRING_LENGTH);
        assert_eq!(&buffer[..5], b"alice");
        assert!(buffer[5..].iter().all(|&b| b == b' '));
    }

    #[test]
    fn test_string_keeps_embedded_spaces() {
        let mut buffer = Vec::new();
        write_string("a b  c", &mut buffer).unwrap();

        let mut cursor = Cursor::new(buffer);
        let decoded = read_string(&mut cursor).unwrap();
        assert_eq!(decoded, "a b  c");
    }

    #[test]
    fn test_string_truncates_long_input() {
        let long = "x".repeat(80);
        let mut buffer = Vec::new();
        write_string(&long, &mut buffer).unwrap();

        assert_eq!(buffer.len(), STRING_LENGTH);

        let mut cursor = Cursor::new(buffer);
        let decoded = read_string(&mut cursor).unwrap();
        assert_eq!(decoded, "x".repeat(64));
    }

    #[test]
    fn test_string_replaces_non_ascii() {
        let mut buffer = Vec::new();
        write_string("héllo", &mut buffer).unwrap();
        assert!(buffer.iter().all(u8::is_ascii));
    }

    #[test]
    fn test_byte_array_null_padding() {
        let data = vec![1u8, 2, 3];
        let mut buffer = Vec::new();
        write_byte_array(&data, &mut buffer).unwrap();

        assert_eq!(buffer.len(), BYTE_ARRAY_LENGTH);
        assert_eq!(&buffer[..3], &[1, 2, 3]);
        assert!(buffer[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_byte_array_rejects_oversize() {
        let data = vec![0u8; BYTE_ARRAY_LENGTH + 1];
        let mut buffer = Vec::new();
        assert!(write_byte_array(&data, &mut buffer).is_err());
    }

    #[test]
    fn test_coarse_vector_truncates() {
        let position = Position::new(1.9, -2.7, 3.2);
        let mut buffer = Vec::new();
        write_coarse_vector(&position, &mut buffer).unwrap();

        let mut cursor = Cursor::new(buffer);
        let decoded = read_coarse_vector(&mut cursor).unwrap();

        assert_eq!(decoded, Position::new(1.0, -2.0, 3.0));
    }

    #[test]
    fn test_fine_vector_coordinate_scaling() {
        let position = Position::with_rotation(49.5, 7.03125, 49.0, 90.0, 45.0);
        let mut buffer = Vec::new();
        write_fine_vector(&position, &mut buffer).unwrap();
        assert_eq!(buffer.len(), 8);

        let mut cursor = Cursor::new(buffer);
        let decoded = read_fine_vector(&mut cursor).unwrap();

        // Coordinates round-trip to the nearest 1/32 block.
        assert_eq!(decoded.x, (position.x * 32.0).trunc() / 32.0);
        assert_eq!(decoded.y, (position.y * 32.0).trunc() / 32.0);
        assert_eq!(decoded.z, (position.z * 32.0).trunc() / 32.0);

        // Rotations round-trip within one wire step.
        assert!((decoded.yaw - position.yaw).abs() <= 360.0 / 255.0);
        assert!((decoded.pitch - position.pitch).abs() <= 360.0 / 255.0);
    }

    #[test]
    fn test_position_arithmetic() {
        let a = Position::with_rotation(1.0, 2.0, 3.0, 10.0, 20.0);
        let b = Position::with_rotation(0.5, 0.5, 0.5, 5.0, 5.0);

        let sum = a + b;
        assert_eq!(sum, Position::with_rotation(1.5, 2.5, 3.5, 15.0, 25.0));

        let diff = a - b;
        assert_eq!(diff, Position::with_rotation(0.5, 1.5, 2.5, 5.0, 15.0));

        let scaled = a * 2.0;
        assert_eq!(scaled, Position::with_rotation(2.0, 4.0, 6.0, 10.0, 20.0));
    }
}
