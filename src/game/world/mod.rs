//! World management
//!
//! This module holds the voxel world state and the level streaming
//! helpers that turn it into the gzip-chunked transfer the protocol
//! expects.

pub mod loader;

use crate::error::{Result, ServerError};
use crate::protocol::Position;
use crate::protocol::packets::LevelDataChunk;
use crate::protocol::types::BYTE_ARRAY_LENGTH;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;

/// Block ID for air
pub const BLOCK_AIR: u8 = 0x00;

/// Block ID for grass
pub const BLOCK_GRASS: u8 = 0x02;

/// Block ID for dirt
pub const BLOCK_DIRT: u8 = 0x03;

/// The server's voxel world.
///
/// Blocks live in a linear array indexed `offset_base + x + z*X + y*(X*Z)`.
/// The offset is a property of whatever loaded the level (raw arrays start
/// at 0, header-prefixed formats further in); the world indexes strictly
/// relative to it.
pub struct VoxelWorld {
    /// X dimension in blocks
    width: usize,
    /// Y dimension in blocks
    height: usize,
    /// Z dimension in blocks
    depth: usize,
    /// Linear block storage, `offset_base` bytes of prefix included
    data: Vec<u8>,
    /// Index of block (0, 0, 0) within `data`
    offset_base: usize,
    /// Where new players appear
    spawn: Position,
}

impl VoxelWorld {
    /// Create a world over an existing block array.
    ///
    /// The array must hold at least `offset_base` prefix bytes plus one
    /// byte per block.
    pub fn new(
        dims: (usize, usize, usize),
        data: Vec<u8>,
        offset_base: usize,
        spawn: Position,
    ) -> Result<Self> {
        let (width, height, depth) = dims;
        let volume = width * height * depth;

        if volume == 0 {
            return Err(ServerError::Level("level has zero volume".to_string()));
        }
        if data.len() < offset_base + volume {
            return Err(ServerError::Level(format!(
                "level data is {} bytes, need {} for {}x{}x{}",
                data.len(),
                offset_base + volume,
                width,
                height,
                depth
            )));
        }

        Ok(Self {
            width,
            height,
            depth,
            data,
            offset_base,
            spawn,
        })
    }

    /// Replace the spawn point
    pub fn with_spawn(mut self, spawn: Position) -> Self {
        self.spawn = spawn;
        self
    }

    /// Number of blocks in the world
    pub fn volume(&self) -> usize {
        self.width * self.height * self.depth
    }

    /// World dimensions as a position, for the finalize packet
    pub fn size(&self) -> Position {
        Position::new(self.width as f32, self.height as f32, self.depth as f32)
    }

    /// Where new players appear
    pub fn spawn(&self) -> Position {
        self.spawn
    }

    /// Linear index of a position, if it lands inside the data array.
    fn index(&self, position: &Position) -> Option<usize> {
        let x = position.x.trunc() as i64;
        let y = position.y.trunc() as i64;
        let z = position.z.trunc() as i64;

        let linear = self.offset_base as i64
            + x
            + z * self.width as i64
            + y * (self.width * self.depth) as i64;

        if linear >= 0 && (linear as usize) < self.data.len() {
            Some(linear as usize)
        } else {
            None
        }
    }

    /// Write a block; out-of-range writes are silently discarded.
    pub fn set_block(&mut self, position: &Position, block: u8) -> bool {
        match self.index(position) {
            Some(index) => {
                self.data[index] = block;
                true
            }
            None => false,
        }
    }

    /// Read a block, if the position is in range.
    pub fn get_block(&self, position: &Position) -> Option<u8> {
        self.index(position).map(|index| self.data[index])
    }

    /// Build the uncompressed level transfer payload: the block count as
    /// a big-endian u32 followed by every block.
    pub fn level_payload(&self) -> Vec<u8> {
        let volume = self.volume();
        let blocks = &self.data[self.offset_base..self.offset_base + volume];

        let mut payload = Vec::with_capacity(4 + volume);
        payload.extend_from_slice(&(volume as u32).to_be_bytes());
        payload.extend_from_slice(blocks);
        payload
    }
}

/// Gzip a level payload. CPU-bound; callers run it on the blocking pool.
pub fn compress_level(payload: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload)?;
    Ok(encoder.finish()?)
}

/// Partition compressed level bytes into wire chunks.
///
/// Every chunk covers at most 1024 bytes; `percent` is the share of the
/// stream already sent when the chunk starts.
pub fn level_chunks(compressed: &[u8]) -> Vec<LevelDataChunk> {
    let total = compressed.len();
    compressed
        .chunks(BYTE_ARRAY_LENGTH)
        .enumerate()
        .map(|(i, chunk)| LevelDataChunk {
            length: chunk.len() as i16,
            data: chunk.to_vec(),
            percent: (i * BYTE_ARRAY_LENGTH * 100 / total) as u8,
        })
        .collect()
}
