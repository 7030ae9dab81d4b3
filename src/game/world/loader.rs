//! Level loading
//!
//! The server treats level files as opaque block arrays: a loader turns a
//! filesystem path into dimensions, block data, and a spawn point. Raw and
//! gzipped arrays are supported, with or without a leading big-endian
//! volume header; everything else about the format lives here, not in the
//! core.

use crate::error::{Result, ServerError};
use crate::game::world::{BLOCK_AIR, BLOCK_DIRT, BLOCK_GRASS, VoxelWorld};
use crate::protocol::Position;
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::Path;

/// Gzip magic bytes
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Load a level from a block array file.
///
/// Dimensions come from configuration; the file holds one byte per block
/// (optionally gzipped), with an optional 4-byte big-endian volume header
/// that becomes the world's index offset.
pub fn load_level(path: &Path, dims: (usize, usize, usize)) -> Result<VoxelWorld> {
    let raw = std::fs::read(path)?;

    let data = if raw.starts_with(&GZIP_MAGIC) {
        let mut decoder = GzDecoder::new(&raw[..]);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        decompressed
    } else {
        raw
    };

    let volume = dims.0 * dims.1 * dims.2;
    let offset_base = if data.len() >= 4
        && u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize == volume
    {
        4
    } else {
        0
    };

    if data.len() < offset_base + volume {
        return Err(ServerError::Level(format!(
            "{} holds {} blocks, level dimensions need {}",
            path.display(),
            data.len() - offset_base,
            volume
        )));
    }

    let world = VoxelWorld::new(dims, data, offset_base, Position::default())?;
    let spawn = surface_spawn(&world);
    Ok(world.with_spawn(spawn))
}

/// Generate the built-in flat level: dirt up to the surface, a grass
/// layer, then air.
pub fn flat_level(dims: (usize, usize, usize)) -> Result<VoxelWorld> {
    let (width, height, depth) = dims;
    let surface = height / 2;

    let mut data = vec![BLOCK_AIR; width * height * depth];
    for y in 0..height {
        let block = match y {
            y if y < surface => BLOCK_DIRT,
            y if y == surface => BLOCK_GRASS,
            _ => BLOCK_AIR,
        };
        if block != BLOCK_AIR {
            let layer = y * width * depth;
            data[layer..layer + width * depth].fill(block);
        }
    }

    let world = VoxelWorld::new(dims, data, 0, Position::default())?;
    let spawn = surface_spawn(&world);
    Ok(world.with_spawn(spawn))
}

/// Pick a spawn above the highest solid block in the level's center
/// column.
fn surface_spawn(world: &VoxelWorld) -> Position {
    let size = world.size();
    let (center_x, center_z) = (size.x / 2.0, size.z / 2.0);

    let mut y = size.y - 1.0;
    while y > 0.0 {
        let probe = Position::new(center_x, y, center_z);
        if world.get_block(&probe).is_some_and(|block| block != BLOCK_AIR) {
            break;
        }
        y -= 1.0;
    }

    Position::new(center_x, (y + 2.0).min(size.y - 1.0), center_z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::compress_level;

    #[test]
    fn test_flat_level_layers() {
        let world = flat_level((16, 8, 16)).unwrap();
        let surface = 4.0;

        assert_eq!(
            world.get_block(&Position::new(3.0, surface - 1.0, 3.0)),
            Some(BLOCK_DIRT)
        );
        assert_eq!(
            world.get_block(&Position::new(3.0, surface, 3.0)),
            Some(BLOCK_GRASS)
        );
        assert_eq!(
            world.get_block(&Position::new(3.0, surface + 1.0, 3.0)),
            Some(BLOCK_AIR)
        );

        let spawn = world.spawn();
        assert_eq!(spawn.x, 8.0);
        assert_eq!(spawn.y, surface + 2.0);
        assert_eq!(spawn.z, 8.0);
    }

    #[test]
    fn test_load_raw_level() {
        let dir = std::env::temp_dir().join("feldspar-loader-raw");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("level.bin");
        std::fs::write(&path, vec![BLOCK_DIRT; 4 * 4 * 4]).unwrap();

        let world = load_level(&path, (4, 4, 4)).unwrap();
        assert_eq!(world.volume(), 64);
        assert_eq!(world.get_block(&Position::new(0.0, 0.0, 0.0)), Some(BLOCK_DIRT));
    }

    #[test]
    fn test_load_gzipped_level_with_header() {
        let dir = std::env::temp_dir().join("feldspar-loader-gz");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("level.bin.gz");

        let mut payload = 64u32.to_be_bytes().to_vec();
        payload.extend(vec![BLOCK_GRASS; 64]);
        std::fs::write(&path, compress_level(&payload).unwrap()).unwrap();

        let world = load_level(&path, (4, 4, 4)).unwrap();
        assert_eq!(world.volume(), 64);
        // header detected: block (0,0,0) sits after the volume prefix
        assert_eq!(world.get_block(&Position::new(0.0, 0.0, 0.0)), Some(BLOCK_GRASS));
    }

    #[test]
    fn test_load_rejects_wrong_size() {
        let dir = std::env::temp_dir().join("feldspar-loader-short");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("level.bin");
        std::fs::write(&path, vec![0u8; 10]).unwrap();

        assert!(load_level(&path, (4, 4, 4)).is_err());
    }
}
