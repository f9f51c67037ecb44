use super::block::BlockKind;

/// Horizontal edge length of a chunk, in blocks.
pub const CHUNK_SIZE: i32 = 16;
/// Vertical extent of a chunk column, in blocks.
pub const CHUNK_HEIGHT: i32 = 64;

const CHUNK_VOLUME: usize = (CHUNK_SIZE * CHUNK_SIZE * CHUNK_HEIGHT) as usize;

/// Column coordinate of a chunk on the horizontal grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk that contains the absolute block column `(bx, bz)`.
    pub fn containing(bx: i32, bz: i32) -> Self {
        Self {
            x: bx.div_euclid(CHUNK_SIZE),
            z: bz.div_euclid(CHUNK_SIZE),
        }
    }

    /// Packs both signed components into one 64-bit map key.
    pub fn key(self) -> u64 {
        ((self.x as u32 as u64) << 32) | (self.z as u32 as u64)
    }

    pub fn from_key(key: u64) -> Self {
        Self {
            x: (key >> 32) as u32 as i32,
            z: key as u32 as i32,
        }
    }

    /// Chessboard distance in chunks.
    pub fn chebyshev(self, other: ChunkCoord) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dz = (self.z - other.z).unsigned_abs();
        dx.max(dz)
    }

    /// World-space block position of the chunk's minimum corner.
    pub fn origin(self) -> (i32, i32) {
        (self.x * CHUNK_SIZE, self.z * CHUNK_SIZE)
    }

    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.z + dz)
    }
}

/// A `CHUNK_SIZE x CHUNK_HEIGHT x CHUNK_SIZE` column of blocks.
#[derive(Clone)]
pub struct Chunk {
    coord: ChunkCoord,
    blocks: Vec<Option<BlockKind>>,
}

impl Chunk {
    /// An all-air chunk.
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            blocks: vec![None; CHUNK_VOLUME],
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Block at chunk-local coordinates. Out-of-range positions read as air.
    pub fn get(&self, x: i32, y: i32, z: i32) -> Option<BlockKind> {
        Self::index(x, y, z).and_then(|i| self.blocks[i])
    }

    /// Sets a block at chunk-local coordinates. Returns `false` if the
    /// position lies outside the chunk.
    pub fn set(&mut self, x: i32, y: i32, z: i32, block: Option<BlockKind>) -> bool {
        match Self::index(x, y, z) {
            Some(i) => {
                self.blocks[i] = block;
                true
            }
            None => false,
        }
    }

    /// Number of non-air blocks.
    pub fn solid_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_some()).count()
    }

    /// Highest non-air block in a local column.
    pub fn top_block(&self, x: i32, z: i32) -> Option<i32> {
        (0..CHUNK_HEIGHT).rev().find(|&y| self.get(x, y, z).is_some())
    }

    fn index(x: i32, y: i32, z: i32) -> Option<usize> {
        let inside = (0..CHUNK_SIZE).contains(&x)
            && (0..CHUNK_HEIGHT).contains(&y)
            && (0..CHUNK_SIZE).contains(&z);
        inside.then(|| ((y * CHUNK_SIZE + z) * CHUNK_SIZE + x) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trips_negative_coordinates() {
        for coord in [
            ChunkCoord::new(0, 0),
            ChunkCoord::new(-1, 3),
            ChunkCoord::new(i32::MIN, i32::MAX),
        ] {
            assert_eq!(ChunkCoord::from_key(coord.key()), coord);
        }
        assert_ne!(ChunkCoord::new(1, 0).key(), ChunkCoord::new(0, 1).key());
    }

    #[test]
    fn containing_floors_negative_blocks() {
        assert_eq!(ChunkCoord::containing(0, 15), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::containing(-1, 16), ChunkCoord::new(-1, 1));
        assert_eq!(ChunkCoord::containing(-16, -17), ChunkCoord::new(-1, -2));
    }

    #[test]
    fn out_of_range_reads_are_air() {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        assert!(chunk.set(0, 0, 0, Some(BlockKind::Stone)));
        assert!(!chunk.set(16, 0, 0, Some(BlockKind::Stone)));
        assert_eq!(chunk.get(0, 0, 0), Some(BlockKind::Stone));
        assert_eq!(chunk.get(0, -1, 0), None);
        assert_eq!(chunk.get(0, CHUNK_HEIGHT, 0), None);
        assert_eq!(chunk.solid_count(), 1);
        assert_eq!(chunk.top_block(0, 0), Some(0));
        assert_eq!(chunk.top_block(1, 0), None);
    }
}
