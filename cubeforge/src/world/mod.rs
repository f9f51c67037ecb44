//! Block world collaborator interface.
//!
//! The renderer never owns block data. It reads chunks through
//! [`BlockWorld`], which the game implements over its own storage.
//! [`ChunkStore`] is a plain hash-map implementation for small worlds
//! and tests.

mod block;
mod chunk;
mod spiral;

use std::collections::HashMap;

pub use block::{BlockKind, Side, BLOCK_TEXTURE_LAYERS};
pub use chunk::{Chunk, ChunkCoord, CHUNK_HEIGHT, CHUNK_SIZE};
pub use spiral::Spiral;

/// Read access to the block world.
pub trait BlockWorld {
    /// Chunk at a chunk coordinate, if it is loaded.
    fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk>;

    fn is_chunk_loaded(&self, coord: ChunkCoord) -> bool {
        self.chunk(coord).is_some()
    }

    /// Block at absolute world coordinates. Unloaded chunks read as air.
    fn block(&self, x: i32, y: i32, z: i32) -> Option<BlockKind> {
        let coord = ChunkCoord::containing(x, z);
        let (ox, oz) = coord.origin();
        self.chunk(coord)
            .and_then(|chunk| chunk.get(x - ox, y, z - oz))
    }
}

/// Chunks held in a map keyed by coordinate.
#[derive(Default)]
pub struct ChunkStore {
    chunks: HashMap<ChunkCoord, Chunk>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chunk: Chunk) -> Option<Chunk> {
        self.chunks.insert(chunk.coord(), chunk)
    }

    pub fn remove(&mut self, coord: ChunkCoord) -> Option<Chunk> {
        self.chunks.remove(&coord)
    }

    pub fn chunk_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coord)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Keep only the chunks whose coordinate satisfies `keep`. Returns how
    /// many were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(ChunkCoord) -> bool) -> usize {
        let before = self.chunks.len();
        self.chunks.retain(|&coord, _| keep(coord));
        before - self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Sets a block at absolute coordinates, creating the owning chunk if
    /// needed. Returns `false` when `y` is outside the column.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: Option<BlockKind>) -> bool {
        let coord = ChunkCoord::containing(x, z);
        let (ox, oz) = coord.origin();
        self.chunks
            .entry(coord)
            .or_insert_with(|| Chunk::new(coord))
            .set(x - ox, y, z - oz, block)
    }
}

impl BlockWorld for ChunkStore {
    fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_lookup_crosses_negative_chunks() {
        let mut world = ChunkStore::new();
        assert!(world.set_block(-1, 10, -17, Some(BlockKind::Sand)));
        assert_eq!(world.block(-1, 10, -17), Some(BlockKind::Sand));
        assert!(world.is_chunk_loaded(ChunkCoord::new(-1, -2)));
        assert_eq!(world.block(-1, 11, -17), None);
        assert_eq!(world.block(100, 10, 100), None);
    }

    #[test]
    fn set_block_rejects_out_of_column_heights() {
        let mut world = ChunkStore::new();
        assert!(!world.set_block(0, CHUNK_HEIGHT, 0, Some(BlockKind::Stone)));
        assert!(!world.set_block(0, -1, 0, Some(BlockKind::Stone)));
    }

    #[test]
    fn retain_drops_rejected_chunks() {
        let mut world = ChunkStore::new();
        for x in -2..=2 {
            world.insert(Chunk::new(ChunkCoord::new(x, 0)));
        }
        let center = ChunkCoord::new(0, 0);
        assert_eq!(world.retain(|coord| coord.chebyshev(center) <= 1), 2);
        assert_eq!(world.len(), 3);
        assert!(!world.is_chunk_loaded(ChunkCoord::new(2, 0)));
    }
}
