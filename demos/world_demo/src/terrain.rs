use cubeforge::world::{BlockKind, BlockWorld, Chunk, ChunkCoord, ChunkStore, CHUNK_HEIGHT, CHUNK_SIZE};

const SEA_LEVEL: i32 = 30;
const TREE_HEIGHT: i32 = 4;

/// Rolling sine-wave hills with the occasional tree.
#[derive(Default)]
pub struct TerrainWorld {
    store: ChunkStore,
}

impl TerrainWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface height of column `(x, z)`.
    pub fn height(x: i32, z: i32) -> i32 {
        let (fx, fz) = (x as f32, z as f32);
        let hills = (fx * 0.08).sin() * 6.0 + (fz * 0.11).cos() * 4.0 + ((fx + fz) * 0.03).sin() * 3.0;
        (32.0 + hills).round().clamp(1.0, (CHUNK_HEIGHT - TREE_HEIGHT - 3) as f32) as i32
    }

    pub fn is_generated(&self, coord: ChunkCoord) -> bool {
        self.store.is_chunk_loaded(coord)
    }

    pub fn chunk_count(&self) -> usize {
        self.store.len()
    }

    /// Fill `coord` with terrain unless it already exists.
    pub fn generate_chunk(&mut self, coord: ChunkCoord) {
        if self.is_generated(coord) {
            return;
        }

        let mut chunk = Chunk::new(coord);
        let (ox, oz) = coord.origin();
        for lz in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                let (x, z) = (ox + lx, oz + lz);
                let height = Self::height(x, z);
                for y in 0..=height {
                    let block = if y < height - 3 {
                        BlockKind::Stone
                    } else if height <= SEA_LEVEL {
                        BlockKind::Sand
                    } else if y == height {
                        BlockKind::Grass
                    } else {
                        BlockKind::Dirt
                    };
                    chunk.set(lx, y, lz, Some(block));
                }

                // The canopy must stay inside the chunk.
                let inner = (2..CHUNK_SIZE - 2).contains(&lx) && (2..CHUNK_SIZE - 2).contains(&lz);
                if inner && height > SEA_LEVEL && column_hash(x, z) % 97 == 0 {
                    plant_tree(&mut chunk, lx, height + 1, lz);
                }
            }
        }
        self.store.insert(chunk);
    }

    /// Drop generated chunks farther than `radius` from `center`.
    pub fn unload_beyond(&mut self, center: ChunkCoord, radius: u32) -> usize {
        self.store.retain(|coord| coord.chebyshev(center) <= radius)
    }

    /// Highest solid block in column `(x, z)`.
    pub fn top_block(&self, x: i32, z: i32) -> Option<i32> {
        let coord = ChunkCoord::containing(x, z);
        let (ox, oz) = coord.origin();
        self.store.chunk(coord)?.top_block(x - ox, z - oz)
    }

    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: Option<BlockKind>) -> bool {
        self.store.set_block(x, y, z, block)
    }
}

impl BlockWorld for TerrainWorld {
    fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.store.chunk(coord)
    }
}

fn plant_tree(chunk: &mut Chunk, x: i32, base: i32, z: i32) {
    for y in base..base + TREE_HEIGHT {
        chunk.set(x, y, z, Some(BlockKind::Log));
    }
    let crown = base + TREE_HEIGHT - 1;
    for dy in 0..=2 {
        let reach = if dy == 2 { 1 } else { 2 };
        for dz in -reach..=reach {
            for dx in -reach..=reach {
                if chunk.get(x + dx, crown + dy, z + dz).is_none() {
                    chunk.set(x + dx, crown + dy, z + dz, Some(BlockKind::Leaves));
                }
            }
        }
    }
}

fn column_hash(x: i32, z: i32) -> u32 {
    let mut h = (x as u32).wrapping_mul(0x9E37_79B1) ^ (z as u32).wrapping_mul(0x85EB_CA77);
    h ^= h >> 15;
    h = h.wrapping_mul(0x2C1B_3C6D);
    h ^ (h >> 12)
}
