use bytemuck::{Pod, Zeroable};

use super::buffer::{BufferUsageHint, GpuBuffer, VertexLayout};
use crate::world::{BlockKind, BlockWorld, Chunk, Side, CHUNK_HEIGHT, CHUNK_SIZE};

/// One visible block face, drawn as an instanced quad.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FaceRecord {
    /// Chunk-local block position.
    pub offset: [f32; 3],
    pub side: u16,
    pub texture: u16,
}

const _: () = assert!(std::mem::size_of::<FaceRecord>() == 16);

impl FaceRecord {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Uint16x2];

    pub const LAYOUT: VertexLayout = VertexLayout {
        stride: std::mem::size_of::<FaceRecord>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &Self::ATTRIBUTES,
    };
}

/// Append a record for every visible face of `chunk` to `out`.
///
/// A face is visible when the block it looks at is air, lies outside the
/// column, or is a transparent block of a different kind. Neighbors across
/// the chunk border are read through `world`; unloaded chunks count as air.
pub fn mesh_chunk<W: BlockWorld + ?Sized>(chunk: &Chunk, world: &W, out: &mut Vec<FaceRecord>) {
    let (ox, oz) = chunk.coord().origin();

    for y in 0..CHUNK_HEIGHT {
        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let Some(block) = chunk.get(x, y, z) else {
                    continue;
                };
                for side in Side::ALL {
                    let (dx, dy, dz) = side.normal();
                    let (nx, ny, nz) = (x + dx, y + dy, z + dz);
                    let neighbor = if !(0..CHUNK_HEIGHT).contains(&ny) {
                        None
                    } else if (0..CHUNK_SIZE).contains(&nx) && (0..CHUNK_SIZE).contains(&nz) {
                        chunk.get(nx, ny, nz)
                    } else {
                        world.block(ox + nx, ny, oz + nz)
                    };
                    if face_visible(block, neighbor) {
                        out.push(FaceRecord {
                            offset: [x as f32, y as f32, z as f32],
                            side: side as u16,
                            texture: block.texture(side),
                        });
                    }
                }
            }
        }
    }
}

fn face_visible(block: BlockKind, neighbor: Option<BlockKind>) -> bool {
    match neighbor {
        None => true,
        Some(other) => other.is_transparent() && other != block,
    }
}

/// Cached face geometry of one chunk.
///
/// Starts uninitialized; [`ChunkMesh::load`] moves it to the loaded state
/// in one step, so the face count always equals the uploaded record count.
pub struct ChunkMesh {
    buffer: Option<GpuBuffer<FaceRecord>>,
    loaded: bool,
}

impl Default for ChunkMesh {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkMesh {
    pub fn new() -> Self {
        Self {
            buffer: None,
            loaded: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn face_count(&self) -> u32 {
        self.buffer.as_ref().map_or(0, |b| b.len() as u32)
    }

    /// Allocate GPU storage.
    pub fn init(&mut self) {
        if self.buffer.is_none() {
            self.buffer = Some(GpuBuffer::new("chunk-faces", FaceRecord::LAYOUT));
        }
    }

    /// Replace the mesh with `faces`.
    pub fn load(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, faces: &[FaceRecord]) {
        self.init();
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.load_data(device, queue, faces, BufferUsageHint::Static);
            self.loaded = true;
        }
    }

    /// Draw every face as one instanced call. Returns the instance count,
    /// zero when the mesh is not loaded.
    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>) -> u32 {
        if !self.loaded {
            return 0;
        }
        let Some(buffer) = &self.buffer else {
            return 0;
        };
        if !buffer.bind(pass, 0) {
            return 0;
        }
        let faces = buffer.len() as u32;
        pass.draw(0..6, 0..faces);
        faces
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{ChunkCoord, ChunkStore};

    fn mesh(world: &ChunkStore, coord: ChunkCoord) -> Vec<FaceRecord> {
        let mut out = Vec::new();
        mesh_chunk(world.chunk(coord).unwrap(), world, &mut out);
        out
    }

    #[test]
    fn lone_block_shows_six_faces() {
        let mut world = ChunkStore::new();
        world.set_block(3, 10, 4, Some(BlockKind::Stone));
        let faces = mesh(&world, ChunkCoord::new(0, 0));
        assert_eq!(faces.len(), 6);
        assert!(faces.iter().all(|f| f.offset == [3.0, 10.0, 4.0]));
        let mut sides: Vec<_> = faces.iter().map(|f| f.side).collect();
        sides.sort();
        assert_eq!(sides, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn touching_blocks_hide_shared_faces() {
        let mut world = ChunkStore::new();
        world.set_block(3, 10, 4, Some(BlockKind::Stone));
        world.set_block(4, 10, 4, Some(BlockKind::Dirt));
        assert_eq!(mesh(&world, ChunkCoord::new(0, 0)).len(), 10);
    }

    #[test]
    fn transparent_neighbors_expose_faces() {
        let mut world = ChunkStore::new();
        world.set_block(3, 10, 4, Some(BlockKind::Stone));
        world.set_block(4, 10, 4, Some(BlockKind::Glass));
        // Stone keeps all 6 faces, glass hides the face shared with stone.
        assert_eq!(mesh(&world, ChunkCoord::new(0, 0)).len(), 11);

        world.set_block(5, 10, 4, Some(BlockKind::Glass));
        // Glass against glass culls both shared faces.
        assert_eq!(mesh(&world, ChunkCoord::new(0, 0)).len(), 6 + 5 + 4);
    }

    #[test]
    fn column_top_and_bottom_are_visible() {
        let mut world = ChunkStore::new();
        world.set_block(0, 0, 0, Some(BlockKind::Stone));
        world.set_block(1, CHUNK_HEIGHT - 1, 0, Some(BlockKind::Stone));
        assert_eq!(mesh(&world, ChunkCoord::new(0, 0)).len(), 12);
    }

    #[test]
    fn chunk_border_reads_neighbor_chunk() {
        let mut world = ChunkStore::new();
        world.set_block(CHUNK_SIZE - 1, 5, 0, Some(BlockKind::Stone));
        assert_eq!(mesh(&world, ChunkCoord::new(0, 0)).len(), 6);

        world.set_block(CHUNK_SIZE, 5, 0, Some(BlockKind::Stone));
        let here = mesh(&world, ChunkCoord::new(0, 0));
        let there = mesh(&world, ChunkCoord::new(1, 0));
        assert_eq!(here.len(), 5);
        assert_eq!(there.len(), 5);
        assert!(!here.iter().any(|f| f.side == Side::PosX as u16));
        assert!(!there.iter().any(|f| f.side == Side::NegX as u16));
    }

    #[test]
    fn remeshing_after_unrelated_load_is_identical() {
        let mut world = ChunkStore::new();
        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                world.set_block(x, 0, z, Some(BlockKind::Grass));
            }
        }
        let first = mesh(&world, ChunkCoord::new(0, 0));
        world.set_block(CHUNK_SIZE * 3, 2, 0, Some(BlockKind::Sand));
        let second = mesh(&world, ChunkCoord::new(0, 0));
        assert_eq!(first, second);
        // Flat slab: full top and bottom plus the perimeter walls.
        assert_eq!(first.len() as i32, 2 * CHUNK_SIZE * CHUNK_SIZE + 4 * CHUNK_SIZE);
    }

    #[test]
    fn textures_follow_block_sides() {
        let mut world = ChunkStore::new();
        world.set_block(0, 1, 0, Some(BlockKind::Grass));
        let faces = mesh(&world, ChunkCoord::new(0, 0));
        let top = faces.iter().find(|f| f.side == Side::PosY as u16).unwrap();
        assert_eq!(top.texture, BlockKind::Grass.texture(Side::PosY));
    }

    #[test]
    fn new_mesh_is_uninitialized() {
        let mut mesh = ChunkMesh::new();
        assert!(!mesh.is_initialized());
        assert!(!mesh.is_loaded());
        mesh.init();
        assert!(mesh.is_initialized());
        assert!(!mesh.is_loaded());
        assert_eq!(mesh.face_count(), 0);
    }
}
