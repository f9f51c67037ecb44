//! GPU side of the client: chunk meshes, particles and outlined text.
//!
//! [`Renderer`] owns the wgpu context and the three pipelines. Everything
//! that can be tested without a device (meshing, atlas packing, the
//! particle queue, text layout) lives in plain types next to the GPU
//! wrappers that consume it.

mod atlas;
mod block_textures;
mod buffer;
mod chunk_mesh;
mod frustum;
mod globals;
mod glyph;
mod gpu;
mod particles;
mod renderer;
mod shaders;
mod text;
mod world_renderer;

pub use atlas::{AtlasId, CpuAtlas, GlyphAtlas, PackedRect, ShelfPacker, TextureAtlas, UvRect};
pub use block_textures::{BlockTextureLayers, BlockTextures};
pub use buffer::{BufferUsageHint, GpuBuffer, VertexLayout};
pub use chunk_mesh::{mesh_chunk, ChunkMesh, FaceRecord};
pub use frustum::Frustum;
pub use globals::SceneView;
pub use glyph::{stroke_glyph, FontFace, GlyphSource, LastResortFace, RasterGlyph, StrokedGlyph};
pub use gpu::{Frame, GpuContext, DEPTH_FORMAT};
pub use particles::{hsl_to_rgb, OrbitEmitter, Particle, ParticleSystem, SpawnPolicy};
pub use renderer::Renderer;
pub use text::{fallback_chain, layout_text, CharacterData, GlyphCache, GlyphData, QuadVertex, TextRenderer};
pub use world_renderer::{boundary_neighbors, MeshCache, WorldRenderer, WorldStats};
