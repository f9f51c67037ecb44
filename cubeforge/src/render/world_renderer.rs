use std::collections::HashMap;

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, Buffer, BufferBinding, BufferBindingType,
    BufferUsages, ColorTargetState, ColorWrites, CompareFunction, DepthStencilState, Face,
    FragmentState, MultisampleState, PipelineLayoutDescriptor, PrimitiveState, RenderPipeline,
    RenderPipelineDescriptor, ShaderStages, TextureFormat, VertexState,
};

use super::buffer::align_to;
use super::chunk_mesh::{mesh_chunk, ChunkMesh, FaceRecord};
use super::frustum::Frustum;
use super::globals::{SceneGlobals, SceneView};
use super::gpu::DEPTH_FORMAT;
use super::shaders;
use crate::config::RenderConfig;
use crate::world::{BlockWorld, ChunkCoord, CHUNK_HEIGHT, CHUNK_SIZE};

/// Chunk meshes keyed by packed chunk coordinate.
#[derive(Default)]
pub struct MeshCache {
    meshes: HashMap<u64, ChunkMesh>,
}

impl MeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.meshes.contains_key(&coord.key())
    }

    pub fn get(&self, coord: ChunkCoord) -> Option<&ChunkMesh> {
        self.meshes.get(&coord.key())
    }

    /// Existing mesh for `coord`, or a fresh uninitialized one.
    pub fn entry(&mut self, coord: ChunkCoord) -> &mut ChunkMesh {
        self.meshes.entry(coord.key()).or_default()
    }

    pub fn remove(&mut self, coord: ChunkCoord) -> bool {
        self.meshes.remove(&coord.key()).is_some()
    }

    /// Drop every mesh further than `radius` chunks from `center`.
    pub fn evict_beyond(&mut self, center: ChunkCoord, radius: u32) -> usize {
        let before = self.meshes.len();
        self.meshes
            .retain(|&key, _| ChunkCoord::from_key(key).chebyshev(center) <= radius);
        before - self.meshes.len()
    }

    /// Meshes within `radius` chunks of `center`, in no particular order.
    pub fn in_range(&self, center: ChunkCoord, radius: u32) -> impl Iterator<Item = (ChunkCoord, &ChunkMesh)> {
        self.meshes
            .iter()
            .map(|(&key, mesh)| (ChunkCoord::from_key(key), mesh))
            .filter(move |(coord, _)| coord.chebyshev(center) <= radius)
    }
}

/// Chunks that border the block at `(x, z)` and share one of its faces.
pub fn boundary_neighbors(x: i32, z: i32) -> Vec<ChunkCoord> {
    let owner = ChunkCoord::containing(x, z);
    let (lx, lz) = (x.rem_euclid(CHUNK_SIZE), z.rem_euclid(CHUNK_SIZE));
    let mut out = Vec::with_capacity(2);
    if lx == 0 {
        out.push(owner.offset(-1, 0));
    } else if lx == CHUNK_SIZE - 1 {
        out.push(owner.offset(1, 0));
    }
    if lz == 0 {
        out.push(owner.offset(0, -1));
    } else if lz == CHUNK_SIZE - 1 {
        out.push(owner.offset(0, 1));
    }
    out
}

/// Per-draw chunk origin, bound with a dynamic offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ChunkUniforms {
    origin: [f32; 4],
}

/// Counters from the last world pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorldStats {
    pub chunks_drawn: u32,
    pub chunks_culled: u32,
    pub faces_drawn: u32,
    pub evicted: u32,
}

/// Owns the chunk meshes and draws those in range and in view.
pub struct WorldRenderer {
    cache: MeshCache,
    scratch: Vec<FaceRecord>,
    pipeline: RenderPipeline,
    chunk_uniforms: Buffer,
    chunk_bind_group: BindGroup,
    uniform_alignment: u64,
    max_draws: usize,
    staging: Vec<u8>,
    draws: Vec<(ChunkCoord, u32)>,
    render_distance: u32,
    eviction_radius: u32,
    fog_fractions: (f32, f32),
    sky_color: [f32; 3],
    stats: WorldStats,
}

impl WorldRenderer {
    pub(crate) fn new(
        device: &wgpu::Device,
        surface_format: TextureFormat,
        globals: &SceneGlobals,
        config: &RenderConfig,
    ) -> Result<Self> {
        let shader = shaders::compile(device, shaders::CHUNK)?;

        let uniform_alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = align_to(std::mem::size_of::<ChunkUniforms>() as u64, uniform_alignment);
        let max_draws = config.max_resident_chunks() as usize;

        let chunk_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("chunk-bind-group-layout"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: std::num::NonZeroU64::new(
                        std::mem::size_of::<ChunkUniforms>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let chunk_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("chunk-uniform-buffer"),
            size: stride * max_draws as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let chunk_bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("chunk-bind-group"),
            layout: &chunk_layout,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer(BufferBinding {
                    buffer: &chunk_uniforms,
                    offset: 0,
                    size: std::num::NonZeroU64::new(std::mem::size_of::<ChunkUniforms>() as u64),
                }),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("chunk-pipeline-layout"),
            bind_group_layouts: &[globals.layout(), &chunk_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("chunk-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[FaceRecord::LAYOUT.buffer_layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: PrimitiveState {
                cull_mode: Some(Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        Ok(Self {
            cache: MeshCache::new(),
            scratch: Vec::new(),
            pipeline,
            chunk_uniforms,
            chunk_bind_group,
            uniform_alignment: stride,
            max_draws,
            staging: Vec::new(),
            draws: Vec::new(),
            render_distance: config.render_distance,
            eviction_radius: config.eviction_radius(),
            fog_fractions: (config.fog_start_fraction, config.fog_end_fraction),
            sky_color: config.sky_color,
            stats: WorldStats::default(),
        })
    }

    pub fn meshes(&self) -> &MeshCache {
        &self.cache
    }

    pub fn stats(&self) -> WorldStats {
        self.stats
    }

    pub fn render_distance(&self) -> u32 {
        self.render_distance
    }

    pub fn sky_color(&self) -> [f32; 3] {
        self.sky_color
    }

    pub fn set_sky_color(&mut self, color: [f32; 3]) {
        self.sky_color = color;
    }

    /// Fog start and end distances in world units.
    pub fn fog(&self) -> (f32, f32) {
        let reach = (self.render_distance * CHUNK_SIZE as u32) as f32;
        (self.fog_fractions.0 * reach, self.fog_fractions.1 * reach)
    }

    /// Mesh `coord` from the world, creating its cache entry if needed.
    /// Returns `false` when the world has no such chunk.
    pub fn render_chunk<W: BlockWorld + ?Sized>(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        world: &W,
        coord: ChunkCoord,
    ) -> bool {
        let Some(chunk) = world.chunk(coord) else {
            log::debug!("skipping mesh for unloaded chunk ({}, {})", coord.x, coord.z);
            return false;
        };
        self.scratch.clear();
        mesh_chunk(chunk, world, &mut self.scratch);
        self.cache.entry(coord).load(device, queue, &self.scratch);
        log::debug!(
            "meshed chunk ({}, {}): {} faces",
            coord.x,
            coord.z,
            self.scratch.len()
        );
        true
    }

    /// Remesh after the block at `(x, y, z)` changed.
    ///
    /// The owning chunk is always remeshed; a neighbor sharing the changed
    /// block's face is remeshed only if it already has a mesh.
    pub fn block_changed<W: BlockWorld + ?Sized>(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        world: &W,
        x: i32,
        y: i32,
        z: i32,
    ) {
        if !(0..CHUNK_HEIGHT).contains(&y) {
            return;
        }
        self.render_chunk(device, queue, world, ChunkCoord::containing(x, z));
        for neighbor in boundary_neighbors(x, z) {
            if self.cache.contains(neighbor) {
                self.render_chunk(device, queue, world, neighbor);
            }
        }
    }

    pub fn remove_chunk(&mut self, coord: ChunkCoord) -> bool {
        self.cache.remove(coord)
    }

    /// Drop meshes beyond the eviction radius around `camera_chunk`.
    pub fn evict_out_of_range(&mut self, camera_chunk: ChunkCoord) -> usize {
        let evicted = self.cache.evict_beyond(camera_chunk, self.eviction_radius);
        if evicted > 0 {
            log::debug!(
                "evicted {evicted} chunk meshes beyond {} chunks",
                self.eviction_radius
            );
        }
        evicted
    }

    /// Draw every loaded chunk in range and inside the view frustum.
    pub(crate) fn render(
        &mut self,
        queue: &wgpu::Queue,
        pass: &mut wgpu::RenderPass<'_>,
        globals: &SceneGlobals,
        scene: &SceneView,
    ) -> WorldStats {
        let camera_chunk = scene.camera_chunk();
        let mut stats = WorldStats {
            evicted: self.evict_out_of_range(camera_chunk) as u32,
            ..Default::default()
        };

        globals.write(queue, scene, self.sky_color, self.fog());

        let frustum = Frustum::from_view_projection(scene.view_projection());
        self.draws.clear();
        self.staging.clear();
        for (coord, mesh) in self.cache.in_range(camera_chunk, self.render_distance) {
            if !mesh.is_loaded() || mesh.face_count() == 0 {
                continue;
            }
            let (ox, oz) = coord.origin();
            let min = Vec3::new(ox as f32, 0.0, oz as f32);
            let max = min + Vec3::new(CHUNK_SIZE as f32, CHUNK_HEIGHT as f32, CHUNK_SIZE as f32);
            if !frustum.intersects_aabb(min, max) {
                stats.chunks_culled += 1;
                continue;
            }
            if self.draws.len() == self.max_draws {
                log::warn!("chunk draw limit {} reached, skipping the rest", self.max_draws);
                break;
            }

            let offset = self.staging.len() as u32;
            let uniforms = ChunkUniforms {
                origin: [ox as f32, 0.0, oz as f32, 0.0],
            };
            self.staging.extend_from_slice(bytemuck::bytes_of(&uniforms));
            self.staging.resize(offset as usize + self.uniform_alignment as usize, 0);
            self.draws.push((coord, offset));
        }

        if !self.staging.is_empty() {
            queue.write_buffer(&self.chunk_uniforms, 0, &self.staging);
        }

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, globals.bind_group(), &[]);
        for &(coord, offset) in &self.draws {
            if let Some(mesh) = self.cache.get(coord) {
                pass.set_bind_group(1, &self.chunk_bind_group, &[offset]);
                stats.faces_drawn += mesh.render(pass);
                stats.chunks_drawn += 1;
            }
        }

        self.stats = stats;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eviction_keeps_chunks_inside_radius() {
        let mut cache = MeshCache::new();
        for x in -6..=6 {
            cache.entry(ChunkCoord::new(x, 0));
        }
        let evicted = cache.evict_beyond(ChunkCoord::new(0, 0), 4);
        assert_eq!(evicted, 4);
        assert_eq!(cache.len(), 9);
        assert!(cache.contains(ChunkCoord::new(-4, 0)));
        assert!(!cache.contains(ChunkCoord::new(5, 0)));
    }

    #[test]
    fn range_query_uses_chebyshev_distance() {
        let mut cache = MeshCache::new();
        cache.entry(ChunkCoord::new(2, 2));
        cache.entry(ChunkCoord::new(3, 0));
        cache.entry(ChunkCoord::new(-1, -1));
        let mut near: Vec<_> = cache
            .in_range(ChunkCoord::new(0, 0), 2)
            .map(|(coord, _)| coord)
            .collect();
        near.sort();
        assert_eq!(near, vec![ChunkCoord::new(-1, -1), ChunkCoord::new(2, 2)]);
    }

    #[test]
    fn entry_reuses_existing_mesh() {
        let mut cache = MeshCache::new();
        cache.entry(ChunkCoord::new(1, 1)).init();
        assert!(cache.entry(ChunkCoord::new(1, 1)).is_initialized());
        assert_eq!(cache.len(), 1);
        assert!(cache.remove(ChunkCoord::new(1, 1)));
        assert!(cache.is_empty());
    }

    #[test]
    fn boundary_blocks_touch_neighbor_chunks() {
        assert!(boundary_neighbors(5, 5).is_empty());
        assert_eq!(boundary_neighbors(0, 5), vec![ChunkCoord::new(-1, 0)]);
        assert_eq!(
            boundary_neighbors(15, 16),
            vec![ChunkCoord::new(1, 1), ChunkCoord::new(0, 0)]
        );
        assert_eq!(boundary_neighbors(-1, -16), vec![ChunkCoord::new(0, -1), ChunkCoord::new(-1, -2)]);
    }
}
