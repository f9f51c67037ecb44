use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, Buffer, BufferBindingType, BufferUsages,
    SamplerBindingType, ShaderStages, TextureSampleType, TextureViewDimension,
};

use super::block_textures::BlockTextures;
use crate::world::ChunkCoord;

/// Camera state for one world pass.
#[derive(Debug, Clone, Copy)]
pub struct SceneView {
    pub proj: Mat4,
    pub view: Mat4,
    pub eye: Vec3,
}

impl SceneView {
    pub fn view_projection(&self) -> Mat4 {
        self.proj * self.view
    }

    pub fn camera_chunk(&self) -> ChunkCoord {
        ChunkCoord::containing(self.eye.x.floor() as i32, self.eye.z.floor() as i32)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct SceneUniforms {
    pub proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub eye: [f32; 4],
    pub sky_color: [f32; 4],
    /// x = fog start, y = fog end, in world units.
    pub fog: [f32; 4],
}

const _: () = assert!(std::mem::size_of::<SceneUniforms>() == 176);

/// Group 0 shared by the chunk and particle pipelines: scene uniforms plus
/// the block texture array.
pub(crate) struct SceneGlobals {
    buffer: Buffer,
    layout: BindGroupLayout,
    bind_group: BindGroup,
}

impl SceneGlobals {
    pub fn new(device: &wgpu::Device, textures: &BlockTextures) -> Self {
        let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("scene-bind-group-layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::VERTEX_FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: std::num::NonZeroU64::new(
                            std::mem::size_of::<SceneUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2Array,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene-uniform-buffer"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = create_bind_group(device, &layout, &buffer, textures);

        Self {
            buffer,
            layout,
            bind_group,
        }
    }

    pub fn layout(&self) -> &BindGroupLayout {
        &self.layout
    }

    pub fn bind_group(&self) -> &BindGroup {
        &self.bind_group
    }

    /// Point the bind group at a new block texture array.
    pub fn set_textures(&mut self, device: &wgpu::Device, textures: &BlockTextures) {
        self.bind_group = create_bind_group(device, &self.layout, &self.buffer, textures);
    }

    pub fn write(&self, queue: &wgpu::Queue, scene: &SceneView, sky_color: [f32; 3], fog: (f32, f32)) {
        let uniforms = SceneUniforms {
            proj: scene.proj.to_cols_array_2d(),
            view: scene.view.to_cols_array_2d(),
            eye: scene.eye.extend(1.0).to_array(),
            sky_color: [sky_color[0], sky_color[1], sky_color[2], 1.0],
            fog: [fog.0, fog.1, 0.0, 0.0],
        };
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(&uniforms));
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &BindGroupLayout,
    buffer: &Buffer,
    textures: &BlockTextures,
) -> BindGroup {
    device.create_bind_group(&BindGroupDescriptor {
        label: Some("scene-bind-group"),
        layout,
        entries: &[
            BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::TextureView(textures.view()),
            },
            BindGroupEntry {
                binding: 2,
                resource: BindingResource::Sampler(textures.sampler()),
            },
        ],
    })
}
