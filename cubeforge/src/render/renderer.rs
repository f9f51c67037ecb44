use anyhow::Result;
use wgpu::{
    LoadOp, Operations, RenderPassColorAttachment, RenderPassDepthStencilAttachment,
    RenderPassDescriptor,
};
use winit::{dpi::PhysicalSize, window::Window};

use super::block_textures::{BlockTextureLayers, BlockTextures};
use super::globals::SceneGlobals;
use super::gpu::{Frame, GpuContext};
use super::particles::{ParticleRenderer, ParticleSystem};
use super::text::TextRenderer;
use super::world_renderer::{WorldRenderer, WorldStats};
use crate::camera::Camera;
use crate::config::RenderConfig;
use crate::world::{BlockWorld, ChunkCoord};

/// Pixel size of each generated block texture layer.
const PROCEDURAL_TEXTURE_SIZE: u32 = 16;

/// Owns the GPU context and every pipeline. One frame is
/// `begin_frame`, optionally `draw_world`, any number of `draw_text`,
/// then `end_frame`.
pub struct Renderer<'window> {
    gpu: GpuContext<'window>,
    globals: SceneGlobals,
    block_textures: BlockTextures,
    world: WorldRenderer,
    particles: ParticleRenderer,
    text: TextRenderer,
    config: RenderConfig,
}

impl<'window> Renderer<'window> {
    pub fn new(window: &'window Window, vsync: bool, config: RenderConfig) -> Result<Self> {
        config.validate()?;
        let gpu = GpuContext::new(window, vsync)?;
        let device = gpu.device();
        let queue = gpu.queue();
        let format = gpu.surface_format();

        let block_textures = BlockTextures::upload(
            device,
            queue,
            &BlockTextureLayers::procedural(PROCEDURAL_TEXTURE_SIZE),
        )?;
        let globals = SceneGlobals::new(device, &block_textures);
        let world = WorldRenderer::new(device, format, &globals, &config)?;
        let particles = ParticleRenderer::new(device, format, &globals, config.max_particles as usize)?;
        let mut text = TextRenderer::new(device, queue, format, &config)?;
        let (width, height) = gpu.surface_size();
        text.set_viewport(width, height);
        gpu.check_errors("renderer setup");

        log::info!(
            "renderer ready: {width}x{height}, render distance {} chunks",
            config.render_distance
        );

        Ok(Self {
            gpu,
            globals,
            block_textures,
            world,
            particles,
            text,
            config,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn world(&self) -> &WorldRenderer {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut WorldRenderer {
        &mut self.world
    }

    pub fn text(&self) -> &TextRenderer {
        &self.text
    }

    pub fn block_textures(&self) -> &BlockTextures {
        &self.block_textures
    }

    /// Replace the block texture array, e.g. with images loaded from disk.
    pub fn set_block_textures(&mut self, layers: &BlockTextureLayers) -> Result<()> {
        self.block_textures = BlockTextures::upload(self.gpu.device(), self.gpu.queue(), layers)?;
        self.globals.set_textures(self.gpu.device(), &self.block_textures);
        Ok(())
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.gpu.resize(new_size);
        let (width, height) = self.gpu.surface_size();
        self.text.set_viewport(width, height);
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.gpu.surface_size()
    }

    pub fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.gpu.surface_size();
        width as f32 / height.max(1) as f32
    }

    /// Mesh a chunk the world has just loaded.
    pub fn render_chunk<W: BlockWorld + ?Sized>(&mut self, world: &W, coord: ChunkCoord) -> bool {
        self.world
            .render_chunk(self.gpu.device(), self.gpu.queue(), world, coord)
    }

    /// Remesh whatever the block change at `(x, y, z)` affects.
    pub fn block_changed<W: BlockWorld + ?Sized>(&mut self, world: &W, x: i32, y: i32, z: i32) {
        self.world
            .block_changed(self.gpu.device(), self.gpu.queue(), world, x, y, z);
    }

    pub fn begin_frame(&mut self) -> Result<Frame> {
        self.text.begin_frame();
        self.gpu.acquire_frame()
    }

    /// Clear to the sky color and draw chunks and particles.
    pub fn draw_world(
        &mut self,
        frame: &mut Frame,
        camera: &Camera,
        particles: &mut ParticleSystem,
    ) -> Result<WorldStats> {
        let scene = camera.scene_view(self.aspect_ratio());
        let sky = self.world.sky_color();
        let queue = self.gpu.queue();
        let depth_view = self.gpu.depth_view();
        let view = &frame.view;
        let encoder = frame
            .encoder
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Frame already ended"))?;

        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("world-pass"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(sky_clear_color(sky)),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(Operations {
                    load: LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            multiview_mask: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        let stats = self.world.render(queue, &mut pass, &self.globals, &scene);
        self.particles.render(queue, &mut pass, &self.globals, particles);
        drop(pass);

        frame.world_drawn = true;
        Ok(stats)
    }

    /// Queue text for the overlay pass. `(x, y)` is the first baseline in
    /// pixels from the top-left corner.
    pub fn draw_text(&mut self, text: &str, x: f32, y: f32, scale: f32, color: [f32; 4]) -> Result<()> {
        self.text
            .render_text(self.gpu.queue(), text, x, y, scale, color)
    }

    /// Draw queued text on top, submit and present.
    pub fn end_frame(&mut self, mut frame: Frame) -> Result<()> {
        let load = if frame.world_drawn {
            LoadOp::Load
        } else {
            LoadOp::Clear(sky_clear_color(self.world.sky_color()))
        };

        {
            let view = &frame.view;
            let encoder = frame
                .encoder
                .as_mut()
                .ok_or_else(|| anyhow::anyhow!("Frame already ended"))?;
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("overlay-pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                multiview_mask: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            self.text.draw(&mut pass);
        }

        self.gpu.submit(frame)?;
        self.gpu.check_errors("frame");
        Ok(())
    }
}

fn sky_clear_color(sky: [f32; 3]) -> wgpu::Color {
    wgpu::Color {
        r: sky[0] as f64,
        g: sky[1] as f64,
        b: sky[2] as f64,
        a: 1.0,
    }
}
