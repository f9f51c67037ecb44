use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use wgpu::{
    ColorTargetState, ColorWrites, CompareFunction, DepthStencilState, FragmentState,
    MultisampleState, PipelineLayoutDescriptor, PrimitiveState, RenderPipeline,
    RenderPipelineDescriptor, TextureFormat, VertexState,
};

use super::buffer::{GpuBuffer, VertexLayout};
use super::globals::SceneGlobals;
use super::gpu::DEPTH_FORMAT;
use super::shaders;
use crate::config::RenderConfig;

/// A single particle, laid out as the GPU instance record.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Particle {
    /// World-space center
    pub position: [f32; 3],
    /// Billboard edge length in world units
    pub size: f32,
    /// Block texture array layer to sample
    pub texture: u32,
    /// Center of the sampled patch in texture space
    pub tex_offset: [f32; 2],
    /// Tint multiplied into the sampled texel
    pub color: [f32; 3],
    /// Tick at which the particle is removed
    pub expiry_tick: u32,
}

const _: () = assert!(std::mem::size_of::<Particle>() == 44);

impl Particle {
    const ATTRIBUTES: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32,
        2 => Uint32,
        3 => Float32x2,
        4 => Float32x3,
        5 => Uint32,
    ];

    pub const LAYOUT: VertexLayout = VertexLayout {
        stride: std::mem::size_of::<Particle>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &Self::ATTRIBUTES,
    };
}

/// Heap entry ordered by expiry, then by spawn order.
#[derive(Clone, Copy, Debug)]
struct Queued {
    seq: u64,
    particle: Particle,
}

impl Queued {
    fn key(&self) -> (u32, u64) {
        (self.particle.expiry_tick, self.seq)
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Decides which particles appear on each tick.
pub trait SpawnPolicy {
    /// Push the particles born on `tick` into `out`.
    fn spawn(&mut self, tick: u32, out: &mut Vec<Particle>);
}

/// Emits one particle per tick along a circle, cycling through hues.
#[derive(Clone, Debug)]
pub struct OrbitEmitter {
    /// Center of the orbit
    pub center: Vec3,
    /// Orbit radius
    pub radius: f32,
    /// Ticks per full revolution (and per hue cycle)
    pub period_ticks: u32,
    /// Ticks each particle lives
    pub lifetime_ticks: u32,
    /// Particle size in world units
    pub size: f32,
    /// Texture array layer
    pub texture: u32,
}

impl OrbitEmitter {
    pub fn new(center: Vec3) -> Self {
        Self {
            center,
            radius: 0.5,
            period_ticks: 60,
            lifetime_ticks: 110,
            size: 0.1,
            texture: 8,
        }
    }

    /// Set the orbit radius.
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    /// Set how long each particle lives, in ticks.
    pub fn with_lifetime(mut self, ticks: u32) -> Self {
        self.lifetime_ticks = ticks;
        self
    }

    pub fn with_period(mut self, ticks: u32) -> Self {
        self.period_ticks = ticks.max(1);
        self
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn with_texture(mut self, layer: u32) -> Self {
        self.texture = layer;
        self
    }
}

impl SpawnPolicy for OrbitEmitter {
    fn spawn(&mut self, tick: u32, out: &mut Vec<Particle>) {
        let t = tick as f32 / self.period_ticks as f32;
        let hue = t.fract();
        let phi = t * std::f32::consts::TAU;
        let offset = Vec3::new(phi.cos(), phi.sin(), (phi / 2.0).sin()) * self.radius;

        out.push(Particle {
            position: (self.center + offset).to_array(),
            size: self.size,
            texture: self.texture,
            tex_offset: [0.5 + 0.4 * phi.cos(), 0.5 + 0.4 * phi.sin()],
            color: hsl_to_rgb(hue, 1.0, 0.5),
            expiry_tick: tick.saturating_add(self.lifetime_ticks),
        });
    }
}

/// Convert HSL (all components in `0..=1`) to RGB.
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [f32; 3] {
    if s <= 0.0 {
        return [l, l, l];
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let channel = |t: f32| {
        let t = t.rem_euclid(1.0);
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        }
    };
    [channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0)]
}

/// Live particles in a min-heap keyed by expiry tick.
pub struct ParticleSystem {
    heap: BinaryHeap<Reverse<Queued>>,
    spawners: Vec<Box<dyn SpawnPolicy>>,
    spawned: Vec<Particle>,
    tick: u32,
    next_seq: u64,
    tick_length: f32,
    accumulator: f32,
    max_particles: usize,
    overflowing: bool,
}

impl ParticleSystem {
    /// Create a system running `tick_rate` ticks per second that draws at
    /// most `max_particles` per frame.
    pub fn new(tick_rate: f32, max_particles: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            spawners: Vec::new(),
            spawned: Vec::new(),
            tick: 0,
            next_seq: 0,
            tick_length: 1.0 / tick_rate.max(f32::EPSILON),
            accumulator: 0.0,
            max_particles,
            overflowing: false,
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.particle_tick_rate, config.max_particles as usize)
    }

    /// Add a spawn policy consulted every tick.
    pub fn add_spawner(&mut self, spawner: Box<dyn SpawnPolicy>) {
        self.spawners.push(spawner);
    }

    pub fn current_tick(&self) -> u32 {
        self.tick
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn max_particles(&self) -> usize {
        self.max_particles
    }

    /// Insert a particle directly.
    pub fn spawn(&mut self, particle: Particle) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Queued { seq, particle }));
    }

    /// The particle that expires first.
    pub fn peek_min(&self) -> Option<&Particle> {
        self.heap.peek().map(|Reverse(queued)| &queued.particle)
    }

    pub fn pop_min(&mut self) -> Option<Particle> {
        self.heap.pop().map(|Reverse(queued)| queued.particle)
    }

    /// Advance by `dt` seconds, running every whole tick that fits.
    /// Returns the number of ticks run.
    pub fn update(&mut self, dt: f32) -> u32 {
        self.accumulator += dt.max(0.0);
        let mut ticks = 0;
        while self.accumulator >= self.tick_length {
            self.accumulator -= self.tick_length;
            self.tick();
            ticks += 1;
        }
        ticks
    }

    /// Run one simulation tick: spawn, reap expired particles, advance.
    pub fn tick(&mut self) {
        let mut spawned = std::mem::take(&mut self.spawned);
        for spawner in &mut self.spawners {
            spawner.spawn(self.tick, &mut spawned);
        }
        for particle in spawned.drain(..) {
            self.spawn(particle);
        }
        self.spawned = spawned;

        while self
            .peek_min()
            .is_some_and(|particle| particle.expiry_tick <= self.tick)
        {
            self.heap.pop();
        }
        self.tick = self.tick.wrapping_add(1);
    }

    /// Copy the live set into `out`, keeping at most `max_particles` in heap
    /// storage order. Returns the number copied.
    pub fn collect_visible(&mut self, out: &mut Vec<Particle>) -> usize {
        out.clear();
        let live = self.heap.len();
        if live > self.max_particles {
            if !self.overflowing {
                log::warn!(
                    "Too many particles! {live} live, drawing the first {}",
                    self.max_particles
                );
            }
            self.overflowing = true;
        } else {
            self.overflowing = false;
        }
        out.extend(
            self.heap
                .iter()
                .take(self.max_particles)
                .map(|Reverse(queued)| queued.particle),
        );
        out.len()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.accumulator = 0.0;
    }
}

/// Streams the live particle set into one instanced draw.
pub struct ParticleRenderer {
    pipeline: RenderPipeline,
    instances: GpuBuffer<Particle>,
    scratch: Vec<Particle>,
}

impl ParticleRenderer {
    pub(crate) fn new(
        device: &wgpu::Device,
        surface_format: TextureFormat,
        globals: &SceneGlobals,
        max_particles: usize,
    ) -> Result<Self> {
        let shader = shaders::compile(device, shaders::PARTICLE)?;

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("particle-pipeline-layout"),
            bind_group_layouts: &[globals.layout()],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("particle-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Particle::LAYOUT.buffer_layout()],
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
            primitive: PrimitiveState::default(),
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
            pipeline,
            instances: GpuBuffer::with_capacity(device, "particle-instances", Particle::LAYOUT, max_particles),
            scratch: Vec::with_capacity(max_particles),
        })
    }

    /// Upload the live set and draw it. Returns the instance count.
    pub(crate) fn render(
        &mut self,
        queue: &wgpu::Queue,
        pass: &mut wgpu::RenderPass<'_>,
        globals: &SceneGlobals,
        system: &mut ParticleSystem,
    ) -> u32 {
        system.collect_visible(&mut self.scratch);
        let count = self.instances.update_data(queue, &self.scratch);
        if count == 0 {
            return 0;
        }

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, globals.bind_group(), &[]);
        if !self.instances.bind(pass, 0) {
            return 0;
        }
        pass.draw(0..6, 0..count as u32);
        count as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle(expiry_tick: u32) -> Particle {
        Particle {
            position: [0.0; 3],
            size: 1.0,
            texture: 0,
            tex_offset: [0.5; 2],
            color: [1.0; 3],
            expiry_tick,
        }
    }

    #[test]
    fn min_query_tracks_smallest_expiry() {
        let mut system = ParticleSystem::new(60.0, 100);
        let expiries = [40, 7, 93, 7, 18, 61, 2, 55];
        let mut remaining: Vec<u32> = Vec::new();
        for (i, &expiry) in expiries.iter().enumerate() {
            system.spawn(particle(expiry));
            remaining.push(expiry);
            if i % 3 == 2 {
                let popped = system.pop_min().unwrap();
                let min = *remaining.iter().min().unwrap();
                assert_eq!(popped.expiry_tick, min);
                let pos = remaining.iter().position(|&e| e == min).unwrap();
                remaining.remove(pos);
            }
            assert_eq!(
                system.peek_min().map(|p| p.expiry_tick),
                remaining.iter().min().copied()
            );
        }
    }

    #[test]
    fn ties_pop_in_spawn_order() {
        let mut system = ParticleSystem::new(60.0, 10);
        let mut first = particle(5);
        first.size = 1.0;
        let mut second = particle(5);
        second.size = 2.0;
        system.spawn(first);
        system.spawn(second);
        assert_eq!(system.pop_min().unwrap().size, 1.0);
        assert_eq!(system.pop_min().unwrap().size, 2.0);
    }

    #[test]
    fn tick_reaps_expired_particles() {
        let mut system = ParticleSystem::new(60.0, 10);
        system.spawn(particle(0));
        system.spawn(particle(1));
        system.spawn(particle(3));
        system.tick();
        assert_eq!(system.len(), 2);
        system.tick();
        assert_eq!(system.len(), 1);
        assert_eq!(system.current_tick(), 2);
    }

    #[test]
    fn orbit_reaches_steady_state_population() {
        let mut system = ParticleSystem::new(60.0, 1000);
        system.add_spawner(Box::new(OrbitEmitter::new(Vec3::new(0.0, 39.0, 0.0)).with_lifetime(110)));
        for _ in 0..500 {
            system.tick();
        }
        // One spawn per tick, each living `lifetime` ticks including its birth tick.
        assert_eq!(system.len(), 110);
        assert!(system.peek_min().unwrap().expiry_tick >= system.current_tick());
    }

    #[test]
    fn update_runs_whole_ticks() {
        let mut system = ParticleSystem::new(10.0, 10);
        assert_eq!(system.update(0.25), 2);
        assert_eq!(system.update(0.06), 1);
        assert_eq!(system.current_tick(), 3);
    }

    #[test]
    fn visible_set_is_clamped() {
        let mut system = ParticleSystem::new(60.0, 4);
        for expiry in 0..10 {
            system.spawn(particle(100 + expiry));
        }
        let mut out = Vec::new();
        assert_eq!(system.collect_visible(&mut out), 4);
        assert_eq!(out.len(), 4);
        assert_eq!(system.len(), 10);
    }

    #[test]
    fn orbit_particles_follow_the_circle() {
        let mut emitter = OrbitEmitter::new(Vec3::ZERO).with_radius(2.0);
        let mut out = Vec::new();
        emitter.spawn(0, &mut out);
        emitter.spawn(15, &mut out);
        assert_eq!(out[0].position, [2.0, 0.0, 0.0]);
        let quarter = out[1].position;
        assert!(quarter[0].abs() < 1e-5);
        assert!((quarter[1] - 2.0).abs() < 1e-5);
        assert_eq!(out[1].expiry_tick, 15 + 110);
    }

    #[test]
    fn hsl_primaries() {
        let close = |a: [f32; 3], b: [f32; 3]| a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-5);
        assert!(close(hsl_to_rgb(0.0, 1.0, 0.5), [1.0, 0.0, 0.0]));
        assert!(close(hsl_to_rgb(1.0 / 3.0, 1.0, 0.5), [0.0, 1.0, 0.0]));
        assert!(close(hsl_to_rgb(2.0 / 3.0, 1.0, 0.5), [0.0, 0.0, 1.0]));
        assert!(close(hsl_to_rgb(0.5, 0.0, 0.25), [0.25, 0.25, 0.25]));
    }
}
