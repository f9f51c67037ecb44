mod terrain;

use anyhow::Result;
use cubeforge::{
    render::OrbitEmitter,
    world::{BlockKind, Spiral, CHUNK_HEIGHT},
    Camera, Engine, EngineContext, Game, InputState, KeyCode, MouseButton, ParticleSystem,
    RenderConfig, WorldStats,
};
use glam::Vec3;

use crate::terrain::TerrainWorld;

const MOVE_SPEED: f32 = 10.0;
const MOUSE_SENSITIVITY: f32 = 0.0025;

/// Tried in order when the config names no font.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

struct WorldDemo {
    world: TerrainWorld,
    camera: Camera,
    particles: ParticleSystem,
    render_distance: u32,
    eviction_radius: u32,
    loads_per_frame: u32,
    fps: f32,
    last_stats: WorldStats,
}

impl WorldDemo {
    fn new(config: &RenderConfig) -> Self {
        let mut particles = ParticleSystem::from_config(config);
        particles.add_spawner(Box::new(OrbitEmitter::new(Vec3::new(0.0, 39.0, 0.0))));

        let spawn_height = TerrainWorld::height(8, 8) as f32 + 6.0;
        Self {
            world: TerrainWorld::new(),
            camera: Camera::from_config(Vec3::new(8.5, spawn_height, 8.5), config),
            particles,
            render_distance: config.render_distance,
            eviction_radius: config.eviction_radius(),
            loads_per_frame: config.chunk_loads_per_frame,
            fps: 0.0,
            last_stats: WorldStats::default(),
        }
    }

    /// Mesh the nearest missing chunks, at most `loads_per_frame` of them.
    fn stream_chunks(&mut self, ctx: &mut EngineContext<'_>) {
        let center = self.camera.chunk();
        let mut budget = self.loads_per_frame;

        for coord in Spiral::new(center, self.render_distance) {
            if budget == 0 {
                break;
            }
            if ctx.renderer().world().meshes().contains(coord) {
                continue;
            }
            // Generate the ring around a chunk first so its border faces
            // are culled against real neighbors.
            self.world.generate_chunk(coord);
            for (dx, dz) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
                self.world.generate_chunk(coord.offset(dx, dz));
            }
            ctx.renderer().render_chunk(&self.world, coord);
            budget -= 1;
        }

        let unloaded = self.world.unload_beyond(center, self.eviction_radius + 1);
        if unloaded > 0 {
            log::debug!("unloaded {unloaded} terrain chunks");
        }
    }

    /// Left click digs the top block of the column under the camera, right
    /// click stacks a plank on it.
    fn edit_blocks(&mut self, ctx: &mut EngineContext<'_>) {
        let x = self.camera.position.x.floor() as i32;
        let z = self.camera.position.z.floor() as i32;

        let edit = if ctx.input().is_mouse_pressed(MouseButton::Left) {
            self.world.top_block(x, z).map(|y| (y, None))
        } else if ctx.input().is_mouse_pressed(MouseButton::Right) {
            let y = self.world.top_block(x, z).map_or(0, |top| top + 1);
            (y < CHUNK_HEIGHT).then_some((y, Some(BlockKind::Planks)))
        } else {
            None
        };

        if let Some((y, block)) = edit {
            if self.world.set_block(x, y, z, block) {
                ctx.renderer().block_changed(&self.world, x, y, z);
            }
        }
    }
}

/// Mouse look and WASD movement. Both stop while the cursor is released.
fn steer(camera: &mut Camera, input: &mut InputState, dt: f32) {
    let look = input.take_mouse_delta();
    if !input.is_cursor_captured() {
        return;
    }
    camera.rotate(-look.x * MOUSE_SENSITIVITY, -look.y * MOUSE_SENSITIVITY);
    camera.move_relative(input.movement_vector() * MOVE_SPEED * dt);
}

fn first_existing<'a>(candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .copied()
        .find(|path| std::path::Path::new(path).is_file())
}

impl Game for WorldDemo {
    fn init(&mut self, ctx: &mut EngineContext) -> Result<()> {
        ctx.set_cursor_captured(true);
        Ok(())
    }

    fn update(&mut self, ctx: &mut EngineContext) -> Result<()> {
        let dt = ctx.delta_time().as_secs_f32();
        if dt > 0.0 {
            self.fps = self.fps * 0.9 + (1.0 / dt) * 0.1;
        }

        if ctx.input().is_key_pressed(KeyCode::Escape) {
            let captured = ctx.input().is_cursor_captured();
            ctx.set_cursor_captured(!captured);
        }

        steer(&mut self.camera, ctx.input_mut(), dt);
        if ctx.input().is_cursor_captured() {
            self.edit_blocks(ctx);
        }
        self.stream_chunks(ctx);

        self.particles.update(dt);
        Ok(())
    }

    fn draw(&mut self, ctx: &mut EngineContext) -> Result<()> {
        let renderer = ctx.renderer();
        let mut frame = renderer.begin_frame()?;
        self.last_stats = renderer.draw_world(&mut frame, &self.camera, &mut self.particles)?;

        let position = self.camera.position;
        let chunk = self.camera.chunk();
        let overlay = format!(
            "{:.0} FPS\nx {:.1}  y {:.1}  z {:.1}  chunk {}, {}\n{} chunks, {} faces, {} particles",
            self.fps,
            position.x,
            position.y,
            position.z,
            chunk.x,
            chunk.z,
            self.last_stats.chunks_drawn,
            self.last_stats.faces_drawn,
            self.particles.len(),
        );
        renderer.draw_text(&overlay, 8.0, 24.0, 1.0, [1.0, 1.0, 1.0, 1.0])?;
        let (width, height) = renderer.surface_size();
        renderer.draw_text(
            "+",
            width as f32 / 2.0 - 4.0,
            height as f32 / 2.0 + 5.0,
            1.0,
            [1.0, 1.0, 1.0, 1.0],
        )?;

        renderer.end_frame(frame)?;
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("loading render config from {path}");
            RenderConfig::from_json_file(&path)?
        }
        None => RenderConfig::default(),
    };
    if config.font_paths.is_empty() {
        if let Some(path) = first_existing(SYSTEM_FONTS) {
            log::info!("using system font {path}");
            config = config.with_font(path);
        }
    }
    let demo = WorldDemo::new(&config);

    Engine::new()
        .with_title("World Demo - Cubeforge")
        .with_size(1280, 720)
        .with_vsync(true)
        .with_render_config(config)
        .run(demo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubeforge::ElementState;

    #[test]
    fn released_cursor_freezes_the_camera() {
        let mut camera = Camera::default();
        let start = camera.position;
        let mut input = InputState::new();
        input.handle_key_code(KeyCode::KeyW, ElementState::Pressed);

        steer(&mut camera, &mut input, 0.5);
        assert_eq!(camera.position, start);

        input.set_cursor_captured(true);
        steer(&mut camera, &mut input, 0.5);
        assert!(camera.position.distance(start) > 1.0);
    }

    #[test]
    fn released_cursor_discards_look_motion() {
        let mut camera = Camera::default();
        let forward = camera.forward();
        let mut input = InputState::new();
        input.set_cursor_captured(true);
        input.handle_mouse_motion(200.0, 0.0);
        input.set_cursor_captured(false);

        steer(&mut camera, &mut input, 0.016);
        assert_eq!(camera.forward(), forward);
        assert_eq!(input.mouse_delta(), glam::Vec2::ZERO);
    }

    #[test]
    fn font_lookup_skips_missing_files() {
        assert_eq!(first_existing(&["no/such/font.ttf"]), None);
        let manifest = concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml");
        assert_eq!(first_existing(&["no/such/font.ttf", manifest]), Some(manifest));
    }
}
