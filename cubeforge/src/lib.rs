//! Cubeforge - rendering core for a block-world game client.
//!
//! The world itself (terrain, block edits, simulation) belongs to the
//! game. This crate meshes the chunks it exposes through
//! [`world::BlockWorld`], draws them with distance fog, runs a small
//! tick-driven particle system and renders outlined text on top.

pub mod camera;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod render;
pub mod world;

pub use crate::camera::Camera;
pub use crate::config::RenderConfig;
pub use crate::engine::{Engine, EngineConfig, EngineContext, Game};
pub use crate::error::{AtlasError, ConfigError, TextError};
pub use crate::input::InputState;
pub use crate::render::{Frame, ParticleSystem, Renderer, WorldStats};
pub use crate::world::{BlockKind, BlockWorld, Chunk, ChunkCoord, ChunkStore};
pub use winit::{
    event::{ElementState, MouseButton},
    keyboard::KeyCode,
};
