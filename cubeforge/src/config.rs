use std::{fs, path::Path};

use serde::Deserialize;

use crate::error::ConfigError;

/// Largest accepted render distance in chunks.
pub const MAX_RENDER_DISTANCE: u32 = 64;
/// Largest accepted `render_distance * eviction_factor` product.
const MAX_EVICTION_RADIUS: f32 = 128.0;
/// Accepted particle tick rates, in ticks per second.
pub const PARTICLE_TICK_RATES: std::ops::RangeInclusive<f32> = 1.0..=1000.0;

/// Tunables for the world, particle and text renderers.
///
/// Every field has a default, so a JSON config only needs the values it
/// overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Chebyshev radius, in chunks, of the area that gets meshed and drawn.
    pub render_distance: u32,
    /// Meshes further than `render_distance * eviction_factor` chunks are dropped.
    pub eviction_factor: f32,
    /// Fog starts at this fraction of the render distance.
    pub fog_start_fraction: f32,
    /// Fog reaches the sky color at this fraction of the render distance.
    pub fog_end_fraction: f32,
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    /// Maximum chunks meshed per frame while streaming.
    pub chunk_loads_per_frame: u32,
    /// Upper bound on particles sent to the GPU in one frame.
    pub max_particles: u32,
    /// Simulation ticks per second for the particle system.
    pub particle_tick_rate: f32,
    /// Pixel height glyphs are rasterized at.
    pub font_height: u32,
    /// Outline stroke radius in pixels.
    pub stroke_radius: f32,
    /// Glyph atlas edge length in pixels (square).
    pub glyph_atlas_size: u32,
    /// Glyphs per text batch before a flush.
    pub text_batch_glyphs: u32,
    /// Text batches that can be flushed in one frame.
    pub text_batches_per_frame: u32,
    /// `render_text` calls that can be issued in one frame.
    pub text_draws_per_frame: u32,
    /// Font files in fallback priority order. The built-in last-resort face
    /// is always appended after them.
    pub font_paths: Vec<String>,
    pub sky_color: [f32; 3],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            render_distance: 8,
            eviction_factor: 1.5,
            fog_start_fraction: 0.7,
            fog_end_fraction: 1.0,
            fov_y_degrees: 90.0,
            near_plane: 0.05,
            far_plane: 1000.0,
            chunk_loads_per_frame: 2,
            max_particles: 1024,
            particle_tick_rate: 60.0,
            font_height: 16,
            stroke_radius: 1.5,
            glyph_atlas_size: 512,
            text_batch_glyphs: 64,
            text_batches_per_frame: 32,
            text_draws_per_frame: 64,
            font_paths: Vec::new(),
            sky_color: [0.55, 0.75, 1.0],
        }
    }
}

impl RenderConfig {
    /// Parse a config from JSON and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject values the renderers cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_RENDER_DISTANCE).contains(&self.render_distance) {
            return Err(ConfigError::Invalid {
                field: "render_distance",
                reason: format!("{} is outside 1..={MAX_RENDER_DISTANCE}", self.render_distance),
            });
        }
        if !self.eviction_factor.is_finite() || self.eviction_factor < 1.0 {
            return Err(ConfigError::Invalid {
                field: "eviction_factor",
                reason: format!("{} would evict visible chunks", self.eviction_factor),
            });
        }
        if self.render_distance as f32 * self.eviction_factor > MAX_EVICTION_RADIUS {
            return Err(ConfigError::Invalid {
                field: "eviction_factor",
                reason: format!("eviction radius exceeds {MAX_EVICTION_RADIUS} chunks"),
            });
        }
        if !(self.fog_start_fraction < self.fog_end_fraction) {
            return Err(ConfigError::Invalid {
                field: "fog_start_fraction",
                reason: "fog must start before it ends".into(),
            });
        }
        if !PARTICLE_TICK_RATES.contains(&self.particle_tick_rate) {
            return Err(ConfigError::Invalid {
                field: "particle_tick_rate",
                reason: format!(
                    "{} is outside {}..={} ticks per second",
                    self.particle_tick_rate,
                    PARTICLE_TICK_RATES.start(),
                    PARTICLE_TICK_RATES.end()
                ),
            });
        }
        if self.font_height == 0 || self.glyph_atlas_size == 0 {
            return Err(ConfigError::Invalid {
                field: "font_height",
                reason: "font height and atlas size must be non-zero".into(),
            });
        }
        if !(0.0..=self.font_height as f32).contains(&self.stroke_radius) {
            return Err(ConfigError::Invalid {
                field: "stroke_radius",
                reason: format!("{} is outside 0..={}", self.stroke_radius, self.font_height),
            });
        }
        if self.text_batch_glyphs == 0 || self.text_batches_per_frame == 0 {
            return Err(ConfigError::Invalid {
                field: "text_batch_glyphs",
                reason: "text buffers need room for at least one batch".into(),
            });
        }
        Ok(())
    }

    /// Set the render distance in chunks.
    #[must_use]
    pub fn with_render_distance(mut self, chunks: u32) -> Self {
        self.render_distance = chunks;
        self
    }

    #[must_use]
    pub fn with_max_particles(mut self, max: u32) -> Self {
        self.max_particles = max;
        self
    }

    /// Append a font file to the fallback chain.
    #[must_use]
    pub fn with_font(mut self, path: impl Into<String>) -> Self {
        self.font_paths.push(path.into());
        self
    }

    #[must_use]
    pub fn with_sky_color(mut self, color: [f32; 3]) -> Self {
        self.sky_color = color;
        self
    }

    /// Chebyshev chunk radius beyond which meshes are evicted.
    pub fn eviction_radius(&self) -> u32 {
        (self.render_distance as f32 * self.eviction_factor).ceil() as u32
    }

    /// Upper bound on chunk meshes alive at once.
    pub fn max_resident_chunks(&self) -> u32 {
        let side = 2 * self.eviction_radius() + 1;
        side * side
    }

    /// Rounded line advance used by text layout.
    pub fn line_height(&self) -> f32 {
        (self.font_height as f32 * 1.25).round()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = RenderConfig::from_json_str(r#"{ "render_distance": 4, "font_paths": ["a.ttf"] }"#)
            .expect("valid config");
        assert_eq!(config.render_distance, 4);
        assert_eq!(config.font_paths, vec!["a.ttf".to_string()]);
        assert_eq!(config.max_particles, RenderConfig::default().max_particles);
    }

    #[test]
    fn rejects_zero_render_distance() {
        let err = RenderConfig::from_json_str(r#"{ "render_distance": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "render_distance", .. }));
    }

    #[test]
    fn rejects_huge_render_distance() {
        let err = RenderConfig::from_json_str(r#"{ "render_distance": 100000 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "render_distance", .. }));

        let config = RenderConfig::from_json_str(r#"{ "render_distance": 64 }"#).expect("upper bound");
        assert_eq!(config.max_resident_chunks(), 193 * 193);
    }

    #[test]
    fn rejects_non_finite_eviction_factor() {
        let mut config = RenderConfig::default();
        config.eviction_factor = f32::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "eviction_factor", .. })
        ));
        config.eviction_factor = f32::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_eviction_radius_past_limit() {
        let err = RenderConfig::from_json_str(r#"{ "render_distance": 64, "eviction_factor": 5.0 }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "eviction_factor", .. }));
    }

    #[test]
    fn rejects_tick_rate_out_of_range() {
        for json in [
            r#"{ "particle_tick_rate": 1e-30 }"#,
            r#"{ "particle_tick_rate": 0.5 }"#,
            r#"{ "particle_tick_rate": 5000.0 }"#,
        ] {
            let err = RenderConfig::from_json_str(json).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { field: "particle_tick_rate", .. }));
        }
        let config = RenderConfig::from_json_str(r#"{ "particle_tick_rate": 1.0 }"#).expect("lower bound");
        assert_eq!(std::time::Duration::from_secs_f64(1.0 / config.particle_tick_rate as f64).as_secs(), 1);
    }

    #[test]
    fn rejects_bad_stroke_radius() {
        let mut config = RenderConfig::default();
        config.stroke_radius = f32::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "stroke_radius", .. })
        ));
        config.stroke_radius = -1.0;
        assert!(config.validate().is_err());
        config.stroke_radius = 1e6;
        assert!(config.validate().is_err());
        config.stroke_radius = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_fog() {
        let err = RenderConfig::from_json_str(r#"{ "fog_start_fraction": 1.0, "fog_end_fraction": 0.5 }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = RenderConfig::from_json_str("{ render_distance: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn eviction_radius_rounds_up() {
        let config = RenderConfig::default().with_render_distance(5);
        assert_eq!(config.eviction_radius(), 8);
        assert_eq!(config.max_resident_chunks(), 17 * 17);
    }

    #[test]
    fn line_height_is_rounded() {
        let mut config = RenderConfig::default();
        config.font_height = 16;
        assert_eq!(config.line_height(), 20.0);
        config.font_height = 13;
        assert_eq!(config.line_height(), 16.0);
    }
}
