use anyhow::{anyhow, Result};
use wgpu::{ShaderModule, ShaderModuleDescriptor, ShaderSource};

/// Chunk faces: instanced quads expanded from face records.
pub const CHUNK: &str = "chunk";
/// Camera-facing particle billboards.
pub const PARTICLE: &str = "particle";
/// Outlined glyph quads in pixel space.
pub const TEXT: &str = "text";

const SOURCES: &[(&str, &str)] = &[
    (CHUNK, include_str!("chunk.wgsl")),
    (PARTICLE, include_str!("particle.wgsl")),
    (TEXT, include_str!("text.wgsl")),
];

/// WGSL source registered under `name`.
pub fn source(name: &str) -> Option<&'static str> {
    SOURCES
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, source)| *source)
}

/// Compile the program registered under `name`.
pub fn compile(device: &wgpu::Device, name: &str) -> Result<ShaderModule> {
    let source = source(name).ok_or_else(|| anyhow!("unknown shader program `{name}`"))?;
    Ok(device.create_shader_module(ShaderModuleDescriptor {
        label: Some(name),
        source: ShaderSource::Wgsl(source.into()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_program_has_both_entry_points() {
        for (name, source) in SOURCES {
            assert!(source.contains("fn vs_main"), "{name} lacks vs_main");
            assert!(source.contains("fn fs_main"), "{name} lacks fs_main");
        }
        assert!(source("missing").is_none());
    }
}
