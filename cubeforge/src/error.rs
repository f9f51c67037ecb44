use thiserror::Error;

/// Raised when a sub-image no longer fits in a texture atlas.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AtlasError {
    #[error("atlas exhausted: no room for a {width}x{height} image in a {atlas_width}x{atlas_height} atlas")]
    Full {
        width: u32,
        height: u32,
        atlas_width: u32,
        atlas_height: u32,
    },

    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    PixelBufferSize { expected: usize, actual: usize },
}

/// Errors from font loading and glyph resolution.
#[derive(Debug, Error)]
pub enum TextError {
    #[error("failed to load font {path}: {reason}")]
    FontLoad { path: String, reason: String },

    #[error("no glyph source covers U+{:04X}", *.0 as u32)]
    NoGlyph(char),

    #[error("glyph fallback chain is empty")]
    EmptyFallbackChain,
}

/// Errors while reading a render configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
