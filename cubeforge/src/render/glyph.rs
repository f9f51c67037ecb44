//! Glyph sources and outline stroking.

use std::{fs, path::Path};

use ab_glyph::{Font, FontArc, Glyph, GlyphId, PxScale, ScaleFont};

use crate::error::TextError;

/// A rasterized glyph fill.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterGlyph {
    pub width: u32,
    pub height: u32,
    /// Offset from the pen position to the bitmap's left edge.
    pub bearing_x: i32,
    /// Distance from the baseline up to the bitmap's top edge.
    pub bearing_y: i32,
    /// Horizontal advance in 26.6 fixed point.
    pub advance: i32,
    /// One coverage byte per pixel, row-major.
    pub coverage: Vec<u8>,
}

impl RasterGlyph {
    /// A glyph with no pixels, such as a space.
    pub fn empty(advance: i32) -> Self {
        Self {
            width: 0,
            height: 0,
            bearing_x: 0,
            bearing_y: 0,
            advance,
            coverage: Vec::new(),
        }
    }

    fn coverage_at(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return 0;
        }
        self.coverage[(y as u32 * self.width + x as u32) as usize]
    }
}

/// One link in the font fallback chain.
pub trait GlyphSource {
    fn name(&self) -> &str;

    fn has_glyph(&self, ch: char) -> bool;

    /// Rasterize `ch` at `pixel_height`. `None` if the source lacks it.
    fn rasterize(&self, ch: char, pixel_height: f32) -> Option<RasterGlyph>;

    /// A total source covers every code point and may end a chain.
    fn is_total(&self) -> bool {
        false
    }
}

/// An outline font loaded from TTF/OTF bytes.
pub struct FontFace {
    name: String,
    font: FontArc,
}

impl FontFace {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, TextError> {
        let name = name.into();
        let font = FontArc::try_from_vec(bytes).map_err(|e| TextError::FontLoad {
            path: name.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { name, font })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TextError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| TextError::FontLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_bytes(path.display().to_string(), bytes)
    }

    /// Scale at which one em is `pixel_height` pixels tall.
    fn scale(&self, pixel_height: f32) -> PxScale {
        let units_per_em = self.font.units_per_em().unwrap_or(1000.0);
        PxScale::from(pixel_height * self.font.height_unscaled() / units_per_em)
    }

    fn id(&self, ch: char) -> Option<GlyphId> {
        let id = self.font.glyph_id(ch);
        (id.0 != 0).then_some(id)
    }
}

impl GlyphSource for FontFace {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_glyph(&self, ch: char) -> bool {
        self.id(ch).is_some()
    }

    fn rasterize(&self, ch: char, pixel_height: f32) -> Option<RasterGlyph> {
        let id = self.id(ch)?;
        let scale = self.scale(pixel_height);
        let scaled_font = self.font.as_scaled(scale);
        let advance = (scaled_font.h_advance(id) * 64.0).round() as i32;

        let glyph = Glyph {
            id,
            scale,
            position: ab_glyph::point(0.0, 0.0),
        };
        let Some(outlined) = scaled_font.outline_glyph(glyph) else {
            return Some(RasterGlyph::empty(advance));
        };

        let bounds = outlined.px_bounds();
        let width = bounds.width().ceil() as u32;
        let height = bounds.height().ceil() as u32;
        if width == 0 || height == 0 {
            return Some(RasterGlyph::empty(advance));
        }

        let mut coverage = vec![0u8; (width * height) as usize];
        outlined.draw(|x, y, c| {
            if x < width && y < height {
                coverage[(y * width + x) as usize] = (c.clamp(0.0, 1.0) * 255.0).round() as u8;
            }
        });

        Some(RasterGlyph {
            width,
            height,
            bearing_x: bounds.min.x.floor() as i32,
            bearing_y: (-bounds.min.y).ceil() as i32,
            advance,
            coverage,
        })
    }
}

/// Built-in total source that draws a hollow box for any code point.
#[derive(Clone, Copy, Debug, Default)]
pub struct LastResortFace;

impl GlyphSource for LastResortFace {
    fn name(&self) -> &str {
        "last-resort"
    }

    fn has_glyph(&self, _ch: char) -> bool {
        true
    }

    fn rasterize(&self, ch: char, pixel_height: f32) -> Option<RasterGlyph> {
        let margin = (pixel_height / 16.0).round().max(1.0) as i32;
        if ch.is_whitespace() || ch.is_control() {
            return Some(RasterGlyph::empty(((pixel_height / 4.0).round() as i32) * 64));
        }

        let width = (pixel_height * 0.5).round().max(3.0) as u32;
        let height = (pixel_height * 0.7).round().max(3.0) as u32;
        let mut coverage = vec![0u8; (width * height) as usize];
        for y in 0..height {
            for x in 0..width {
                if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                    coverage[(y * width + x) as usize] = 255;
                }
            }
        }

        Some(RasterGlyph {
            width,
            height,
            bearing_x: margin,
            bearing_y: height as i32,
            advance: (width as i32 + 2 * margin) * 64,
            coverage,
        })
    }

    fn is_total(&self) -> bool {
        true
    }
}

/// Fill and outline packed as two channels.
#[derive(Clone, Debug, PartialEq)]
pub struct StrokedGlyph {
    pub width: u32,
    pub height: u32,
    pub bearing_x: i32,
    pub bearing_y: i32,
    /// Two bytes per pixel: outline, then fill.
    pub pixels: Vec<u8>,
}

/// Stroke `fill` with a border of `radius` pixels around it.
///
/// The outline is the fill dilated by `radius` with a one pixel soft edge.
/// The fill sits inside the outline box offset by `ceil(radius)` on each
/// side, and the bearing is moved out by the same amount.
pub fn stroke_glyph(fill: &RasterGlyph, radius: f32) -> StrokedGlyph {
    if fill.width == 0 || fill.height == 0 {
        return StrokedGlyph {
            width: 0,
            height: 0,
            bearing_x: fill.bearing_x,
            bearing_y: fill.bearing_y,
            pixels: Vec::new(),
        };
    }

    let pad = radius.max(0.0).ceil() as i32;
    let width = fill.width + 2 * pad as u32;
    let height = fill.height + 2 * pad as u32;
    let mut pixels = vec![0u8; (width * height * 2) as usize];

    // Disk offsets with their edge weight.
    let mut kernel = Vec::new();
    for dy in -pad..=pad {
        for dx in -pad..=pad {
            let distance = ((dx * dx + dy * dy) as f32).sqrt();
            let weight = (radius + 0.5 - distance).clamp(0.0, 1.0);
            if weight > 0.0 {
                kernel.push((dx, dy, weight));
            }
        }
    }

    for y in 0..height as i32 {
        for x in 0..width as i32 {
            let (fx, fy) = (x - pad, y - pad);
            let outline = kernel
                .iter()
                .map(|&(dx, dy, weight)| fill.coverage_at(fx + dx, fy + dy) as f32 * weight)
                .fold(0.0f32, f32::max);
            let i = ((y as u32 * width + x as u32) * 2) as usize;
            pixels[i] = outline.round() as u8;
            pixels[i + 1] = fill.coverage_at(fx, fy);
        }
    }

    StrokedGlyph {
        width,
        height,
        bearing_x: fill.bearing_x - pad,
        bearing_y: fill.bearing_y + pad,
        pixels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_resort_draws_a_hollow_box() {
        let glyph = LastResortFace.rasterize('\u{4E2D}', 16.0).unwrap();
        assert_eq!((glyph.width, glyph.height), (8, 11));
        assert_eq!(glyph.coverage_at(0, 0), 255);
        assert_eq!(glyph.coverage_at(4, 5), 0);
        assert_eq!(glyph.coverage_at(7, 10), 255);
        assert_eq!(glyph.advance, (8 + 2) * 64);
        assert!(LastResortFace.is_total());
    }

    #[test]
    fn whitespace_has_advance_but_no_pixels() {
        let glyph = LastResortFace.rasterize(' ', 16.0).unwrap();
        assert_eq!(glyph.width, 0);
        assert_eq!(glyph.advance, 4 * 64);
    }

    #[test]
    fn stroke_surrounds_the_fill() {
        let fill = RasterGlyph {
            width: 1,
            height: 1,
            bearing_x: 2,
            bearing_y: 10,
            advance: 5 * 64,
            coverage: vec![255],
        };
        let stroked = stroke_glyph(&fill, 1.5);
        assert_eq!((stroked.width, stroked.height), (5, 5));
        assert_eq!((stroked.bearing_x, stroked.bearing_y), (0, 12));

        let texel = |x: u32, y: u32| {
            let i = ((y * stroked.width + x) * 2) as usize;
            (stroked.pixels[i], stroked.pixels[i + 1])
        };
        assert_eq!(texel(2, 2), (255, 255));
        // Direct neighbors at distance 1 are fully covered by the outline only.
        assert_eq!(texel(1, 2), (255, 0));
        // Diagonal neighbors lie on the soft edge.
        assert!(texel(1, 1).0 > 0 && texel(1, 1).0 < 255);
        assert_eq!(texel(0, 2), (0, 0));
        assert_eq!(texel(0, 0), (0, 0));
    }

    #[test]
    fn stroking_an_empty_glyph_keeps_it_empty() {
        let stroked = stroke_glyph(&RasterGlyph::empty(320), 1.5);
        assert_eq!(stroked.width, 0);
        assert!(stroked.pixels.is_empty());
    }

    #[test]
    fn invalid_font_bytes_fail_to_load() {
        let err = FontFace::from_bytes("broken.ttf", vec![0, 1, 2, 3]).err().unwrap();
        assert!(matches!(err, TextError::FontLoad { .. }));
        let err = FontFace::from_file("/definitely/not/here.ttf").err().unwrap();
        assert!(matches!(err, TextError::FontLoad { .. }));
    }
}
