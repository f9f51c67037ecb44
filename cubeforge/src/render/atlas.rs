//! Shelf-packed texture atlases.
//!
//! [`ShelfPacker`] owns placement only, so packing can be exercised
//! without a device. [`CpuAtlas`] adds a pixel store on top of it and
//! [`TextureAtlas`] mirrors every packed image into a GPU texture.

use wgpu::{
    Extent3d, FilterMode, Origin3d, Sampler, SamplerDescriptor, TexelCopyBufferLayout,
    TexelCopyTextureInfo, Texture, TextureAspect, TextureDescriptor, TextureDimension,
    TextureFormat, TextureUsages, TextureView, TextureViewDescriptor,
};

use crate::error::AtlasError;

/// Pixels left empty between neighbors so filtering never bleeds.
const PADDING: u32 = 1;

/// Stable identifier of an image packed into an atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtlasId(u32);

impl AtlasId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Normalized texture coordinates of a packed image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvRect {
    pub l: f32,
    pub r: f32,
    pub t: f32,
    pub b: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Anything glyphs can be packed into.
pub trait GlyphAtlas {
    /// Pack a `width x height` image and return its id. `pixels` is
    /// row-major with the atlas's channel count per pixel.
    fn add_texture(&mut self, width: u32, height: u32, pixels: &[u8]) -> Result<AtlasId, AtlasError>;

    fn uv_rect(&self, id: AtlasId) -> Option<UvRect>;
}

/// Left-to-right shelf packer over a fixed-size area.
#[derive(Debug, Clone)]
pub struct ShelfPacker {
    width: u32,
    height: u32,
    cursor_x: u32,
    cursor_y: u32,
    row_height: u32,
    rects: Vec<PackedRect>,
}

impl ShelfPacker {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cursor_x: 0,
            cursor_y: 0,
            row_height: 0,
            rects: Vec::new(),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Reserve a rectangle. On failure the packer is left untouched.
    pub fn pack(&mut self, width: u32, height: u32) -> Result<AtlasId, AtlasError> {
        let full = AtlasError::Full {
            width,
            height,
            atlas_width: self.width,
            atlas_height: self.height,
        };

        if width == 0 || height == 0 {
            return Ok(self.push(PackedRect {
                x: 0,
                y: 0,
                width: 0,
                height: 0,
            }));
        }
        if width > self.width || height > self.height {
            return Err(full);
        }

        let (mut x, mut y, mut row_height) = (self.cursor_x, self.cursor_y, self.row_height);
        if x + width > self.width {
            x = 0;
            y += row_height + PADDING;
            row_height = 0;
        }
        if y + height > self.height {
            return Err(full);
        }

        self.cursor_x = x + width + PADDING;
        self.cursor_y = y;
        self.row_height = row_height.max(height);
        Ok(self.push(PackedRect { x, y, width, height }))
    }

    pub fn rect(&self, id: AtlasId) -> Option<PackedRect> {
        self.rects.get(id.index()).copied()
    }

    pub fn uv_rect(&self, id: AtlasId) -> Option<UvRect> {
        let rect = self.rect(id)?;
        let (w, h) = (self.width as f32, self.height as f32);
        Some(UvRect {
            l: rect.x as f32 / w,
            r: (rect.x + rect.width) as f32 / w,
            t: rect.y as f32 / h,
            b: (rect.y + rect.height) as f32 / h,
        })
    }

    pub fn l(&self, id: AtlasId) -> Option<f32> {
        self.uv_rect(id).map(|uv| uv.l)
    }

    pub fn r(&self, id: AtlasId) -> Option<f32> {
        self.uv_rect(id).map(|uv| uv.r)
    }

    pub fn t(&self, id: AtlasId) -> Option<f32> {
        self.uv_rect(id).map(|uv| uv.t)
    }

    pub fn b(&self, id: AtlasId) -> Option<f32> {
        self.uv_rect(id).map(|uv| uv.b)
    }

    fn push(&mut self, rect: PackedRect) -> AtlasId {
        let id = AtlasId(self.rects.len() as u32);
        self.rects.push(rect);
        id
    }
}

fn check_pixels(width: u32, height: u32, channels: u32, pixels: &[u8]) -> Result<(), AtlasError> {
    let expected = (width * height * channels) as usize;
    if pixels.len() != expected {
        return Err(AtlasError::PixelBufferSize {
            expected,
            actual: pixels.len(),
        });
    }
    Ok(())
}

/// Atlas kept entirely in memory.
#[derive(Debug, Clone)]
pub struct CpuAtlas {
    packer: ShelfPacker,
    channels: u32,
    pixels: Vec<u8>,
}

impl CpuAtlas {
    pub fn new(width: u32, height: u32, channels: u32) -> Self {
        Self {
            packer: ShelfPacker::new(width, height),
            channels,
            pixels: vec![0; (width * height * channels) as usize],
        }
    }

    pub fn packer(&self) -> &ShelfPacker {
        &self.packer
    }

    /// Channel values of one atlas texel.
    pub fn texel(&self, x: u32, y: u32) -> &[u8] {
        let start = ((y * self.packer.width + x) * self.channels) as usize;
        &self.pixels[start..start + self.channels as usize]
    }
}

impl GlyphAtlas for CpuAtlas {
    fn add_texture(&mut self, width: u32, height: u32, pixels: &[u8]) -> Result<AtlasId, AtlasError> {
        check_pixels(width, height, self.channels, pixels)?;
        let id = self.packer.pack(width, height)?;
        if let Some(rect) = self.packer.rect(id) {
            let row_bytes = (rect.width * self.channels) as usize;
            for row in 0..rect.height {
                let src = row as usize * row_bytes;
                let dst = (((rect.y + row) * self.packer.width + rect.x) * self.channels) as usize;
                self.pixels[dst..dst + row_bytes].copy_from_slice(&pixels[src..src + row_bytes]);
            }
        }
        Ok(id)
    }

    fn uv_rect(&self, id: AtlasId) -> Option<UvRect> {
        self.packer.uv_rect(id)
    }
}

/// Two-channel atlas texture on the GPU.
pub struct TextureAtlas {
    packer: ShelfPacker,
    queue: wgpu::Queue,
    texture: Texture,
    view: TextureView,
    sampler: Sampler,
}

impl TextureAtlas {
    const FORMAT: TextureFormat = TextureFormat::Rg8Unorm;
    const CHANNELS: u32 = 2;

    /// Allocate a blank `width x height` atlas texture.
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&TextureDescriptor {
            label: Some("glyph-atlas"),
            size: Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: Self::FORMAT,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&TextureViewDescriptor::default());
        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("glyph-atlas-sampler"),
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        Self {
            packer: ShelfPacker::new(width, height),
            queue: queue.clone(),
            texture,
            view,
            sampler,
        }
    }

    pub fn view(&self) -> &TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn packer(&self) -> &ShelfPacker {
        &self.packer
    }
}

impl GlyphAtlas for TextureAtlas {
    fn add_texture(&mut self, width: u32, height: u32, pixels: &[u8]) -> Result<AtlasId, AtlasError> {
        check_pixels(width, height, Self::CHANNELS, pixels)?;
        let id = self.packer.pack(width, height)?;
        let Some(rect) = self.packer.rect(id) else {
            return Ok(id);
        };
        if rect.width == 0 || rect.height == 0 {
            return Ok(id);
        }

        self.queue.write_texture(
            TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: Origin3d {
                    x: rect.x,
                    y: rect.y,
                    z: 0,
                },
                aspect: TextureAspect::All,
            },
            pixels,
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(Self::CHANNELS * rect.width),
                rows_per_image: Some(rect.height),
            },
            Extent3d {
                width: rect.width,
                height: rect.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(id)
    }

    fn uv_rect(&self, id: AtlasId) -> Option<UvRect> {
        self.packer.uv_rect(id)
    }
}
