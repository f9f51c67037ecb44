use anyhow::{anyhow, bail, Result};
use wgpu::{
    AddressMode, Extent3d, FilterMode, Origin3d, Sampler, SamplerDescriptor,
    TexelCopyBufferLayout, TexelCopyTextureInfo, TextureAspect, TextureDescriptor,
    TextureDimension, TextureFormat, TextureUsages, TextureView, TextureViewDescriptor,
    TextureViewDimension,
};

use crate::world::BLOCK_TEXTURE_LAYERS;

/// Square RGBA layers of a block texture array, before upload.
#[derive(Debug, Clone)]
pub struct BlockTextureLayers {
    size: u32,
    layers: Vec<Vec<u8>>,
}

impl BlockTextureLayers {
    /// Wrap raw RGBA8 layers. Every layer must be `size * size * 4` bytes.
    pub fn from_rgba(size: u32, layers: Vec<Vec<u8>>) -> Result<Self> {
        if size == 0 || layers.is_empty() {
            bail!("block textures need at least one non-empty layer");
        }
        let expected = (size * size * 4) as usize;
        if let Some((index, layer)) = layers.iter().enumerate().find(|(_, l)| l.len() != expected) {
            bail!(
                "block texture layer {index} holds {} bytes, expected {expected}",
                layer.len()
            );
        }
        Ok(Self { size, layers })
    }

    /// Decode one PNG per layer. All images must share the same square size.
    pub fn from_png(images: &[&[u8]]) -> Result<Self> {
        let mut size = None;
        let mut layers = Vec::with_capacity(images.len());
        for (index, bytes) in images.iter().enumerate() {
            let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
                .map_err(|e| anyhow!("block texture layer {index}: {e}"))?
                .to_rgba8();
            let (w, h) = image.dimensions();
            if w != h {
                bail!("block texture layer {index} is {w}x{h}, layers must be square");
            }
            match size {
                None => size = Some(w),
                Some(s) if s != w => bail!("block texture layer {index} is {w}px, expected {s}px"),
                Some(_) => {}
            }
            layers.push(image.into_raw());
        }
        Self::from_rgba(size.unwrap_or(0), layers)
    }

    /// Flat-shaded, noise-speckled placeholder set covering every block layer.
    pub fn procedural(size: u32) -> Self {
        const BASE: [[u8; 3]; BLOCK_TEXTURE_LAYERS as usize] = [
            [125, 125, 125], // stone
            [134, 96, 67],   // dirt
            [95, 159, 53],   // grass top
            [120, 110, 60],  // grass side
            [219, 207, 163], // sand
            [162, 130, 78],  // planks
            [152, 118, 70],  // log top
            [102, 81, 50],   // log side
            [60, 120, 40],   // leaves
            [200, 230, 240], // glass
        ];

        let layers = BASE
            .iter()
            .enumerate()
            .map(|(layer, base)| {
                let mut pixels = Vec::with_capacity((size * size * 4) as usize);
                for y in 0..size {
                    for x in 0..size {
                        let noise = speckle(x, y, layer as u32);
                        let shade = |c: u8| (c as i32 + noise).clamp(0, 255) as u8;
                        let mut rgb = [shade(base[0]), shade(base[1]), shade(base[2])];
                        // Grass side gets a green band along the top edge.
                        if layer == 3 && y < size / 4 {
                            rgb = [shade(95), shade(159), shade(53)];
                        }
                        pixels.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
                    }
                }
                pixels
            })
            .collect();

        Self { size, layers }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn layer_count(&self) -> u32 {
        self.layers.len() as u32
    }
}

fn speckle(x: u32, y: u32, layer: u32) -> i32 {
    let mut h = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA77) ^ layer.wrapping_mul(0xC2B2_AE3D);
    h ^= h >> 15;
    h = h.wrapping_mul(0x2C1B_3C6D);
    h ^= h >> 12;
    (h % 25) as i32 - 12
}

/// Block textures uploaded as a 2D texture array.
pub struct BlockTextures {
    view: TextureView,
    sampler: Sampler,
    layers: u32,
}

impl BlockTextures {
    pub fn upload(device: &wgpu::Device, queue: &wgpu::Queue, source: &BlockTextureLayers) -> Result<Self> {
        let layers = source.layer_count();
        if layers < BLOCK_TEXTURE_LAYERS {
            bail!("block texture array has {layers} layers, blocks reference {BLOCK_TEXTURE_LAYERS}");
        }

        let size = Extent3d {
            width: source.size,
            height: source.size,
            depth_or_array_layers: layers,
        };
        let texture = device.create_texture(&TextureDescriptor {
            label: Some("block-textures"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8UnormSrgb,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (layer, pixels) in source.layers.iter().enumerate() {
            queue.write_texture(
                TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: Origin3d {
                        x: 0,
                        y: 0,
                        z: layer as u32,
                    },
                    aspect: TextureAspect::All,
                },
                pixels,
                TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * source.size),
                    rows_per_image: Some(source.size),
                },
                Extent3d {
                    width: source.size,
                    height: source.size,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&TextureViewDescriptor {
            label: Some("block-textures-view"),
            dimension: Some(TextureViewDimension::D2Array),
            ..Default::default()
        });
        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("block-sampler"),
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        log::info!("uploaded {layers} block texture layers at {}px", source.size);
        Ok(Self { view, sampler, layers })
    }

    pub fn view(&self) -> &TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn layers(&self) -> u32 {
        self.layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procedural_set_covers_every_block_layer() {
        let layers = BlockTextureLayers::procedural(16);
        assert_eq!(layers.layer_count(), BLOCK_TEXTURE_LAYERS);
        assert!(layers.layers.iter().all(|l| l.len() == 16 * 16 * 4));
        assert!(layers.layers.iter().all(|l| l.chunks(4).all(|px| px[3] == 255)));
    }

    #[test]
    fn rejects_mismatched_layer_sizes() {
        let err = BlockTextureLayers::from_rgba(2, vec![vec![0; 16], vec![0; 12]]).unwrap_err();
        assert!(err.to_string().contains("layer 1"));
    }

    #[test]
    fn decodes_png_layers() {
        let mut png = Vec::new();
        let image = image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255]));
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageOutputFormat::Png)
            .unwrap();

        let layers = BlockTextureLayers::from_png(&[&png, &png]).unwrap();
        assert_eq!(layers.size(), 4);
        assert_eq!(layers.layer_count(), 2);
        assert_eq!(&layers.layers[1][..4], &[10, 20, 30, 255]);
    }
}
