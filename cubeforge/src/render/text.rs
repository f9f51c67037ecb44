use std::collections::HashMap;

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, Buffer, BufferBinding, BufferBindingType,
    BufferUsages, ColorTargetState, ColorWrites, FragmentState, MultisampleState,
    PipelineLayoutDescriptor, PrimitiveState, RenderPipeline, RenderPipelineDescriptor,
    SamplerBindingType, ShaderStages, TextureFormat, TextureSampleType, TextureViewDimension,
    VertexState,
};

use super::atlas::{AtlasId, GlyphAtlas, TextureAtlas};
use super::buffer::{align_to, GpuBuffer, VertexLayout};
use super::glyph::{stroke_glyph, FontFace, GlyphSource, LastResortFace};
use super::shaders;
use crate::config::RenderConfig;
use crate::error::{AtlasError, TextError};

/// Where a glyph lives in the atlas and how it sits on the baseline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlyphData {
    /// `None` for glyphs without pixels.
    pub atlas_id: Option<AtlasId>,
    pub width: u32,
    pub height: u32,
    pub bearing_x: i32,
    pub bearing_y: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CharacterData {
    pub glyph: GlyphData,
    /// Horizontal advance in 26.6 fixed point.
    pub advance: i32,
}

/// Lazily rasterized glyphs, cached forever, packed into an atlas.
pub struct GlyphCache<A: GlyphAtlas> {
    sources: Vec<Box<dyn GlyphSource>>,
    atlas: A,
    characters: HashMap<char, CharacterData>,
    pixel_height: f32,
    stroke_radius: f32,
}

impl<A: GlyphAtlas> GlyphCache<A> {
    /// `sources` are tried in order; the last one should be total.
    pub fn new(
        sources: Vec<Box<dyn GlyphSource>>,
        atlas: A,
        pixel_height: u32,
        stroke_radius: f32,
    ) -> Result<Self, TextError> {
        let Some(last) = sources.last() else {
            return Err(TextError::EmptyFallbackChain);
        };
        if !last.is_total() {
            log::warn!(
                "glyph chain ends with `{}`, which is not total; uncovered code points will fail",
                last.name()
            );
        }
        Ok(Self {
            sources,
            atlas,
            characters: HashMap::new(),
            pixel_height: pixel_height as f32,
            stroke_radius,
        })
    }

    pub fn atlas(&self) -> &A {
        &self.atlas
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Cached data for `ch`, without rendering it.
    pub fn character(&self, ch: char) -> Option<&CharacterData> {
        self.characters.get(&ch)
    }

    /// Render `ch` if it is not cached yet.
    pub fn prerender_character(&mut self, ch: char) -> Result<&CharacterData, TextError> {
        if !self.characters.contains_key(&ch) {
            let data = self.render_character(ch)?;
            self.characters.insert(ch, data);
        }
        self.characters.get(&ch).ok_or(TextError::NoGlyph(ch))
    }

    /// Render every printable ASCII character. Returns how many were added.
    pub fn prerender_ascii(&mut self) -> Result<usize, TextError> {
        let before = self.characters.len();
        for ch in '\u{20}'..='\u{7E}' {
            self.prerender_character(ch)?;
        }
        Ok(self.characters.len() - before)
    }

    fn render_character(&mut self, ch: char) -> Result<CharacterData, TextError> {
        let source = self
            .sources
            .iter()
            .find(|source| source.has_glyph(ch))
            .ok_or(TextError::NoGlyph(ch))?;
        let fill = source
            .rasterize(ch, self.pixel_height)
            .ok_or(TextError::NoGlyph(ch))?;
        let stroked = stroke_glyph(&fill, self.stroke_radius);

        let invisible = CharacterData {
            glyph: GlyphData {
                atlas_id: None,
                width: 0,
                height: 0,
                bearing_x: 0,
                bearing_y: 0,
            },
            advance: fill.advance,
        };
        if stroked.width == 0 || stroked.height == 0 {
            return Ok(invisible);
        }

        match self
            .atlas
            .add_texture(stroked.width, stroked.height, &stroked.pixels)
        {
            Ok(id) => Ok(CharacterData {
                glyph: GlyphData {
                    atlas_id: Some(id),
                    width: stroked.width,
                    height: stroked.height,
                    bearing_x: stroked.bearing_x,
                    bearing_y: stroked.bearing_y,
                },
                advance: fill.advance,
            }),
            Err(err @ AtlasError::Full { .. }) => {
                log::warn!("glyph U+{:04X} not cached: {err}", ch as u32);
                Ok(invisible)
            }
            Err(err) => {
                log::warn!("glyph U+{:04X} rejected by atlas: {err}", ch as u32);
                Ok(invisible)
            }
        }
    }
}

/// Corner of a glyph quad in pixel space.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

impl QuadVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    pub const LAYOUT: VertexLayout = VertexLayout {
        stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &Self::ATTRIBUTES,
    };
}

/// Lay `text` out left to right from the baseline at `(x, y)`.
///
/// Emits six vertices per visible glyph into batches of `batch_glyphs`
/// glyphs, handing each full batch (and the final partial one) to `flush`.
/// A newline returns the pen to `x` and moves it down by `line_height`.
/// Returns the number of glyph quads emitted.
pub fn layout_text<A, F>(
    cache: &mut GlyphCache<A>,
    text: &str,
    x: f32,
    y: f32,
    scale: f32,
    line_height: f32,
    batch_glyphs: usize,
    mut flush: F,
) -> Result<usize, TextError>
where
    A: GlyphAtlas,
    F: FnMut(&[QuadVertex]),
{
    let capacity = batch_glyphs.max(1) * 6;
    let mut batch = Vec::with_capacity(capacity);
    let (mut pen_x, mut pen_y) = (x, y);
    let mut emitted = 0;

    for ch in text.chars() {
        if ch == '\n' {
            pen_x = x;
            pen_y += line_height;
            continue;
        }

        let data = *cache.prerender_character(ch)?;
        let glyph = data.glyph;
        if let Some(uv) = glyph.atlas_id.and_then(|id| cache.atlas.uv_rect(id)) {
            let xpos = pen_x + glyph.bearing_x as f32 * scale;
            let ypos = pen_y - glyph.bearing_y as f32 * scale;
            let w = glyph.width as f32 * scale;
            let h = glyph.height as f32 * scale;

            batch.extend_from_slice(&[
                QuadVertex { position: [xpos, ypos], uv: [uv.l, uv.t] },
                QuadVertex { position: [xpos, ypos + h], uv: [uv.l, uv.b] },
                QuadVertex { position: [xpos + w, ypos + h], uv: [uv.r, uv.b] },
                QuadVertex { position: [xpos, ypos], uv: [uv.l, uv.t] },
                QuadVertex { position: [xpos + w, ypos + h], uv: [uv.r, uv.b] },
                QuadVertex { position: [xpos + w, ypos], uv: [uv.r, uv.t] },
            ]);
            emitted += 1;
            if batch.len() >= capacity {
                flush(&batch);
                batch.clear();
            }
        }

        pen_x += (data.advance >> 6) as f32 * scale;
    }

    if !batch.is_empty() {
        flush(&batch);
    }
    Ok(emitted)
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct TextUniforms {
    screen_size: [f32; 2],
    _pad: [f32; 2],
    color: [f32; 4],
}

/// Queued glyph batch, drawn in the overlay pass.
struct TextDraw {
    first_vertex: u32,
    vertex_count: u32,
    uniform_offset: u32,
}

/// Open `font_paths` in priority order and append the last-resort face.
pub fn fallback_chain(font_paths: &[String]) -> Result<Vec<Box<dyn GlyphSource>>, TextError> {
    let mut sources: Vec<Box<dyn GlyphSource>> = Vec::with_capacity(font_paths.len() + 1);
    for path in font_paths {
        sources.push(Box::new(FontFace::from_file(path)?));
    }
    sources.push(Box::new(LastResortFace));
    if font_paths.is_empty() {
        log::info!("no font configured, text renders as last-resort outline boxes");
    } else {
        log::info!("loaded {} font(s) plus the last-resort face", font_paths.len());
    }
    Ok(sources)
}

/// Outlined text drawn over the world with alpha blending.
pub struct TextRenderer {
    cache: GlyphCache<TextureAtlas>,
    pipeline: RenderPipeline,
    vertices: GpuBuffer<QuadVertex>,
    vertex_cursor: usize,
    uniforms: Buffer,
    bind_group: BindGroup,
    uniform_stride: u64,
    max_draws: usize,
    calls: usize,
    draws: Vec<TextDraw>,
    viewport: [f32; 2],
    batch_glyphs: usize,
    line_height: f32,
    overflowed: bool,
}

impl TextRenderer {
    /// Load the configured fonts, build the atlas and prerender ASCII.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: TextureFormat,
        config: &RenderConfig,
    ) -> Result<Self> {
        let sources = fallback_chain(&config.font_paths)?;

        let atlas = TextureAtlas::new(device, queue, config.glyph_atlas_size, config.glyph_atlas_size);
        let mut cache = GlyphCache::new(sources, atlas, config.font_height, config.stroke_radius)?;
        let prerendered = cache.prerender_ascii()?;
        log::info!(
            "prerendered {prerendered} ASCII glyphs into a {0}x{0} atlas",
            config.glyph_atlas_size
        );

        let shader = shaders::compile(device, shaders::TEXT)?;

        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("text-bind-group-layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::VERTEX_FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: std::num::NonZeroU64::new(
                            std::mem::size_of::<TextUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let uniform_alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let uniform_stride = align_to(std::mem::size_of::<TextUniforms>() as u64, uniform_alignment);
        let max_draws = config.text_draws_per_frame.max(1) as usize;
        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("text-uniform-buffer"),
            size: uniform_stride * max_draws as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("text-bind-group"),
            layout: &bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::Buffer(BufferBinding {
                        buffer: &uniforms,
                        offset: 0,
                        size: std::num::NonZeroU64::new(std::mem::size_of::<TextUniforms>() as u64),
                    }),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::TextureView(cache.atlas().view()),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: BindingResource::Sampler(cache.atlas().sampler()),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("text-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("text-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[QuadVertex::LAYOUT.buffer_layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: PrimitiveState::default(),
            depth_stencil: None,
            multisample: MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let batch_glyphs = config.text_batch_glyphs as usize;
        let vertex_capacity = batch_glyphs * 6 * config.text_batches_per_frame as usize;

        Ok(Self {
            cache,
            pipeline,
            vertices: GpuBuffer::with_capacity(device, "text-vertices", QuadVertex::LAYOUT, vertex_capacity),
            vertex_cursor: 0,
            uniforms,
            bind_group,
            uniform_stride,
            max_draws,
            calls: 0,
            draws: Vec::new(),
            viewport: [1.0, 1.0],
            batch_glyphs,
            line_height: config.line_height(),
            overflowed: false,
        })
    }

    pub fn glyphs(&self) -> &GlyphCache<TextureAtlas> {
        &self.cache
    }

    /// Set the pixel size of the surface text is laid out on.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = [width.max(1) as f32, height.max(1) as f32];
    }

    /// Forget last frame's queued text.
    pub fn begin_frame(&mut self) {
        self.vertices.clear();
        self.vertex_cursor = 0;
        self.calls = 0;
        self.draws.clear();
        self.overflowed = false;
    }

    /// Queue `text` with its first baseline at `(x, y)` in pixels.
    pub fn render_text(
        &mut self,
        queue: &wgpu::Queue,
        text: &str,
        x: f32,
        y: f32,
        scale: f32,
        color: [f32; 4],
    ) -> Result<()> {
        if self.calls == self.max_draws {
            if !self.overflowed {
                log::warn!("text call limit {} reached this frame, dropping text", self.max_draws);
                self.overflowed = true;
            }
            return Ok(());
        }

        let uniform_offset = self.calls as u64 * self.uniform_stride;
        let uniforms = TextUniforms {
            screen_size: self.viewport,
            _pad: [0.0; 2],
            color,
        };
        queue.write_buffer(&self.uniforms, uniform_offset, bytemuck::bytes_of(&uniforms));
        self.calls += 1;

        let Self {
            cache,
            vertices,
            vertex_cursor,
            draws,
            overflowed,
            batch_glyphs,
            line_height,
            ..
        } = self;
        let capacity = vertices.capacity();

        layout_text(cache, text, x, y, scale, *line_height, *batch_glyphs, |batch| {
            let room = capacity.saturating_sub(*vertex_cursor);
            let take = batch.len().min(room);
            if take < batch.len() && !*overflowed {
                log::warn!("text vertex buffer full ({capacity} vertices), dropping glyphs");
                *overflowed = true;
            }
            if take == 0 {
                return;
            }
            let first = *vertex_cursor;
            let written = vertices.update_range(queue, first, &batch[..take]);
            draws.push(TextDraw {
                first_vertex: first as u32,
                vertex_count: written as u32,
                uniform_offset: uniform_offset as u32,
            });
            *vertex_cursor += written;
        })?;
        Ok(())
    }

    /// Record every queued batch into `pass`.
    pub(crate) fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        if self.draws.is_empty() {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        if !self.vertices.bind(pass, 0) {
            return;
        }
        for draw in &self.draws {
            pass.set_bind_group(0, &self.bind_group, &[draw.uniform_offset]);
            pass.draw(draw.first_vertex..draw.first_vertex + draw.vertex_count, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::atlas::CpuAtlas;

    fn cache(atlas_size: u32) -> GlyphCache<CpuAtlas> {
        GlyphCache::new(
            vec![Box::new(LastResortFace) as Box<dyn GlyphSource>],
            CpuAtlas::new(atlas_size, atlas_size, 2),
            16,
            1.5,
        )
        .unwrap()
    }

    #[test]
    fn unconfigured_chain_is_the_last_resort_face() {
        let sources = fallback_chain(&[]).unwrap();
        assert_eq!(sources.len(), 1);
        assert!(sources[0].is_total());
        assert_eq!(sources[0].name(), "last-resort");
    }

    #[test]
    fn missing_font_file_is_a_load_error() {
        let err = fallback_chain(&["no/such/font.ttf".to_string()]).err().unwrap();
        assert!(matches!(err, TextError::FontLoad { .. }));
    }

    #[test]
    fn empty_chain_is_rejected() {
        let err = GlyphCache::new(Vec::new(), CpuAtlas::new(8, 8, 2), 16, 1.5).err().unwrap();
        assert!(matches!(err, TextError::EmptyFallbackChain));
    }

    #[test]
    fn ascii_fits_in_a_512_atlas() {
        let mut cache = cache(512);
        assert_eq!(cache.prerender_ascii().unwrap(), 95);
        assert!(cache.character('~').unwrap().glyph.atlas_id.is_some());
        // Space has an advance but nothing in the atlas.
        assert!(cache.character(' ').unwrap().glyph.atlas_id.is_none());
        assert_eq!(cache.atlas().packer().len(), 94);
    }

    #[test]
    fn second_request_is_a_cache_hit() {
        let mut cache = cache(512);
        let first = *cache.prerender_character('\u{20AC}').unwrap();
        let packed = cache.atlas().packer().len();
        let second = *cache.prerender_character('\u{20AC}').unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.atlas().packer().len(), packed);
    }

    #[test]
    fn non_ascii_is_rendered_lazily() {
        let mut cache = cache(512);
        cache.prerender_ascii().unwrap();
        assert!(cache.character('\u{E9}').is_none());
        layout_text(&mut cache, "caf\u{E9}", 0.0, 20.0, 1.0, 20.0, 64, |_| {}).unwrap();
        assert!(cache.character('\u{E9}').is_some());
    }

    #[test]
    fn exhausted_atlas_caches_invisible_glyphs() {
        // Each stroked box is 12x15; a 16x16 atlas holds one.
        let mut cache = cache(16);
        let a = *cache.prerender_character('a').unwrap();
        let b = *cache.prerender_character('b').unwrap();
        assert!(a.glyph.atlas_id.is_some());
        assert!(b.glyph.atlas_id.is_none());
        assert_eq!(b.advance, a.advance);
    }

    #[test]
    fn newline_starts_a_second_line() {
        let mut cache = cache(512);
        let mut vertices = Vec::new();
        let line_height = (16.0f32 * 1.25).round();
        let quads = layout_text(&mut cache, "AB\nC", 10.0, 50.0, 1.0, line_height, 64, |batch| {
            vertices.extend_from_slice(batch)
        })
        .unwrap();
        assert_eq!(quads, 3);
        assert_eq!(vertices.len(), 18);

        let a = *cache.character('A').unwrap();
        let top_left = |quad: usize| vertices[quad * 6].position;
        let first_top = 50.0 - a.glyph.bearing_y as f32;
        assert_eq!(top_left(0), [10.0 + a.glyph.bearing_x as f32, first_top]);
        assert_eq!(
            top_left(1),
            [10.0 + (a.advance >> 6) as f32 + a.glyph.bearing_x as f32, first_top]
        );
        assert_eq!(
            top_left(2),
            [10.0 + a.glyph.bearing_x as f32, first_top + line_height]
        );
        assert_eq!(line_height, 20.0);
    }

    #[test]
    fn batches_flush_when_full() {
        let mut cache = cache(512);
        let mut sizes = Vec::new();
        layout_text(&mut cache, "ABCDE", 0.0, 20.0, 1.0, 20.0, 2, |batch| sizes.push(batch.len())).unwrap();
        assert_eq!(sizes, vec![12, 12, 6]);
    }

    #[test]
    fn quad_uvs_match_the_atlas() {
        let mut cache = cache(512);
        let mut vertices = Vec::new();
        layout_text(&mut cache, "Q", 0.0, 20.0, 2.0, 20.0, 64, |batch| vertices.extend_from_slice(batch)).unwrap();
        let glyph = cache.character('Q').unwrap().glyph;
        let uv = cache.atlas().uv_rect(glyph.atlas_id.unwrap()).unwrap();
        assert_eq!(vertices[0].uv, [uv.l, uv.t]);
        assert_eq!(vertices[2].uv, [uv.r, uv.b]);
        let width = vertices[2].position[0] - vertices[0].position[0];
        assert_eq!(width, glyph.width as f32 * 2.0);
    }
}
