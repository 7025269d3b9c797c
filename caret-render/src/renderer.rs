//! High-level glyph renderer: ties the GPU context, glyph pipeline,
//! atlas, and caches together into per-frame `prepare()` + one-draw
//! render calls.
//!
//! Single-threaded cooperative model: rasterization, atlas mutation,
//! and buffer uploads all run synchronously on the frame-producing
//! thread before the draw is submitted. The queue preserves submission
//! order, so correct call ordering is the only synchronization needed.
//! A dirty flag gates whole-frame rebuilds; edit/scroll/cursor paths
//! call [`GlyphRenderer::mark_dirty`].

use thiserror::Error;
use wgpu::{
    Color, CommandEncoderDescriptor, LoadOp, Operations, RenderPassColorAttachment,
    RenderPassDescriptor, StoreOp, TextureViewDescriptor,
};

use caret_text::atlas::GlyphAtlas;
use caret_text::measure::{detect_char_width, WidthCache};
use caret_text::raster::{Rasterizer, SwashRasterizer};
use caret_text::style::GlyphStyle;

use crate::context::GpuContext;
use crate::pipelines::glyphs::GlyphPipeline;
use crate::vertex::{GlyphCell, ViewportUniform};
use crate::viewport::{collect_cells, CellStats, FrameLayout, TokenId, VisibleLine};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("no surface configured (headless mode)")]
    NoSurface,
}

/// Frame statistics returned after each render.
#[derive(Clone, Copy, Debug)]
pub struct FrameStats {
    /// Number of glyph instances drawn.
    pub glyph_count: u32,
    /// Number of draw calls (0 or 1).
    pub draw_calls: u32,
    /// True when the frame's glyph set was truncated at capacity.
    pub truncated: bool,
}

/// Renderer configuration, fixed at construction.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Font family for all glyphs.
    pub family: String,
    /// Font size in pixels.
    pub font_size: f32,
    /// Line height in pixels.
    pub line_height: f32,
    /// Color for text outside any token span.
    pub base_color: [u8; 4],
    /// Tab stop width in columns.
    pub tab_stop: u32,
    /// Atlas page edge length in pixels.
    pub page_size: u32,
    /// Maximum atlas pages before new glyphs are dropped.
    pub max_pages: u32,
    /// Glyph instances per frame; excess glyphs are not drawn.
    pub cell_capacity: usize,
    /// Distinct cached glyphs addressable by the metadata buffer.
    pub max_glyphs: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            family: "monospace".into(),
            font_size: 16.0,
            line_height: 20.0,
            base_color: [220, 220, 220, 255],
            tab_stop: 4,
            page_size: 2048,
            max_pages: 8,
            cell_capacity: 65_536,
            max_glyphs: 16_384,
        }
    }
}

/// GPU glyph renderer for an editor viewport.
///
/// # Usage
///
/// ```ignore
/// let gpu = GpuContext::new_with_surface(window, w, h).await?;
/// let mut renderer = GlyphRenderer::with_system_fonts(&gpu, RendererConfig::default());
/// renderer.resize(w, h);
/// // each frame callback:
/// if let Some(stats) = renderer.render_if_needed(&gpu, &lines, scroll_y, &palette)? {
///     log::debug!("drew {} glyphs", stats.glyph_count);
/// }
/// ```
pub struct GlyphRenderer {
    pipeline: GlyphPipeline,
    atlas: GlyphAtlas,
    raster: Box<dyn Rasterizer>,
    widths: WidthCache,

    base_style: GlyphStyle,
    line_height: f32,
    char_width: Option<f32>,
    tab_stop: u32,
    cell_capacity: usize,

    /// Pre-allocated instance staging array, reused every frame.
    cells: Vec<GlyphCell>,
    viewport_size: (u32, u32),
    clear_color: Color,
    quad_uploaded: bool,
    dirty: bool,
    uploaded_glyphs: usize,
    last_stats: CellStats,
}

impl GlyphRenderer {
    /// Create a renderer with an explicit rasterizer backend.
    ///
    /// Monospace detection runs here, once — not per frame.
    pub fn new(gpu: &GpuContext, mut raster: Box<dyn Rasterizer>, config: RendererConfig) -> Self {
        let base_style = GlyphStyle::new(&config.family, config.font_size)
            .with_color(config.base_color);
        let char_width = detect_char_width(raster.as_mut(), &base_style);

        let pipeline = GlyphPipeline::new(
            &gpu.device,
            gpu.surface_format,
            config.page_size,
            config.cell_capacity,
            config.max_glyphs,
        );

        Self {
            pipeline,
            atlas: GlyphAtlas::new(config.page_size, config.max_pages),
            raster,
            widths: WidthCache::new(),
            base_style,
            line_height: config.line_height,
            char_width,
            tab_stop: config.tab_stop,
            cell_capacity: config.cell_capacity,
            cells: Vec::with_capacity(config.cell_capacity),
            viewport_size: gpu.surface_size(),
            clear_color: Color {
                r: 0.12,
                g: 0.12,
                b: 0.13,
                a: 1.0,
            },
            quad_uploaded: false,
            dirty: true,
            uploaded_glyphs: 0,
            last_stats: CellStats::default(),
        }
    }

    /// Create a renderer backed by system fonts via cosmic-text.
    pub fn with_system_fonts(gpu: &GpuContext, config: RendererConfig) -> Self {
        Self::new(gpu, Box::new(SwashRasterizer::new()), config)
    }

    /// Set the background clear color.
    pub fn set_clear_color(&mut self, r: f64, g: f64, b: f64, a: f64) {
        self.clear_color = Color { r, g, b, a };
        self.dirty = true;
    }

    /// Update the canvas dimensions (window resize, or the off-screen
    /// target size in headless mode).
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport_size = (width, height);
        self.dirty = true;
    }

    /// Line height in pixels, for cursor/selection overlay alignment.
    pub fn line_height(&self) -> f32 {
        self.line_height
    }

    /// Shared character width when the active font is monospace.
    /// `None` means proportional: columns require measurement.
    pub fn char_width(&self) -> Option<f32> {
        self.char_width
    }

    /// Cached pixel width of a line, if measured since last invalidation.
    pub fn line_width(&self, line: usize) -> Option<f32> {
        self.widths.line_width(line)
    }

    /// Drop cached layout state for one edited line and request a frame.
    pub fn invalidate_line(&mut self, line: usize) {
        self.widths.invalidate_line(line);
        self.dirty = true;
    }

    /// Drop cached widths for `line` and all following lines (insert or
    /// delete shifted the tail) and request a frame.
    pub fn invalidate_from(&mut self, line: usize) {
        self.widths.invalidate_from(line);
        self.dirty = true;
    }

    /// Request a rebuild on the next frame callback. Called from edit,
    /// scroll, and cursor paths.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rebuild the frame's cells and perform all per-frame uploads.
    ///
    /// Exactly one transfer per buffer: cells, viewport uniform, and —
    /// only when the atlas grew — glyph metadata and dirty pages.
    pub fn prepare(
        &mut self,
        gpu: &GpuContext,
        lines: &[VisibleLine<'_>],
        scroll_y: f32,
        palette: &dyn Fn(TokenId) -> [u8; 4],
    ) -> CellStats {
        if !self.quad_uploaded {
            self.pipeline.upload_quad(&gpu.queue);
            self.quad_uploaded = true;
        }

        let layout = FrameLayout {
            line_height: self.line_height,
            char_width: self.char_width,
            tab_stop: self.tab_stop,
            viewport_height: self.viewport_size.1 as f32,
        };
        let stats = collect_cells(
            lines,
            scroll_y,
            &layout,
            &self.base_style,
            palette,
            &mut self.atlas,
            self.raster.as_mut(),
            &mut self.widths,
            &mut self.cells,
            self.cell_capacity,
        );

        // New atlas page: grow the layered texture, then re-upload all
        // pages (the old layers were discarded with the old texture).
        if self.pipeline.ensure_layer_capacity(&gpu.device, self.atlas.page_count()) {
            self.atlas.mark_all_dirty();
        }
        for (layer, page) in self.atlas.pages().iter().enumerate() {
            if page.dirty {
                self.pipeline.upload_page(&gpu.queue, layer as u32, &page.data);
            }
        }
        self.atlas.mark_uploaded();

        // Append-only metadata: re-upload only when a glyph was cached.
        if self.atlas.glyph_count() != self.uploaded_glyphs {
            self.pipeline.upload_glyph_info(&gpu.queue, self.atlas.glyph_info());
            self.uploaded_glyphs = self.atlas.glyph_count();
        }

        self.pipeline.upload_cells(&gpu.queue, &self.cells);
        self.pipeline.upload_viewport(
            &gpu.queue,
            &ViewportUniform::new(self.viewport_size.0 as f32, self.viewport_size.1 as f32),
        );

        self.last_stats = stats;
        stats
    }

    /// Prepare and render to the window surface, gated by the dirty
    /// flag. Returns `None` when nothing changed since the last frame.
    pub fn render_if_needed(
        &mut self,
        gpu: &GpuContext,
        lines: &[VisibleLine<'_>],
        scroll_y: f32,
        palette: &dyn Fn(TokenId) -> [u8; 4],
    ) -> Result<Option<FrameStats>, RenderError> {
        if !self.dirty {
            return Ok(None);
        }
        self.render(gpu, lines, scroll_y, palette).map(Some)
    }

    /// Prepare and render to the window surface unconditionally.
    pub fn render(
        &mut self,
        gpu: &GpuContext,
        lines: &[VisibleLine<'_>],
        scroll_y: f32,
        palette: &dyn Fn(TokenId) -> [u8; 4],
    ) -> Result<FrameStats, RenderError> {
        self.prepare(gpu, lines, scroll_y, palette);
        let stats = self.render_to_surface(gpu)?;
        self.dirty = false;
        Ok(stats)
    }

    /// Submit one render pass to the window surface.
    pub fn render_to_surface(&self, gpu: &GpuContext) -> Result<FrameStats, RenderError> {
        let surface = gpu.surface.as_ref().ok_or(RenderError::NoSurface)?;
        let output = surface.get_current_texture()?;
        let view = output.texture.create_view(&TextureViewDescriptor::default());

        let mut encoder = gpu.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("caret_frame_encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("caret_glyph_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(self.clear_color),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.pipeline.draw(&mut pass);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(self.frame_stats())
    }

    /// Submit one render pass to an off-screen texture (headless mode).
    pub fn render_to_texture(&self, gpu: &GpuContext, target_view: &wgpu::TextureView) -> FrameStats {
        let mut encoder = gpu.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("caret_offscreen_encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("caret_offscreen_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: target_view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(self.clear_color),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.pipeline.draw(&mut pass);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));

        self.frame_stats()
    }

    /// Number of distinct glyphs cached so far.
    pub fn cached_glyph_count(&self) -> usize {
        self.atlas.glyph_count()
    }

    /// Access the glyph pipeline (for advanced usage).
    pub fn pipeline(&self) -> &GlyphPipeline {
        &self.pipeline
    }

    fn frame_stats(&self) -> FrameStats {
        let count = self.pipeline.cell_count();
        FrameStats {
            glyph_count: count,
            draw_calls: if count > 0 { 1 } else { 0 },
            truncated: self.last_stats.truncated,
        }
    }
}

// ===================================================================
// Tests
// ===================================================================
