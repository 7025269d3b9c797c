//! Glyph render pipeline — instanced rendering of atlas-textured quads.
//!
//! One shared unit quad is instanced once per visible glyph cell; the
//! shader reads per-glyph metrics from a flat storage array and samples
//! a layered atlas texture (one layer per atlas page), so a frame is
//! always exactly one draw call.
//!
//! Everything here is created once. Per-frame work is limited to
//! `upload_*` queue writes; the only recreation path is growing the
//! layered atlas texture when a new page appears.

use wgpu::{
    AddressMode, BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout,
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResource, BindingType,
    BlendState, Buffer, BufferBindingType, BufferDescriptor, BufferUsages,
    ColorTargetState, ColorWrites, Device, Extent3d, FilterMode, FragmentState,
    FrontFace, IndexFormat, MultisampleState, PipelineCompilationOptions,
    PipelineLayoutDescriptor, PolygonMode, PrimitiveState, PrimitiveTopology, Queue,
    RenderPass, RenderPipeline, RenderPipelineDescriptor, SamplerBindingType,
    SamplerDescriptor, ShaderModuleDescriptor, ShaderStages, Texture,
    TextureDescriptor, TextureDimension, TextureFormat, TextureSampleType,
    TextureUsages, TextureViewDimension, VertexState,
};

use caret_text::atlas::GLYPH_INFO_STRIDE;

use crate::vertex::{GlyphCell, QuadVertex, ViewportUniform};

/// Owns the wgpu pipeline, buffers, atlas texture, and bind groups for
/// glyph rendering.
pub struct GlyphPipeline {
    pipeline: RenderPipeline,

    // Geometry (shared unit quad).
    vertex_buffer: Buffer,
    index_buffer: Buffer,

    // Instancing.
    cell_buffer: Buffer,
    cell_count: u32,
    cell_capacity: usize,

    // Per-frame uniform + glyph metadata.
    viewport_buffer: Buffer,
    glyph_info_buffer: Buffer,
    frame_bind_group: BindGroup,
    max_glyphs: usize,

    // Layered atlas texture (one layer per atlas page).
    atlas_texture: Texture,
    atlas_bind_group: BindGroup,
    atlas_bgl: BindGroupLayout,
    atlas_layers: u32,
    page_size: u32,
}

impl GlyphPipeline {
    /// Create the pipeline and allocate all GPU buffers.
    ///
    /// `page_size` is the atlas page edge length; `cell_capacity` caps
    /// glyph instances per frame; `max_glyphs` caps distinct cached
    /// glyphs addressable by the metadata array.
    pub fn new(
        device: &Device,
        surface_format: TextureFormat,
        page_size: u32,
        cell_capacity: usize,
        max_glyphs: usize,
    ) -> Self {
        // ── Shader ──────────────────────────────────────────────
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("glyph_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/glyphs.wgsl").into()),
        });

        // ── Frame bind group layout (group 0) ───────────────────
        let frame_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("glyph_frame_bgl"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::VERTEX,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::VERTEX,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        // ── Atlas bind group layout (group 1) ───────────────────
        // The vertex stage reads textureDimensions for UV scaling, so
        // the texture is visible to both stages.
        let atlas_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("glyph_atlas_bgl"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2Array,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        // ── Pipeline layout ─────────────────────────────────────
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("glyph_pipeline_layout"),
            bind_group_layouts: &[&frame_bgl, &atlas_bgl],
            push_constant_ranges: &[],
        });

        // ── Render pipeline ─────────────────────────────────────
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("glyph_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: PipelineCompilationOptions::default(),
                buffers: &[QuadVertex::layout(), GlyphCell::layout()],
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: PipelineCompilationOptions::default(),
                targets: &[Some(ColorTargetState {
                    format: surface_format,
                    blend: Some(BlendState::ALPHA_BLENDING),
                    write_mask: ColorWrites::ALL,
                })],
            }),
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        // ── Vertex buffer (unit quad) ───────────────────────────
        let vertex_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("glyph_quad_vb"),
            size: std::mem::size_of::<[QuadVertex; 4]>() as u64,
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // ── Index buffer ────────────────────────────────────────
        let index_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("glyph_quad_ib"),
            size: std::mem::size_of::<[u16; 6]>() as u64,
            usage: BufferUsages::INDEX | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // ── Cell instance buffer ────────────────────────────────
        let cell_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("glyph_cells"),
            size: (cell_capacity * std::mem::size_of::<GlyphCell>()) as u64,
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // ── Viewport uniform buffer ─────────────────────────────
        let viewport_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("glyph_viewport_ub"),
            size: std::mem::size_of::<ViewportUniform>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // ── Glyph info storage buffer ───────────────────────────
        let glyph_info_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("glyph_info"),
            size: (max_glyphs * GLYPH_INFO_STRIDE * std::mem::size_of::<f32>()) as u64,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("glyph_frame_bg"),
            layout: &frame_bgl,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: viewport_buffer.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: glyph_info_buffer.as_entire_binding(),
                },
            ],
        });

        // ── Atlas texture (one layer, grown on page creation) ───
        let atlas_layers = 1;
        let atlas_texture = Self::create_atlas_texture(device, page_size, atlas_layers);
        let atlas_bind_group =
            Self::create_atlas_bind_group(device, &atlas_bgl, &atlas_texture);

        Self {
            pipeline,
            vertex_buffer,
            index_buffer,
            cell_buffer,
            cell_count: 0,
            cell_capacity,
            viewport_buffer,
            glyph_info_buffer,
            frame_bind_group,
            max_glyphs,
            atlas_texture,
            atlas_bind_group,
            atlas_bgl,
            atlas_layers,
            page_size,
        }
    }

    fn create_atlas_texture(device: &Device, page_size: u32, layers: u32) -> Texture {
        device.create_texture(&TextureDescriptor {
            label: Some("glyph_atlas"),
            size: Extent3d {
                width: page_size,
                height: page_size,
                depth_or_array_layers: layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8UnormSrgb,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        })
    }

    fn create_atlas_bind_group(
        device: &Device,
        layout: &BindGroupLayout,
        texture: &Texture,
    ) -> BindGroup {
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(TextureViewDimension::D2Array),
            ..Default::default()
        });
        // Nearest filtering: glyphs are rendered 1:1 at the size they
        // were rasterized, and the packer leaves no bleed margin.
        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("glyph_atlas_sampler"),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            ..Default::default()
        });

        device.create_bind_group(&BindGroupDescriptor {
            label: Some("glyph_atlas_bg"),
            layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(&view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(&sampler),
                },
            ],
        })
    }

    // ───────────────────── Upload ─────────────────────────────────

    /// Upload the static quad geometry. Call once after creation.
    pub fn upload_quad(&self, queue: &Queue) {
        queue.write_buffer(
            &self.vertex_buffer,
            0,
            bytemuck::cast_slice(&QuadVertex::VERTICES),
        );
        queue.write_buffer(
            &self.index_buffer,
            0,
            bytemuck::cast_slice(&QuadVertex::INDICES),
        );
    }

    /// Upload glyph cell instances for this frame in one transfer.
    /// Clamps at the pre-allocated capacity.
    pub fn upload_cells(&mut self, queue: &Queue, cells: &[GlyphCell]) -> u32 {
        let count = cells.len().min(self.cell_capacity);
        if count == 0 {
            self.cell_count = 0;
            return 0;
        }

        queue.write_buffer(&self.cell_buffer, 0, bytemuck::cast_slice(&cells[..count]));
        self.cell_count = count as u32;
        self.cell_count
    }

    /// Upload the viewport uniform for this frame.
    pub fn upload_viewport(&self, queue: &Queue, viewport: &ViewportUniform) {
        queue.write_buffer(&self.viewport_buffer, 0, bytemuck::bytes_of(viewport));
    }

    /// Re-upload the flat glyph metadata array. Call whenever a new
    /// glyph was cached; re-uploading the whole array is correct and
    /// keeps the transfer logic trivial.
    pub fn upload_glyph_info(&self, queue: &Queue, info: &[f32]) {
        let max_floats = self.max_glyphs * GLYPH_INFO_STRIDE;
        let len = info.len().min(max_floats);
        if info.len() > max_floats {
            log::warn!(
                "glyph info overflow: {} cached glyphs exceed the {}-entry metadata buffer",
                info.len() / GLYPH_INFO_STRIDE,
                self.max_glyphs
            );
        }
        if len == 0 {
            return;
        }
        queue.write_buffer(
            &self.glyph_info_buffer,
            0,
            bytemuck::cast_slice(&info[..len]),
        );
    }

    /// Grow the layered atlas texture to hold `layers` pages.
    ///
    /// Triggered by atlas page creation, never per frame. Returns true
    /// if the texture was recreated — the caller must then re-upload
    /// every page into its layer.
    pub fn ensure_layer_capacity(&mut self, device: &Device, layers: u32) -> bool {
        if layers <= self.atlas_layers {
            return false;
        }
        log::info!(
            "growing glyph atlas texture: {} -> {} layers",
            self.atlas_layers,
            layers
        );
        self.atlas_layers = layers;
        self.atlas_texture = Self::create_atlas_texture(device, self.page_size, layers);
        self.atlas_bind_group =
            Self::create_atlas_bind_group(device, &self.atlas_bgl, &self.atlas_texture);
        true
    }

    /// Upload one atlas page (RGBA, `page_size` × `page_size`) into its
    /// texture layer.
    pub fn upload_page(&self, queue: &Queue, layer: u32, data: &[u8]) {
        debug_assert!(layer < self.atlas_layers);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.atlas_texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer,
                },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.page_size * 4), // RGBA
                rows_per_image: Some(self.page_size),
            },
            Extent3d {
                width: self.page_size,
                height: self.page_size,
                depth_or_array_layers: 1,
            },
        );
    }

    // ───────────────────── Draw ───────────────────────────────────

    /// Record draw commands into the render pass.
    ///
    /// **One instanced draw call** for all glyph cells.
    pub fn draw<'a>(&'a self, pass: &mut RenderPass<'a>) {
        if self.cell_count == 0 {
            return;
        }

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.frame_bind_group, &[]);
        pass.set_bind_group(1, &self.atlas_bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_vertex_buffer(1, self.cell_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), IndexFormat::Uint16);
        pass.draw_indexed(0..6, 0, 0..self.cell_count);
    }

    /// Number of glyph cells that will be drawn.
    pub fn cell_count(&self) -> u32 {
        self.cell_count
    }

    /// Current atlas texture layer count.
    pub fn layer_count(&self) -> u32 {
        self.atlas_layers
    }
}
