//! GPU-facing data types for the glyph renderer.
//!
//! All types derive `bytemuck::Pod` + `Zeroable` for zero-copy upload
//! to GPU buffers, and their layouts are spelled out explicitly so the
//! WGSL side can rely on them.

use bytemuck::{Pod, Zeroable};
use wgpu::{BufferAddress, VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode};

// ───────────────────────────────────────────────────────────────────
// Vertex (unit quad)
// ───────────────────────────────────────────────────────────────────

/// A single vertex of the unit quad (0,0)→(1,1).
///
/// The quad is shared across ALL glyph instances; per-glyph data
/// (position, glyph index, page) arrives via [`GlyphCell`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct QuadVertex {
    /// Position in [0, 1] space.
    pub position: [f32; 2],
}

impl QuadVertex {
    /// The 4 vertices of a unit quad.
    pub const VERTICES: [QuadVertex; 4] = [
        QuadVertex { position: [0.0, 0.0] }, // top-left
        QuadVertex { position: [1.0, 0.0] }, // top-right
        QuadVertex { position: [0.0, 1.0] }, // bottom-left
        QuadVertex { position: [1.0, 1.0] }, // bottom-right
    ];

    /// Two-triangle indices for the unit quad.
    pub const INDICES: [u16; 6] = [0, 1, 2, 2, 1, 3];

    pub fn layout() -> VertexBufferLayout<'static> {
        static ATTRS: &[VertexAttribute] = &[
            // location(0) = position
            VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: VertexFormat::Float32x2,
            },
        ];
        VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as BufferAddress,
            step_mode: VertexStepMode::Vertex,
            attributes: ATTRS,
        }
    }
}

// ───────────────────────────────────────────────────────────────────
// Instance data
// ───────────────────────────────────────────────────────────────────

/// One on-screen glyph instance: a cell.
///
/// Ephemeral — rebuilt every frame from the visible viewport, with no
/// identity across frames. 16 bytes per cell: a full 65K-glyph screen
/// is a single 1 MB upload.
///
/// Bitmap size and render origin are NOT stored here; the shader looks
/// them up in the glyph-info storage array by `glyph_index`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GlyphCell {
    /// Screen-space position of the cell's top-left corner, in pixels,
    /// scroll already applied.
    pub position: [f32; 2],
    /// Dense atlas glyph index into the glyph-info array.
    pub glyph_index: u32,
    /// Atlas page = texture array layer holding the bitmap.
    pub page: u32,
}

impl GlyphCell {
    pub fn new(x: f32, y: f32, glyph_index: u32, page: u32) -> Self {
        Self {
            position: [x, y],
            glyph_index,
            page,
        }
    }

    pub fn layout() -> VertexBufferLayout<'static> {
        static ATTRS: &[VertexAttribute] = &[
            // location(1) = position
            VertexAttribute {
                offset: 0,
                shader_location: 1,
                format: VertexFormat::Float32x2,
            },
            // location(2) = glyph_index
            VertexAttribute {
                offset: 8,
                shader_location: 2,
                format: VertexFormat::Uint32,
            },
            // location(3) = page
            VertexAttribute {
                offset: 12,
                shader_location: 3,
                format: VertexFormat::Uint32,
            },
        ];
        VertexBufferLayout {
            array_stride: std::mem::size_of::<GlyphCell>() as BufferAddress,
            step_mode: VertexStepMode::Instance,
            attributes: ATTRS,
        }
    }
}

// ───────────────────────────────────────────────────────────────────
// Viewport uniform
// ───────────────────────────────────────────────────────────────────

/// Per-frame uniform record: canvas dimensions.
///
/// Written once per frame, never per glyph. 16 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ViewportUniform {
    /// Canvas size in pixels.
    pub size: [f32; 2],
    /// Alignment padding.
    pub _pad: [f32; 2],
}

impl ViewportUniform {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            size: [width, height],
            _pad: [0.0; 2],
        }
    }
}

// ===================================================================
// Tests
// ===================================================================
