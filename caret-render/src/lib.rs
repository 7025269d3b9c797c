//! # caret-render
//!
//! GPU glyph rendering for the Caret editor viewport, built on `wgpu`.
//!
//! ## Architecture
//!
//! ```text
//!  Document / viewport (external)
//!       │  visible lines + token spans + scroll
//!       ▼
//!  viewport::collect_cells()         ◀─── cull, skip whitespace,
//!       │                                 resolve glyphs via the atlas
//!       ▼
//!  GlyphRenderer.prepare()           ◀─── one upload per buffer
//!       │
//!       ▼
//!  GlyphRenderer.render_to_surface() ◀─── single instanced draw call
//! ```
//!
//! The number of GPU API calls per frame is O(1) regardless of visible
//! glyph count: all per-glyph variability lives in CPU-side array
//! writes and one instance-buffer upload.
//!
//! ## Crate modules
//!
//! - [`context`] — GPU device/queue/surface initialisation
//! - [`vertex`] — packed vertex, instance, and uniform data types
//! - [`pipelines`] — wgpu render pipelines (glyphs)
//! - [`viewport`] — visible lines → packed glyph cells
//! - [`renderer`] — high-level frame orchestration

pub mod context;
pub mod pipelines;
pub mod renderer;
pub mod vertex;
pub mod viewport;

// Re-exports for convenience
pub use context::{GpuContext, InitError};
pub use renderer::{FrameStats, GlyphRenderer, RenderError, RendererConfig};
pub use vertex::{GlyphCell, QuadVertex, ViewportUniform};
pub use viewport::{collect_cells, CellStats, FrameLayout, TokenId, TokenSpan, VisibleLine};
