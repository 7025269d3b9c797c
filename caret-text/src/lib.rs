//! # caret-text
//!
//! CPU-side text engine for the Caret editor: glyph style keys, the
//! rasterizer seam, the paged glyph atlas, and line-width caching.
//!
//! ## Architecture
//!
//! ```text
//! Rasterizer (cosmic-text / fixed-metrics)
//!     │
//!     ▼
//! GlyphAtlas.get_glyph(ch, style) ──► CachedGlyph { page, index, x, y, … }
//!     │                                    │
//!     ▼                                    ▼
//!   atlas pages (RGBA)            glyph_info() flat array ── GPU upload
//! ```
//!
//! - **`style`** — structural (character, style) cache keys.
//! - **`raster`** — rasterization behind a trait; swash-backed
//!   production impl plus a deterministic fixed-metrics impl.
//! - **`atlas`** — paged shelf-packing glyph atlas, no eviction.
//! - **`measure`** — per-line width cache and monospace detection.

pub mod atlas;
pub mod measure;
pub mod raster;
pub mod style;

// Re-exports for ergonomic use.
pub use atlas::{AtlasError, AtlasPage, CachedGlyph, GlyphAtlas};
pub use measure::{detect_char_width, WidthCache};
pub use raster::{FixedRasterizer, RasterizedGlyph, Rasterizer, SwashRasterizer};
pub use style::{GlyphKey, GlyphStyle};
