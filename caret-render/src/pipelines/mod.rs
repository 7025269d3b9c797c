//! wgpu render pipelines.

pub mod glyphs;

pub use glyphs::GlyphPipeline;
