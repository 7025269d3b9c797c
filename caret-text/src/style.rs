//! Glyph style keys — structural cache identity for glyph lookups.
//!
//! A glyph is cached per (character, style). The style is hashed
//! directly as a record rather than through a formatted string key, so
//! a cache lookup performs no allocation: the family is an `Arc<str>`
//! (clone = refcount bump) and every other field is plain data.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Visual style of a glyph.
///
/// Two atlas requests with identical style and character resolve to the
/// same cached glyph, so every field here participates in equality and
/// hashing.
#[derive(Clone, Debug)]
pub struct GlyphStyle {
    /// Font family name, or a CSS generic ("monospace", "sans-serif",
    /// "serif").
    pub family: Arc<str>,
    /// Font size in pixels.
    pub size_px: f32,
    /// RGBA color, 0–255 per channel. Baked into the cached bitmap.
    pub color: [u8; 4],
    pub bold: bool,
    pub italic: bool,
}

impl Default for GlyphStyle {
    fn default() -> Self {
        Self {
            family: Arc::from("monospace"),
            size_px: 16.0,
            color: [255, 255, 255, 255],
            bold: false,
            italic: false,
        }
    }
}

impl GlyphStyle {
    pub fn new(family: &str, size_px: f32) -> Self {
        Self {
            family: Arc::from(family),
            size_px,
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: [u8; 4]) -> Self {
        self.color = color;
        self
    }

    pub fn with_bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    pub fn with_italic(mut self, italic: bool) -> Self {
        self.italic = italic;
        self
    }
}

// size_px is compared and hashed by bit pattern. Styles are only ever
// compared against styles built from the same configuration values, so
// bitwise identity is the right equivalence here.
impl PartialEq for GlyphStyle {
    fn eq(&self, other: &Self) -> bool {
        self.family == other.family
            && self.size_px.to_bits() == other.size_px.to_bits()
            && self.color == other.color
            && self.bold == other.bold
            && self.italic == other.italic
    }
}

impl Eq for GlyphStyle {}

impl Hash for GlyphStyle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.family.hash(state);
        self.size_px.to_bits().hash(state);
        self.color.hash(state);
        self.bold.hash(state);
        self.italic.hash(state);
    }
}

/// Atlas cache key: one character in one visual style.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GlyphKey {
    pub ch: char,
    pub style: GlyphStyle,
}

// ===================================================================
// Tests
// ===================================================================
