//! Glyph rasterization — the font backend behind a trait.
//!
//! The renderer only ever talks to [`Rasterizer`]; the production
//! implementation ([`SwashRasterizer`]) shapes single characters with
//! `cosmic-text` and rasterizes them through its `SwashCache`, while
//! [`FixedRasterizer`] provides deterministic metrics for tests and
//! benchmarks.

use std::collections::HashMap;

use cosmic_text::{
    Attrs, Buffer, Family, FontSystem, Metrics, Shaping, Style as CtStyle,
    SwashCache, SwashContent, Weight,
};

use crate::style::{GlyphKey, GlyphStyle};

/// One rasterized character bitmap with placement metrics.
#[derive(Clone, Debug)]
pub struct RasterizedGlyph {
    /// Bitmap width in pixels.
    pub width: u32,
    /// Bitmap height in pixels.
    pub height: u32,
    /// Offset from a cell's top-left pen position to the bitmap's
    /// top-left, in pixels.
    pub origin_x: f32,
    pub origin_y: f32,
    /// Alpha coverage, one byte per pixel, row-major.
    pub coverage: Vec<u8>,
}

impl RasterizedGlyph {
    /// Hollow box bitmap substituted for unrenderable characters.
    pub fn fallback(size_px: f32) -> Self {
        let w = (size_px * 0.6).max(3.0) as u32;
        let h = size_px.max(4.0) as u32;
        let mut coverage = vec![0u8; (w * h) as usize];
        for y in 0..h {
            for x in 0..w {
                let edge = x == 0 || y == 0 || x == w - 1 || y == h - 1;
                if edge {
                    coverage[(y * w + x) as usize] = 255;
                }
            }
        }
        Self {
            width: w,
            height: h,
            origin_x: 0.0,
            origin_y: 0.0,
            coverage,
        }
    }
}

/// Font backend: renders one character in one visual style into a
/// bitmap and measures horizontal advances.
pub trait Rasterizer {
    /// Rasterize a single character. `None` means the character cannot
    /// be rendered by this backend; callers substitute a fallback.
    fn rasterize(&mut self, ch: char, style: &GlyphStyle) -> Option<RasterizedGlyph>;

    /// Horizontal advance of a single character, in pixels.
    fn advance(&mut self, ch: char, style: &GlyphStyle) -> f32;

    /// Cumulative width of a string, in pixels. The O(n) fallback used
    /// when the active font is not monospace.
    fn measure(&mut self, text: &str, style: &GlyphStyle) -> f32 {
        text.chars().map(|ch| self.advance(ch, style)).sum()
    }
}

// ───────────────────────────────────────────────────────────────────
// Swash-backed production rasterizer
// ───────────────────────────────────────────────────────────────────

/// Production rasterizer over `cosmic-text`.
///
/// Shapes a one-character buffer per glyph and rasterizes the first
/// positioned glyph via swash. Advances are memoized per (character,
/// style) so the cumulative measurement path does not re-shape
/// unchanged characters.
pub struct SwashRasterizer {
    pub font_system: FontSystem,
    pub swash_cache: SwashCache,
    advance_cache: HashMap<GlyphKey, f32>,
}

impl SwashRasterizer {
    /// Create a rasterizer with system font discovery.
    pub fn new() -> Self {
        Self {
            font_system: FontSystem::new(),
            swash_cache: SwashCache::new(),
            advance_cache: HashMap::new(),
        }
    }

    fn attrs<'a>(style: &'a GlyphStyle) -> Attrs<'a> {
        let family = match &*style.family {
            "sans-serif" => Family::SansSerif,
            "serif" => Family::Serif,
            "monospace" => Family::Monospace,
            name => Family::Name(name),
        };
        let weight = if style.bold { Weight::BOLD } else { Weight::NORMAL };
        let ct_style = if style.italic { CtStyle::Italic } else { CtStyle::Normal };
        Attrs::new().family(family).weight(weight).style(ct_style)
    }

    /// Shape `text` as a single unwrapped line and return the buffer.
    fn shape(&mut self, text: &str, style: &GlyphStyle) -> Buffer {
        // Tight metrics: line height == font size. Placement below is
        // relative to the shaped baseline, so the caller's line height
        // does not matter for glyph origins.
        let metrics = Metrics::new(style.size_px, style.size_px);
        let mut buffer = Buffer::new(&mut self.font_system, metrics);
        buffer.set_size(&mut self.font_system, None, None);
        buffer.set_text(&mut self.font_system, text, Self::attrs(style), Shaping::Advanced);
        buffer.shape_until_scroll(&mut self.font_system, false);
        buffer
    }
}

impl Default for SwashRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Rasterizer for SwashRasterizer {
    fn rasterize(&mut self, ch: char, style: &GlyphStyle) -> Option<RasterizedGlyph> {
        let mut utf8 = [0u8; 4];
        let buffer = self.shape(ch.encode_utf8(&mut utf8), style);

        let (physical, line_y) = {
            let run = buffer.layout_runs().next()?;
            let glyph = run.glyphs.first()?;
            (glyph.physical((0.0, 0.0), 1.0), run.line_y)
        };

        let Some(image) = self
            .swash_cache
            .get_image(&mut self.font_system, physical.cache_key)
        else {
            return None;
        };

        let width = image.placement.width;
        let height = image.placement.height;
        if width == 0 || height == 0 {
            return None;
        }

        let coverage = match image.content {
            SwashContent::Mask => image.data.clone(),
            // Color/subpixel sources collapse to their alpha channel;
            // tinting happens at atlas blit time.
            SwashContent::Color | SwashContent::SubpixelMask => image
                .data
                .chunks_exact(4)
                .map(|px| px[3])
                .collect(),
        };

        Some(RasterizedGlyph {
            width,
            height,
            origin_x: physical.x as f32 + image.placement.left as f32,
            origin_y: line_y + physical.y as f32 - image.placement.top as f32,
            coverage,
        })
    }

    fn advance(&mut self, ch: char, style: &GlyphStyle) -> f32 {
        let key = GlyphKey {
            ch,
            style: style.clone(),
        };
        if let Some(&advance) = self.advance_cache.get(&key) {
            return advance;
        }

        let mut utf8 = [0u8; 4];
        let buffer = self.shape(ch.encode_utf8(&mut utf8), style);
        let advance = buffer
            .layout_runs()
            .next()
            .and_then(|run| run.glyphs.first().map(|g| g.w))
            .unwrap_or(0.0);

        self.advance_cache.insert(key, advance);
        advance
    }

    fn measure(&mut self, text: &str, style: &GlyphStyle) -> f32 {
        if text.is_empty() {
            return 0.0;
        }
        let buffer = self.shape(text, style);
        let mut width: f32 = 0.0;
        for run in buffer.layout_runs() {
            let run_width = run
                .glyphs
                .iter()
                .map(|g| g.x + g.w)
                .fold(0.0f32, f32::max);
            width = width.max(run_width);
        }
        width
    }
}

// ───────────────────────────────────────────────────────────────────
// Fixed-metrics rasterizer (tests, benchmarks)
// ───────────────────────────────────────────────────────────────────

/// Deterministic rasterizer with synthetic metrics.
///
/// In monospace mode every character advances by the same width; in
/// proportional mode the advance varies per character. Bitmaps are
/// solid rectangles, so output is fully reproducible without any system
/// fonts installed.
pub struct FixedRasterizer {
    advance: f32,
    proportional: bool,
}

impl FixedRasterizer {
    /// Every character advances by `advance` pixels.
    pub fn monospace(advance: f32) -> Self {
        Self {
            advance,
            proportional: false,
        }
    }

    /// Per-character advances (narrow 'i', wide 'M', medium default).
    pub fn proportional() -> Self {
        Self {
            advance: 8.0,
            proportional: true,
        }
    }
}

impl Rasterizer for FixedRasterizer {
    fn rasterize(&mut self, ch: char, style: &GlyphStyle) -> Option<RasterizedGlyph> {
        // Control characters stand in for "unrenderable".
        if ch.is_control() {
            return None;
        }
        let width = (self.advance(ch, style).round() as u32).saturating_sub(2).max(1);
        let height = style.size_px.max(1.0) as u32;
        Some(RasterizedGlyph {
            width,
            height,
            origin_x: 0.0,
            origin_y: 0.0,
            coverage: vec![255u8; (width * height) as usize],
        })
    }

    fn advance(&mut self, ch: char, _style: &GlyphStyle) -> f32 {
        if !self.proportional {
            return self.advance;
        }
        match ch {
            'i' | 'l' | 'j' | '.' | ',' | '\'' => 4.0,
            'M' | 'W' | 'm' | 'w' => 12.0,
            _ => self.advance,
        }
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_is_hollow_box() {
        let glyph = RasterizedGlyph::fallback(16.0);
        assert!(glyph.width >= 3);
        assert!(glyph.height >= 4);
        assert_eq!(glyph.coverage.len(), (glyph.width * glyph.height) as usize);
        // Corners opaque, center transparent.
        assert_eq!(glyph.coverage[0], 255);
        let center = (glyph.height / 2) * glyph.width + glyph.width / 2;
        assert_eq!(glyph.coverage[center as usize], 0);
    }

    #[test]
    fn test_fixed_monospace_advances_equal() {
        let mut raster = FixedRasterizer::monospace(10.0);
        let style = GlyphStyle::default();
        for ch in "iMW0123abc".chars() {
            assert_eq!(raster.advance(ch, &style), 10.0);
        }
    }

    #[test]
    fn test_fixed_proportional_advances_differ() {
        let mut raster = FixedRasterizer::proportional();
        let style = GlyphStyle::default();
        assert!(raster.advance('i', &style) < raster.advance('M', &style));
    }

    #[test]
    fn test_fixed_rasterize_dimensions() {
        let mut raster = FixedRasterizer::monospace(10.0);
        let style = GlyphStyle::default();
        let glyph = raster.rasterize('a', &style).unwrap();
        assert_eq!(glyph.width, 8);
        assert_eq!(glyph.height, 16);
        assert!(glyph.coverage.iter().all(|&a| a == 255));
    }

    #[test]
    fn test_fixed_control_char_unrenderable() {
        let mut raster = FixedRasterizer::monospace(10.0);
        let style = GlyphStyle::default();
        assert!(raster.rasterize('\u{0001}', &style).is_none());
    }

    #[test]
    fn test_default_measure_sums_advances() {
        let mut raster = FixedRasterizer::monospace(10.0);
        let style = GlyphStyle::default();
        assert_eq!(raster.measure("abc", &style), 30.0);
        assert_eq!(raster.measure("", &style), 0.0);
    }

    #[test]
    fn test_swash_rasterizer_construction() {
        // System fonts may be absent in CI; construction must still work.
        let raster = SwashRasterizer::new();
        drop(raster);
    }

    #[test]
    fn test_swash_rasterize_if_fonts_available() {
        let mut raster = SwashRasterizer::new();
        if raster.font_system.db().faces().count() == 0 {
            return; // no system fonts, nothing to assert
        }
        let style = GlyphStyle::new("monospace", 16.0);
        if let Some(glyph) = raster.rasterize('A', &style) {
            assert!(glyph.width > 0);
            assert!(glyph.height > 0);
            assert_eq!(glyph.coverage.len(), (glyph.width * glyph.height) as usize);
        }
        assert!(raster.advance('A', &style) >= 0.0);
        let wide = raster.measure("AAAA", &style);
        let narrow = raster.measure("A", &style);
        assert!(wide >= narrow);
    }
}
