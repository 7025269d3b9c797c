//! Viewport → GPU bridge: converts visible document lines into packed
//! [`GlyphCell`] records for the instanced glyph pipeline.
//!
//! This is the per-frame CPU core: vertical culling, whitespace
//! skipping, horizontal positioning (monospace fast path or cumulative
//! measurement), token-span coloring, and bounded truncation when a
//! frame holds more glyphs than the pre-allocated instance array.

use caret_text::atlas::{AtlasError, GlyphAtlas};
use caret_text::measure::WidthCache;
use caret_text::raster::Rasterizer;
use caret_text::style::GlyphStyle;

use crate::vertex::GlyphCell;

/// Token classification produced by the (external) tokenizer.
pub type TokenId = u16;

/// A half-open `[start, end)` span of character columns sharing one
/// token classification. Spans are expected sorted and non-overlapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenSpan {
    pub start: usize,
    pub end: usize,
    pub token: TokenId,
}

/// One visible line handed in by the document/viewport collaborator.
#[derive(Clone, Copy, Debug)]
pub struct VisibleLine<'a> {
    pub text: &'a str,
    pub spans: &'a [TokenSpan],
    /// Absolute line index in the document (drives vertical position).
    pub index: usize,
}

/// Per-frame layout parameters.
#[derive(Clone, Copy, Debug)]
pub struct FrameLayout {
    /// Line height in pixels.
    pub line_height: f32,
    /// Shared character width when the font is monospace; `None`
    /// selects the cumulative-measurement path.
    pub char_width: Option<f32>,
    /// Tab stop width in columns.
    pub tab_stop: u32,
    /// Viewport height in pixels, for vertical culling.
    pub viewport_height: f32,
}

/// Statistics from one cell-collection pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellStats {
    /// Cells appended this frame.
    pub appended: u32,
    /// True when the frame held more glyphs than the instance capacity
    /// and the tail was dropped.
    pub truncated: bool,
    /// Glyphs dropped because the atlas hit its page limit.
    pub atlas_errors: u32,
}

/// Rebuild the frame's glyph cells from the visible lines.
///
/// Emits exactly one cell per visible, non-whitespace character, in
/// left-to-right, top-to-bottom visible order. `cells` is cleared and
/// refilled; at most `max_cells` entries are appended, and the vector
/// is never grown beyond its pre-allocated capacity mid-frame.
///
/// Lines whose vertical extent does not intersect the viewport are
/// skipped entirely (strict culling, no prefetch margin). Measured
/// line widths are recorded into `widths` as a side effect.
#[allow(clippy::too_many_arguments)]
pub fn collect_cells(
    lines: &[VisibleLine<'_>],
    scroll_y: f32,
    layout: &FrameLayout,
    base_style: &GlyphStyle,
    palette: &dyn Fn(TokenId) -> [u8; 4],
    atlas: &mut GlyphAtlas,
    raster: &mut dyn Rasterizer,
    widths: &mut WidthCache,
    cells: &mut Vec<GlyphCell>,
    max_cells: usize,
) -> CellStats {
    cells.clear();
    let mut stats = CellStats::default();

    'lines: for line in lines {
        let top = line.index as f32 * layout.line_height - scroll_y;
        if top + layout.line_height <= 0.0 || top >= layout.viewport_height {
            continue;
        }

        let mut col: u32 = 0;
        let mut pen_x: f32 = 0.0;
        let mut span_idx = 0usize;

        for ch in line.text.chars() {
            while span_idx < line.spans.len() && line.spans[span_idx].end <= col as usize {
                span_idx += 1;
            }
            let color = line
                .spans
                .get(span_idx)
                .filter(|s| s.start <= col as usize && (col as usize) < s.end)
                .map(|s| palette(s.token))
                .unwrap_or(base_style.color);

            if ch == '\t' {
                let next = (col / layout.tab_stop + 1) * layout.tab_stop;
                if layout.char_width.is_none() {
                    pen_x += raster.advance(' ', base_style) * (next - col) as f32;
                }
                col = next;
                continue;
            }

            if ch.is_whitespace() {
                if layout.char_width.is_none() {
                    pen_x += raster.advance(ch, base_style);
                }
                col += 1;
                continue;
            }

            // Monospace fast path: a single multiplication, exact for
            // every column. Otherwise the accumulated pen position.
            let x = match layout.char_width {
                Some(char_width) => col as f32 * char_width,
                None => pen_x,
            };

            let style = if color == base_style.color {
                base_style.clone()
            } else {
                let mut styled = base_style.clone();
                styled.color = color;
                styled
            };

            match atlas.get_glyph(ch, &style, raster) {
                Ok(glyph) => {
                    if cells.len() >= max_cells {
                        stats.truncated = true;
                        break 'lines;
                    }
                    cells.push(GlyphCell::new(x, top, glyph.index, glyph.page));
                    stats.appended += 1;
                }
                Err(AtlasError::CapacityExceeded(_)) | Err(AtlasError::GlyphTooLarge { .. }) => {
                    // The glyph is dropped for this frame; positions of
                    // later characters are unaffected.
                    stats.atlas_errors += 1;
                }
            }

            if layout.char_width.is_none() {
                // Color does not affect metrics; keying the advance on
                // the base style keeps the backend cache to one entry
                // per character.
                pen_x += raster.advance(ch, base_style);
            }
            col += 1;
        }

        let width = match layout.char_width {
            Some(char_width) => col as f32 * char_width,
            None => pen_x,
        };
        widths.set_line_width(line.index, width);
    }

    if stats.truncated {
        log::warn!(
            "glyph instance capacity ({max_cells}) exceeded, frame truncated"
        );
    }
    if stats.atlas_errors > 0 {
        log::warn!("{} glyphs dropped: atlas capacity exhausted", stats.atlas_errors);
    }

    stats
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use caret_text::raster::FixedRasterizer;

    fn mono_layout() -> FrameLayout {
        FrameLayout {
            line_height: 18.0,
            char_width: Some(10.0),
            tab_stop: 4,
            viewport_height: 600.0,
        }
    }

    fn no_palette(_: TokenId) -> [u8; 4] {
        [255, 255, 255, 255]
    }

    fn collect(
        lines: &[VisibleLine<'_>],
        scroll_y: f32,
        layout: &FrameLayout,
        atlas: &mut GlyphAtlas,
        raster: &mut FixedRasterizer,
        cells: &mut Vec<GlyphCell>,
        max_cells: usize,
    ) -> CellStats {
        let mut widths = WidthCache::new();
        collect_cells(
            lines,
            scroll_y,
            layout,
            &GlyphStyle::default(),
            &no_palette,
            atlas,
            raster,
            &mut widths,
            cells,
            max_cells,
        )
    }

    #[test]
    fn test_abc_positions_and_indices() {
        let mut atlas = GlyphAtlas::new(256, 4);
        let mut raster = FixedRasterizer::monospace(10.0);
        let mut cells = Vec::new();

        let lines = [VisibleLine {
            text: "abc",
            spans: &[],
            index: 0,
        }];
        let stats = collect(
            &lines,
            0.0,
            &mono_layout(),
            &mut atlas,
            &mut raster,
            &mut cells,
            1024,
        );

        assert_eq!(stats.appended, 3);
        assert!(!stats.truncated);
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[0].position, [0.0, 0.0]);
        assert_eq!(cells[1].position, [10.0, 0.0]);
        assert_eq!(cells[2].position, [20.0, 0.0]);
        // First use of each character: three distinct dense indices.
        assert_eq!(cells[0].glyph_index, 0);
        assert_eq!(cells[1].glyph_index, 1);
        assert_eq!(cells[2].glyph_index, 2);
    }

    #[test]
    fn test_whitespace_emits_no_cell_but_advances() {
        let mut atlas = GlyphAtlas::new(256, 4);
        let mut raster = FixedRasterizer::monospace(10.0);
        let mut cells = Vec::new();

        let lines = [VisibleLine {
            text: "a b",
            spans: &[],
            index: 0,
        }];
        collect(
            &lines,
            0.0,
            &mono_layout(),
            &mut atlas,
            &mut raster,
            &mut cells,
            1024,
        );

        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].position[0], 0.0);
        assert_eq!(cells[1].position[0], 20.0);
    }

    #[test]
    fn test_tab_advances_to_next_stop() {
        let mut atlas = GlyphAtlas::new(256, 4);
        let mut raster = FixedRasterizer::monospace(10.0);
        let mut cells = Vec::new();

        let lines = [VisibleLine {
            text: "\ta",
            spans: &[],
            index: 0,
        }];
        collect(
            &lines,
            0.0,
            &mono_layout(),
            &mut atlas,
            &mut raster,
            &mut cells,
            1024,
        );

        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].position[0], 40.0); // column 4 * 10px
    }

    #[test]
    fn test_monospace_positions_are_exact() {
        let mut atlas = GlyphAtlas::new(512, 4);
        let mut raster = FixedRasterizer::monospace(10.0);
        let mut cells = Vec::new();

        let text: String = std::iter::repeat('x').take(500).collect();
        let lines = [VisibleLine {
            text: &text,
            spans: &[],
            index: 0,
        }];
        collect(
            &lines,
            0.0,
            &mono_layout(),
            &mut atlas,
            &mut raster,
            &mut cells,
            4096,
        );

        // No accumulated floating-point drift: column * width, exactly.
        for (i, cell) in cells.iter().enumerate() {
            assert_eq!(cell.position[0], i as f32 * 10.0);
        }
        assert_eq!(cells[499].position[0], 4990.0);
    }

    #[test]
    fn test_proportional_accumulates_advances() {
        let mut atlas = GlyphAtlas::new(256, 4);
        let mut raster = FixedRasterizer::proportional();
        let mut cells = Vec::new();

        let layout = FrameLayout {
            char_width: None,
            ..mono_layout()
        };
        let lines = [VisibleLine {
            text: "iMa",
            spans: &[],
            index: 0,
        }];
        collect(&lines, 0.0, &layout, &mut atlas, &mut raster, &mut cells, 1024);

        // 'i' advance 4, 'M' advance 12.
        assert_eq!(cells[0].position[0], 0.0);
        assert_eq!(cells[1].position[0], 4.0);
        assert_eq!(cells[2].position[0], 16.0);
    }

    #[test]
    fn test_vertical_culling_strict() {
        let mut atlas = GlyphAtlas::new(256, 4);
        let mut raster = FixedRasterizer::monospace(10.0);
        let mut cells = Vec::new();

        let layout = FrameLayout {
            viewport_height: 36.0, // exactly two 18px lines
            ..mono_layout()
        };
        let lines: Vec<VisibleLine> = (0..10)
            .map(|index| VisibleLine {
                text: "x",
                spans: &[],
                index,
            })
            .collect();

        collect(&lines, 0.0, &layout, &mut atlas, &mut raster, &mut cells, 1024);
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].position[1], 0.0);
        assert_eq!(cells[1].position[1], 18.0);

        // Scrolling by one line height shifts the visible window.
        collect(&lines, 18.0, &layout, &mut atlas, &mut raster, &mut cells, 1024);
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].position[1], 0.0); // line 1 now at the top
        assert_eq!(cells[1].position[1], 18.0); // line 2
    }

    #[test]
    fn test_truncation_at_capacity() {
        let mut atlas = GlyphAtlas::new(256, 4);
        let mut raster = FixedRasterizer::monospace(10.0);
        let mut cells = Vec::with_capacity(5);

        let lines = [VisibleLine {
            text: "abcdefghij",
            spans: &[],
            index: 0,
        }];
        let stats = collect(
            &lines,
            0.0,
            &mono_layout(),
            &mut atlas,
            &mut raster,
            &mut cells,
            5,
        );

        assert_eq!(stats.appended, 5);
        assert!(stats.truncated);
        assert_eq!(cells.len(), 5);
        // The earliest glyphs in scan order survive.
        assert_eq!(cells[0].position[0], 0.0);
        assert_eq!(cells[4].position[0], 40.0);
    }

    #[test]
    fn test_identical_frames_are_byte_identical() {
        let mut atlas = GlyphAtlas::new(256, 4);
        let mut raster = FixedRasterizer::monospace(10.0);

        let lines = [
            VisibleLine {
                text: "fn main() {",
                spans: &[],
                index: 0,
            },
            VisibleLine {
                text: "}",
                spans: &[],
                index: 1,
            },
        ];

        let mut first = Vec::new();
        collect(&lines, 0.0, &mono_layout(), &mut atlas, &mut raster, &mut first, 1024);
        let mut second = Vec::new();
        collect(&lines, 0.0, &mono_layout(), &mut atlas, &mut raster, &mut second, 1024);

        let a: &[u8] = bytemuck::cast_slice(&first);
        let b: &[u8] = bytemuck::cast_slice(&second);
        assert_eq!(a, b);
    }

    #[test]
    fn test_token_spans_select_color() {
        let mut atlas = GlyphAtlas::new(256, 4);
        let mut raster = FixedRasterizer::monospace(10.0);
        let mut cells = Vec::new();
        let mut widths = WidthCache::new();

        let spans = [TokenSpan {
            start: 0,
            end: 1,
            token: 1,
        }];
        let lines = [VisibleLine {
            text: "aa",
            spans: &spans,
            index: 0,
        }];
        let palette = |token: TokenId| -> [u8; 4] {
            match token {
                1 => [255, 0, 0, 255],
                _ => [255, 255, 255, 255],
            }
        };

        collect_cells(
            &lines,
            0.0,
            &mono_layout(),
            &GlyphStyle::default(),
            &palette,
            &mut atlas,
            &mut raster,
            &mut widths,
            &mut cells,
            1024,
        );

        // Same character, different color: distinct cached glyphs.
        assert_eq!(cells.len(), 2);
        assert_ne!(cells[0].glyph_index, cells[1].glyph_index);
        assert_eq!(atlas.glyph_count(), 2);
    }

    #[test]
    fn test_width_cache_records_retained_lines() {
        let mut atlas = GlyphAtlas::new(256, 4);
        let mut raster = FixedRasterizer::monospace(10.0);
        let mut cells = Vec::new();
        let mut widths = WidthCache::new();

        let lines = [VisibleLine {
            text: "abc",
            spans: &[],
            index: 0,
        }];
        collect_cells(
            &lines,
            0.0,
            &mono_layout(),
            &GlyphStyle::default(),
            &no_palette,
            &mut atlas,
            &mut raster,
            &mut widths,
            &mut cells,
            1024,
        );

        assert_eq!(widths.line_width(0), Some(30.0));
    }

    #[test]
    fn test_atlas_capacity_drops_glyphs_without_error() {
        // A 16px page with 8x16 glyphs holds exactly two.
        let mut atlas = GlyphAtlas::new(16, 1);
        let mut raster = FixedRasterizer::monospace(10.0);
        let mut cells = Vec::new();

        let lines = [VisibleLine {
            text: "abc",
            spans: &[],
            index: 0,
        }];
        let stats = collect(
            &lines,
            0.0,
            &mono_layout(),
            &mut atlas,
            &mut raster,
            &mut cells,
            1024,
        );

        assert_eq!(stats.appended, 2);
        assert_eq!(stats.atlas_errors, 1);
        assert_eq!(cells.len(), 2);
    }

    #[test]
    fn test_cells_cleared_between_frames() {
        let mut atlas = GlyphAtlas::new(256, 4);
        let mut raster = FixedRasterizer::monospace(10.0);
        let mut cells = vec![GlyphCell::new(99.0, 99.0, 99, 99)];

        let lines = [VisibleLine {
            text: "a",
            spans: &[],
            index: 0,
        }];
        collect(&lines, 0.0, &mono_layout(), &mut atlas, &mut raster, &mut cells, 1024);

        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].position, [0.0, 0.0]);
    }
}
