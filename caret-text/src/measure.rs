//! Line-width memoization and monospace detection.
//!
//! `WidthCache` remembers measured pixel widths per line index so
//! unchanged lines are never re-measured. The owning editor is
//! responsible for invalidating the affected line(s) on every edit.
//!
//! Monospace detection runs once at font-load time: a small probe set
//! is measured, and if every advance agrees within [`MONOSPACE_EPSILON`]
//! the column→pixel mapping collapses to one multiplication.

use std::collections::HashMap;

use crate::raster::Rasterizer;
use crate::style::GlyphStyle;

/// Characters probed to decide whether the active font is fixed-width.
pub const MONOSPACE_PROBE: &str = "iMW0123";

/// Maximum advance spread, in pixels, still considered fixed-width.
pub const MONOSPACE_EPSILON: f32 = 0.1;

/// Per-line pixel width cache keyed by line index.
#[derive(Debug, Default)]
pub struct WidthCache {
    widths: HashMap<usize, f32>,
}

impl WidthCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached width of a line, if it has been measured since the last
    /// invalidation.
    pub fn line_width(&self, line: usize) -> Option<f32> {
        self.widths.get(&line).copied()
    }

    pub fn set_line_width(&mut self, line: usize, width: f32) {
        self.widths.insert(line, width);
    }

    /// Drop the cached width of one edited line.
    pub fn invalidate_line(&mut self, line: usize) {
        self.widths.remove(&line);
    }

    /// Drop cached widths for `line` and everything after it. Used when
    /// an insert or delete shifts all following line indices.
    pub fn invalidate_from(&mut self, line: usize) {
        self.widths.retain(|&index, _| index < line);
    }

    pub fn clear(&mut self) {
        self.widths.clear();
    }

    pub fn len(&self) -> usize {
        self.widths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widths.is_empty()
    }
}

/// Probe the active font once; returns the shared character width when
/// it is fixed-width, `None` for proportional fonts.
pub fn detect_char_width(raster: &mut dyn Rasterizer, style: &GlyphStyle) -> Option<f32> {
    let mut probes = MONOSPACE_PROBE.chars();
    let first = raster.advance(probes.next().expect("probe set is nonempty"), style);

    // A zero advance means the backend has no usable metrics for this
    // font; fall back to per-string measurement.
    if first <= 0.0 {
        log::warn!("font {:?} reported zero advance, monospace fast path disabled", style.family);
        return None;
    }

    let mut min = first;
    let mut max = first;
    for ch in probes {
        let advance = raster.advance(ch, style);
        min = min.min(advance);
        max = max.max(advance);
    }

    if max - min <= MONOSPACE_EPSILON {
        log::info!("font {:?} detected as monospace ({first}px)", style.family);
        Some(first)
    } else {
        log::info!(
            "font {:?} is proportional (advance spread {:.2}px)",
            style.family,
            max - min
        );
        None
    }
}

// ===================================================================
// Tests
// ===================================================================
