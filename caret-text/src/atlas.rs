//! Paged glyph atlas — shelf packing over fixed-size texture pages.
//!
//! Each page is a square RGBA pixel buffer with a packing cursor
//! `(cursor_x, cursor_y, row_height)`. A glyph that does not fit the
//! current shelf starts a new shelf; a glyph that does not fit the page
//! starts a new page. Pages are append-only: glyphs are never evicted,
//! freed space is never reclaimed, and cached coordinates stay valid
//! for the whole session. The distinct (character, style) set of an
//! editing session is small, so growth is bounded by `max_pages`.
//!
//! Every cached glyph gets a dense `u32` index; `glyph_info()` exposes
//! a flat array of six floats per index (atlas x, y, width, height,
//! origin x, y) suitable for verbatim upload into a GPU storage buffer.

use std::collections::HashMap;

use thiserror::Error;

use crate::raster::{RasterizedGlyph, Rasterizer};
use crate::style::{GlyphKey, GlyphStyle};

/// Fields per glyph in the flat metadata array.
pub const GLYPH_INFO_STRIDE: usize = 6;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtlasError {
    /// The configured page limit is reached and a new glyph still needs
    /// space. Fatal for that glyph; the caller renders without it.
    #[error("glyph atlas page limit reached ({0} pages)")]
    CapacityExceeded(u32),
    /// A single bitmap larger than one page can never be placed.
    #[error("glyph bitmap {width}x{height} exceeds page size {page_size}")]
    GlyphTooLarge {
        width: u32,
        height: u32,
        page_size: u32,
    },
}

/// One cached glyph placement. Immutable after creation; never evicted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CachedGlyph {
    /// Atlas page (texture layer) holding the bitmap.
    pub page: u32,
    /// Dense global glyph index, assigned in insertion order from 0.
    pub index: u32,
    /// Top-left pixel position within the page.
    pub x: u32,
    pub y: u32,
    /// Bitmap size in pixels.
    pub width: u32,
    pub height: u32,
    /// Offset from a cell's top-left pen position to the bitmap.
    pub origin_x: f32,
    pub origin_y: f32,
}

/// One fixed-size atlas page: RGBA pixels plus the shelf cursor.
pub struct AtlasPage {
    /// RGBA pixel data (`size * size * 4` bytes).
    pub data: Vec<u8>,
    /// Whether pixels changed since the last GPU upload.
    pub dirty: bool,
    cursor_x: u32,
    cursor_y: u32,
    row_height: u32,
}

impl AtlasPage {
    fn new(size: u32) -> Self {
        Self {
            data: vec![0u8; (size as usize) * (size as usize) * 4],
            dirty: false,
            cursor_x: 0,
            cursor_y: 0,
            row_height: 0,
        }
    }
}

/// Paged glyph atlas with (character, style) caching.
pub struct GlyphAtlas {
    page_size: u32,
    max_pages: u32,
    pages: Vec<AtlasPage>,
    lookup: HashMap<GlyphKey, u32>,
    glyphs: Vec<CachedGlyph>,
    /// Flat metadata, `GLYPH_INFO_STRIDE` floats per glyph index.
    info: Vec<f32>,
}

impl GlyphAtlas {
    /// Create an atlas with square pages of `page_size` pixels and at
    /// most `max_pages` pages. The first page exists immediately.
    pub fn new(page_size: u32, max_pages: u32) -> Self {
        assert!(page_size > 0, "page size must be nonzero");
        assert!(max_pages > 0, "page limit must be nonzero");
        Self {
            page_size,
            max_pages,
            pages: vec![AtlasPage::new(page_size)],
            lookup: HashMap::new(),
            glyphs: Vec::new(),
            info: Vec::new(),
        }
    }

    /// Resolve a glyph, rasterizing and packing it on first use.
    ///
    /// Deterministic per (character, style): repeated calls return the
    /// identical placement with no rasterization or packing work. A
    /// character the backend cannot render is replaced by a fallback
    /// box bitmap rather than failing.
    pub fn get_glyph(
        &mut self,
        ch: char,
        style: &GlyphStyle,
        raster: &mut dyn Rasterizer,
    ) -> Result<CachedGlyph, AtlasError> {
        let key = GlyphKey {
            ch,
            style: style.clone(),
        };
        if let Some(&index) = self.lookup.get(&key) {
            return Ok(self.glyphs[index as usize]);
        }

        let bitmap = match raster.rasterize(ch, style) {
            Some(bitmap) => bitmap,
            None => {
                log::debug!("unrenderable character {ch:?}, using fallback glyph");
                RasterizedGlyph::fallback(style.size_px)
            }
        };

        let (page, x, y) = self.allocate(bitmap.width, bitmap.height)?;
        self.blit(page, x, y, &bitmap, style.color);

        let index = self.glyphs.len() as u32;
        let cached = CachedGlyph {
            page,
            index,
            x,
            y,
            width: bitmap.width,
            height: bitmap.height,
            origin_x: bitmap.origin_x,
            origin_y: bitmap.origin_y,
        };
        self.glyphs.push(cached);
        self.info.extend_from_slice(&[
            x as f32,
            y as f32,
            bitmap.width as f32,
            bitmap.height as f32,
            bitmap.origin_x,
            bitmap.origin_y,
        ]);
        self.lookup.insert(key, index);

        Ok(cached)
    }

    /// Number of distinct cached glyphs.
    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// Number of allocated pages.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Page edge length in pixels.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn pages(&self) -> &[AtlasPage] {
        &self.pages
    }

    /// Flat glyph metadata ordered by glyph index: atlas-x, atlas-y,
    /// width, height, origin-x, origin-y. Upload verbatim after any
    /// glyph was added.
    pub fn glyph_info(&self) -> &[f32] {
        &self.info
    }

    /// Look up an already-cached glyph without rasterizing.
    pub fn cached(&self, ch: char, style: &GlyphStyle) -> Option<CachedGlyph> {
        let key = GlyphKey {
            ch,
            style: style.clone(),
        };
        self.lookup
            .get(&key)
            .map(|&index| self.glyphs[index as usize])
    }

    /// Clear the dirty flag on every page after a GPU upload pass.
    pub fn mark_uploaded(&mut self) {
        for page in &mut self.pages {
            page.dirty = false;
        }
    }

    /// Flag every page for re-upload (after the GPU-side layered
    /// texture was recreated with more layers).
    pub fn mark_all_dirty(&mut self) {
        for page in &mut self.pages {
            page.dirty = true;
        }
    }

    // ---------------------------------------------------------------
    // Internal helpers
    // ---------------------------------------------------------------

    /// Shelf-allocate `width x height` pixels, growing the page list if
    /// the current page is full.
    fn allocate(&mut self, width: u32, height: u32) -> Result<(u32, u32, u32), AtlasError> {
        if width > self.page_size || height > self.page_size {
            return Err(AtlasError::GlyphTooLarge {
                width,
                height,
                page_size: self.page_size,
            });
        }

        // Zero-area glyphs (e.g. zero-width joiners) occupy no pixels.
        if width == 0 || height == 0 {
            let page = self.pages.len() as u32 - 1;
            return Ok((page, 0, 0));
        }

        loop {
            let page_index = self.pages.len() as u32 - 1;
            let size = self.page_size;
            let page = self.pages.last_mut().expect("atlas always has a page");

            // Shelf advance: the bitmap does not fit the current row.
            if page.cursor_x + width > size {
                page.cursor_x = 0;
                page.cursor_y += page.row_height;
                page.row_height = 0;
            }

            // Page full: open a new page and retry there.
            if page.cursor_y + height > size {
                if self.pages.len() as u32 >= self.max_pages {
                    log::warn!(
                        "glyph atlas full: {} pages of {}px, glyph {}x{} dropped",
                        self.pages.len(),
                        size,
                        width,
                        height
                    );
                    return Err(AtlasError::CapacityExceeded(self.max_pages));
                }
                log::info!("glyph atlas page {} created", self.pages.len());
                self.pages.push(AtlasPage::new(size));
                continue;
            }

            let (x, y) = (page.cursor_x, page.cursor_y);
            page.cursor_x += width;
            page.row_height = page.row_height.max(height);
            return Ok((page_index, x, y));
        }
    }

    /// Blit alpha coverage into a page, tinted by the style color.
    fn blit(&mut self, page: u32, x: u32, y: u32, bitmap: &RasterizedGlyph, color: [u8; 4]) {
        if bitmap.width == 0 || bitmap.height == 0 {
            return;
        }
        let size = self.page_size;
        let page = &mut self.pages[page as usize];

        for row in 0..bitmap.height {
            for col in 0..bitmap.width {
                let alpha = bitmap.coverage[(row * bitmap.width + col) as usize];
                let dst = (((y + row) * size + x + col) * 4) as usize;
                page.data[dst] = color[0];
                page.data[dst + 1] = color[1];
                page.data[dst + 2] = color[2];
                page.data[dst + 3] = ((alpha as u16 * color[3] as u16) / 255) as u8;
            }
        }
        page.dirty = true;
    }
}

// ===================================================================
// Tests
// ===================================================================
