//! Glyph metrics and rasterization for the caption font.
//!
//! A single font is loaded at startup and shared read-only by every render.
//! Sizes are in points at 72 DPI, so one point is one pixel.
//!
//! Widths are measured the same way the renderer advances its pen: the sum of
//! per-character advance widths plus pair kerning, rounded up to a whole pixel.

use std::path::Path;

use fontdue::{Font, FontSettings};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Glyph source trait
// ────────────────────────────────────────────────────────────────────────────

/// Coverage bitmap for one rasterized glyph.
///
/// `xmin` is the horizontal offset from the pen position to the left edge of
/// the bitmap. `ymin` is the offset from the baseline to the bottom edge of the
/// bitmap, positive upwards. `coverage` is row-major, top row first.
#[derive(Debug, Clone, Default)]
pub struct GlyphBitmap {
    pub xmin: i32,
    pub ymin: i32,
    pub width: usize,
    pub height: usize,
    pub coverage: Vec<u8>,
}

/// A shaped-glyph source the captioner measures and draws with.
///
/// Implementations must be immutable after construction so one instance can be
/// shared across concurrent renders without locking.
pub trait GlyphSource: Send + Sync {
    /// Horizontal advance of `c` at `size` points.
    fn advance_width(&self, c: char, size: f32) -> f32;

    /// Kerning adjustment between `left` and `right` at `size` points.
    fn kerning(&self, left: char, right: char, size: f32) -> f32;

    /// Vertical advance of `c` at `size` points.
    fn advance_height(&self, c: char, size: f32) -> f32;

    fn rasterize(&self, c: char, size: f32) -> GlyphBitmap;

    /// Total advance width of `text` at an integer point size, rounded up.
    fn text_width(&self, size: u32, text: &str) -> i32 {
        let size = size as f32;
        let mut sum = 0.0_f32;
        let mut prev: Option<char> = None;

        for c in text.chars() {
            sum += self.advance_width(c, size);
            if let Some(p) = prev {
                sum += self.kerning(p, c, size);
            }
            prev = Some(c);
        }

        sum.ceil() as i32
    }

    /// Largest advance height of any character in `text`, rounded up.
    fn text_height(&self, size: u32, text: &str) -> i32 {
        let size = size as f32;
        text.chars()
            .map(|c| self.advance_height(c, size))
            .fold(0.0_f32, f32::max)
            .ceil() as i32
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TrueType / OpenType font backed by fontdue
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FontLoadError {
    #[error("failed to read font file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse font: {0}")]
    Parse(String),
}

/// The caption font, parsed once from a TrueType or OpenType file.
pub struct CaptionFont {
    font: Font,
}

impl CaptionFont {
    pub fn from_bytes(data: &[u8]) -> Result<Self, FontLoadError> {
        let font = Font::from_bytes(data, FontSettings::default())
            .map_err(|e| FontLoadError::Parse(e.to_string()))?;
        Ok(Self { font })
    }

    pub fn load(path: &Path) -> Result<Self, FontLoadError> {
        let data = std::fs::read(path).map_err(|source| FontLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_bytes(&data)
    }

    pub fn glyph_count(&self) -> u16 {
        self.font.glyph_count()
    }
}

impl GlyphSource for CaptionFont {
    fn advance_width(&self, c: char, size: f32) -> f32 {
        self.font.metrics(c, size).advance_width
    }

    fn kerning(&self, left: char, right: char, size: f32) -> f32 {
        self.font.horizontal_kern(left, right, size).unwrap_or(0.0)
    }

    fn advance_height(&self, c: char, size: f32) -> f32 {
        let advance = self.font.metrics(c, size).advance_height;
        if advance > 0.0 {
            return advance;
        }
        // Fonts without vertical metrics: fall back to the full ascent-to-descent span.
        self.font
            .horizontal_line_metrics(size)
            .map(|line| line.ascent - line.descent)
            .unwrap_or(size)
    }

    fn rasterize(&self, c: char, size: f32) -> GlyphBitmap {
        let (metrics, coverage) = self.font.rasterize(c, size);
        GlyphBitmap {
            xmin: metrics.xmin,
            ymin: metrics.ymin,
            width: metrics.width,
            height: metrics.height,
            coverage,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
