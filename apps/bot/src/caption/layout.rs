//! Caption layout: font size estimate, line wrapping, contrast color and line placement.
//!
//! # Rules
//! - Font size is a single closed-form estimate, never iterated: the caption should
//!   span 76% of the image width, clamped to 48–150pt.
//! - Captions wider than the image split into two lines at the middle *word*, not at a
//!   measured width. Single words never wrap. There is no third line.
//! - One text color for the whole caption, picked from the mean luma of an 80px band
//!   just above the bottom margin.
//! - Lines stack bottom-up from the bottom margin, each centered horizontally.
//!
//! Overflow after wrapping is accepted as-is.

use image::{Rgba, RgbaImage};

use crate::caption::font::GlyphSource;
use crate::caption::RenderError;

// ────────────────────────────────────────────────────────────────────────────
// Constants
// ────────────────────────────────────────────────────────────────────────────

pub const TEXT_WIDTH_FRACTION: f64 = 0.76;
pub const BOTTOM_MARGIN: f64 = 0.07;
pub const MIN_FONT_SIZE_PT: u32 = 48;
pub const MAX_FONT_SIZE_PT: u32 = 150;
/// Height of the luminosity sampling band, in pixels above the bottom margin.
pub const LUMINOSITY_BAND_PX: i64 = 80;
/// Mean band luma at or above which the caption switches to black.
pub const BRIGHT_BACKGROUND: f64 = 0.7;

const SMALL_REFERENCE_PT: u32 = 10;
const LARGE_REFERENCE_PT: u32 = 100;

// ────────────────────────────────────────────────────────────────────────────
// Plan types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextColor {
    White,
    Black,
}

impl TextColor {
    pub fn rgba(self) -> Rgba<u8> {
        match self {
            TextColor::White => Rgba([255, 255, 255, 255]),
            TextColor::Black => Rgba([0, 0, 0, 255]),
        }
    }
}

/// Everything the renderer needs to draw a caption, derived from image + font + text.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutPlan {
    pub font_size_pt: u32,
    /// One or two lines, in reading order.
    pub lines: Vec<String>,
    pub text_color: TextColor,
}

/// Pen origin for one line: `x` is the left edge, `baseline` the y of the baseline.
/// `x` goes negative when a line overflows the image.
#[derive(Debug, Clone, PartialEq)]
pub struct LinePlacement {
    pub text: String,
    pub x: i32,
    pub baseline: i32,
    pub width: i32,
}

// ────────────────────────────────────────────────────────────────────────────
// Planning
// ────────────────────────────────────────────────────────────────────────────

/// Builds the layout plan for `text` drawn over `image`.
pub fn plan_layout(
    image: &RgbaImage,
    font: &dyn GlyphSource,
    text: &str,
) -> Result<LayoutPlan, RenderError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(RenderError::EmptyImage { width, height });
    }
    if text.trim().is_empty() {
        return Err(RenderError::EmptyText);
    }

    let k = mean_glyph_width(font, text)?;
    let font_size_pt = target_font_size(width, k);
    let lines = wrap_lines(font, font_size_pt, text, width);
    let text_color = text_color_for(mean_band_luminosity(image));

    Ok(LayoutPlan {
        font_size_pt,
        lines,
        text_color,
    })
}

/// Average advance width per point, from measurements at 10pt and 100pt.
///
/// Small sizes round more coarsely than large ones; averaging both per-point widths
/// keeps the estimate stable.
pub fn mean_glyph_width(font: &dyn GlyphSource, text: &str) -> Result<f64, RenderError> {
    let small = font.text_width(SMALL_REFERENCE_PT, text) as f64 / SMALL_REFERENCE_PT as f64;
    let large = font.text_width(LARGE_REFERENCE_PT, text) as f64 / LARGE_REFERENCE_PT as f64;
    let k = (small + large) / 2.0;

    if !k.is_finite() || k <= 0.0 {
        return Err(RenderError::Unmeasurable {
            text: text.to_string(),
        });
    }
    Ok(k)
}

/// Point size that makes the caption span `TEXT_WIDTH_FRACTION` of the image width.
pub fn target_font_size(image_width: u32, mean_glyph_width: f64) -> u32 {
    let size = image_width as f64 * TEXT_WIDTH_FRACTION / mean_glyph_width;
    size.clamp(MIN_FONT_SIZE_PT as f64, MAX_FONT_SIZE_PT as f64) as u32
}

/// Splits `text` into one or two lines.
///
/// Only splits when the full text is wider than the image, and then by word
/// count: the first `words / 2` words go on line one.
pub fn wrap_lines(font: &dyn GlyphSource, size: u32, text: &str, image_width: u32) -> Vec<String> {
    if font.text_width(size, text) <= image_width as i32 {
        return vec![text.to_string()];
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < 2 {
        return vec![text.to_string()];
    }

    let n = words.len() / 2;
    vec![words[..n].join(" "), words[n..].join(" ")]
}

pub fn text_color_for(mean_luminosity: f64) -> TextColor {
    if mean_luminosity >= BRIGHT_BACKGROUND {
        TextColor::Black
    } else {
        TextColor::White
    }
}

/// Mean normalized luma of the band the caption will sit on.
///
/// Rows `i` in `[margin, margin + 80)` map to image row `height - i`. Samples that
/// land outside the image count as black; the mean is always over the full band.
pub fn mean_band_luminosity(image: &RgbaImage) -> f64 {
    let (width, height) = image.dimensions();
    let bottom = (BOTTOM_MARGIN * height as f64) as i64;
    let top = bottom + LUMINOSITY_BAND_PX;

    let mut total = 0.0_f64;
    for i in bottom..top {
        let y = height as i64 - i;
        if y < 0 || y >= height as i64 {
            continue;
        }
        for x in 0..width {
            total += luma(image.get_pixel(x, y as u32));
        }
    }

    let samples = (top - bottom) as f64 * width as f64;
    if samples == 0.0 {
        return 0.0;
    }
    total / samples
}

/// Rec. 601 luma of a pixel, channels normalized to 0–1 and premultiplied by alpha.
fn luma(pixel: &Rgba<u8>) -> f64 {
    let [r, g, b, a] = pixel.0;
    let alpha = a as f64 / 255.0;
    (0.2989 * r as f64 + 0.5870 * g as f64 + 0.1140 * b as f64) / 255.0 * alpha
}

/// Positions each line of `plan`, bottom line first in the computation but
/// returned in reading order.
pub fn place_lines(
    plan: &LayoutPlan,
    font: &dyn GlyphSource,
    image_width: u32,
    image_height: u32,
) -> Vec<LinePlacement> {
    let margin = (BOTTOM_MARGIN * image_height as f64) as i32;
    let mut y_offset = 0;
    let mut placements = Vec::with_capacity(plan.lines.len());

    for line in plan.lines.iter().rev() {
        let width = font.text_width(plan.font_size_pt, line);
        let x = ((image_width as f64 - width as f64) / 2.0) as i32;
        let baseline = image_height as i32 - margin - y_offset;
        y_offset += font.text_height(plan.font_size_pt, line);

        placements.push(LinePlacement {
            text: line.clone(),
            x,
            baseline,
            width,
        });
    }

    placements.reverse();
    placements
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
