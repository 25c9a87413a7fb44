//! Glyph compositing.
//!
//! Copies the source into a fresh RGBA buffer and draws each planned line onto it
//! with the plan's solid color. Coverage from the rasterizer is used as alpha;
//! there is no stroke or outline.

use image::{DynamicImage, Rgba, RgbaImage};
use tracing::debug;

use crate::caption::font::{GlyphBitmap, GlyphSource};
use crate::caption::layout::{place_lines, plan_layout, LinePlacement};
use crate::caption::RenderError;

/// Renders `text` onto a copy of `source`. The source is never modified.
pub fn render_caption(
    source: &DynamicImage,
    font: &dyn GlyphSource,
    text: &str,
) -> Result<RgbaImage, RenderError> {
    let mut out = source.to_rgba8();
    let plan = plan_layout(&out, font, text)?;
    let (width, height) = out.dimensions();

    debug!(
        size_pt = plan.font_size_pt,
        lines = plan.lines.len(),
        color = ?plan.text_color,
        "Caption layout planned"
    );

    let color = plan.text_color.rgba();
    for placement in place_lines(&plan, font, width, height) {
        draw_line(&mut out, font, plan.font_size_pt, &placement, color);
    }

    Ok(out)
}

fn draw_line(
    out: &mut RgbaImage,
    font: &dyn GlyphSource,
    size: u32,
    placement: &LinePlacement,
    color: Rgba<u8>,
) {
    let size = size as f32;
    let mut pen = placement.x as f32;
    let mut prev: Option<char> = None;

    for c in placement.text.chars() {
        if let Some(p) = prev {
            pen += font.kerning(p, c, size);
        }

        let glyph = font.rasterize(c, size);
        let left = pen.round() as i32 + glyph.xmin;
        let top = placement.baseline - glyph.height as i32 - glyph.ymin;
        blend_glyph(out, &glyph, left, top, color);

        pen += font.advance_width(c, size);
        prev = Some(c);
    }
}

/// Alpha-blends `color` into `out` through the glyph's coverage, clipping at the edges.
fn blend_glyph(out: &mut RgbaImage, glyph: &GlyphBitmap, left: i32, top: i32, color: Rgba<u8>) {
    let (width, height) = out.dimensions();

    for row in 0..glyph.height {
        let y = top + row as i32;
        if y < 0 || y >= height as i32 {
            continue;
        }
        for col in 0..glyph.width {
            let x = left + col as i32;
            if x < 0 || x >= width as i32 {
                continue;
            }
            let coverage = glyph.coverage[row * glyph.width + col];
            if coverage == 0 {
                continue;
            }

            let alpha = coverage as f32 / 255.0;
            let pixel = out.get_pixel_mut(x as u32, y as u32);
            for channel in 0..4 {
                let under = pixel.0[channel] as f32;
                let over = color.0[channel] as f32;
                pixel.0[channel] = (over * alpha + under * (1.0 - alpha)).round() as u8;
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
