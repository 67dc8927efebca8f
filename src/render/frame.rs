//! Frame renderer
//!
//! Produces one video frame: chroma-key green background with the text
//! centered on it in a single color.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::pixelops::weighted_sum;
use rusttype::{point, Font, PositionedGlyph, Scale};

use super::fonts::FontBook;
use super::oscillator::oscillate;
use crate::settings::{RenderSettings, Resolution};

/// Pure green, for keying out downstream.
pub const CHROMA_GREEN: Rgb<u8> = Rgb([0, 255, 0]);

/// Frame height that maps to a font scale of 1.0.
const SCALE_REFERENCE_HEIGHT: f32 = 250.0;

/// Glyph pixel size at font scale 1.0.
const PX_PER_SCALE: f32 = 30.0;

/// Size and stroke derived from the frame height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub scale: f32,
    pub thickness: u32,
}

impl TextStyle {
    pub fn for_height(height: u32) -> Self {
        let scale = height as f32 / SCALE_REFERENCE_HEIGHT;
        Self {
            scale,
            thickness: ((scale * 2.0) as u32).max(1),
        }
    }

    fn glyph_scale(&self) -> Scale {
        Scale::uniform(self.scale * PX_PER_SCALE)
    }

    /// How far the stroke reaches before and after the glyph outline, per
    /// axis. Even thicknesses reach one pixel further right and down.
    fn stroke_reach(&self) -> (i32, i32) {
        let t = self.thickness.max(1) as i32;
        let before = (t - 1) / 2;
        (before, t - 1 - before)
    }

    /// Offsets of a disc `thickness` pixels across, on the pixel grid.
    ///
    /// The disc is centered between pixels when the thickness is even, so
    /// every thickness gives a distinct footprint.
    fn stroke_offsets(&self) -> Vec<(i32, i32)> {
        let (before, after) = self.stroke_reach();
        let center = (before + after) as f32 / 2.0;
        let radius = self.thickness.max(1) as f32 / 2.0;
        (-before..=after)
            .flat_map(|dy| (-before..=after).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| {
                let x = (dx + before) as f32 - center;
                let y = (dy + before) as f32 - center;
                x * x + y * y <= radius * radius
            })
            .collect()
    }
}

/// Measured text box: `width` from the left edge, `height` above the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextExtent {
    pub width: i32,
    pub height: i32,
}

/// Render the frame for `settings` at time `t` seconds.
///
/// This is the path shared by the live preview and the export.
pub fn compose(settings: &RenderSettings, fonts: &FontBook, t: f64) -> RgbImage {
    let color = oscillate(t, settings.speed, settings.color1, settings.color2);
    render_frame(
        fonts.font(settings.font),
        color,
        &settings.text,
        settings.resolution,
    )
}

/// Draw `text` in `color`, centered on a green frame of the given size.
///
/// Text wider than the frame runs off the edges.
pub fn render_frame(font: &Font<'_>, color: Rgb<u8>, text: &str, resolution: Resolution) -> RgbImage {
    let (w, h) = resolution.size();
    let mut frame = RgbImage::from_pixel(w, h, CHROMA_GREEN);

    let text = printable(text);
    if text.is_empty() {
        return frame;
    }

    let style = TextStyle::for_height(h);
    let glyphs = layout(font, &text, style.glyph_scale());
    let extent = measure_glyphs(&glyphs, &style);

    let tx = (w as i32 - extent.width).div_euclid(2);
    let ty = (h as i32 + extent.height).div_euclid(2);

    let coverage = coverage_mask(&glyphs, &style, tx, ty, w, h);
    for (pixel, Luma([a])) in frame.pixels_mut().zip(coverage.pixels()) {
        match *a {
            0 => {}
            255 => *pixel = color,
            a => {
                let alpha = a as f32 / 255.0;
                *pixel = weighted_sum(*pixel, color, 1.0 - alpha, alpha);
            }
        }
    }

    frame
}

/// Text box for `text` drawn on a frame `height` pixels tall.
pub fn measure_text(font: &Font<'_>, text: &str, height: u32) -> TextExtent {
    let text = printable(text);
    if text.is_empty() {
        return TextExtent::default();
    }
    let style = TextStyle::for_height(height);
    let glyphs = layout(font, &text, style.glyph_scale());
    measure_glyphs(&glyphs, &style)
}

/// Drop control characters; they have no glyphs worth drawing.
fn printable(text: &str) -> String {
    text.chars().filter(|c| !c.is_control()).collect()
}

/// Lay out on a baseline at y = 0, starting at x = 0.
fn layout<'f>(font: &'f Font<'f>, text: &str, scale: Scale) -> Vec<PositionedGlyph<'f>> {
    font.layout(text, scale, point(0.0, 0.0)).collect()
}

fn measure_glyphs(glyphs: &[PositionedGlyph<'_>], style: &TextStyle) -> TextExtent {
    let advance = glyphs
        .last()
        .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0);
    let ascent = glyphs
        .iter()
        .filter_map(|g| g.pixel_bounding_box())
        .map(|bb| -bb.min.y)
        .max()
        .unwrap_or(0)
        .max(0);

    let (before, after) = style.stroke_reach();
    TextExtent {
        width: advance.ceil() as i32 + before + after,
        height: ascent + before,
    }
}

/// Glyph coverage as an 8-bit mask the size of the frame.
///
/// Each glyph is stamped at every offset of the stroke disc and the maximum
/// coverage is kept, which thickens strokes without darkening antialiased
/// edges.
fn coverage_mask(
    glyphs: &[PositionedGlyph<'_>],
    style: &TextStyle,
    tx: i32,
    ty: i32,
    w: u32,
    h: u32,
) -> GrayImage {
    let mut mask = GrayImage::new(w, h);
    let offsets = style.stroke_offsets();
    let (before, _) = style.stroke_reach();

    let origin_x = tx + before;
    for glyph in glyphs {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, v| {
            if v <= 0.0 {
                return;
            }
            let v = (v.min(1.0) * 255.0).round() as u8;
            for &(dx, dy) in &offsets {
                let x = origin_x + bb.min.x + gx as i32 + dx;
                let y = ty + bb.min.y + gy as i32 + dy;
                if x < 0 || y < 0 || x >= w as i32 || y >= h as i32 {
                    continue;
                }
                let Luma([cell]) = mask.get_pixel_mut(x as u32, y as u32);
                *cell = (*cell).max(v);
            }
        });
    }

    mask
}
