//! Offscreen text rasterization into an RGBA bitmap.

use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use image::RgbaImage;

use super::{Font, FontSystem};
use crate::color::Color;
use crate::error::{RenderError, Result};

/// Bitmap height as a multiple of the font size.
pub const LINE_HEIGHT_FACTOR: f32 = 1.5;
/// Baseline position as a fraction of the bitmap height.
pub const BASELINE_FRACTION: f32 = 0.75;
/// Largest text bitmap edge, in pixels. Matches the common GPU 2D texture
/// limit.
pub const MAX_TEXT_DIMENSION: u32 = 16_384;

/// Rasterizes one line of text in `color` (straight alpha).
///
/// The bitmap is `ceil(measured width) × ceil(1.5 · size)` with the baseline
/// at 75% of its height. Unknown fonts log a warning and yield a 1×1
/// transparent bitmap. Bitmaps wider or taller than [`MAX_TEXT_DIMENSION`]
/// fail with [`RenderError::InvalidSize`] before any pixels are allocated.
pub fn rasterize_text(fonts: &FontSystem, text: &str, font: Font, color: Color) -> Result<RgbaImage> {
    let size = if font.size.is_finite() && font.size > 0.0 { font.size } else { 1.0 };
    let height = (size * LINE_HEIGHT_FACTOR).ceil().max(1.0);
    check_extent(1.0, height)?;

    let Some(face) = fonts.get(font.id) else {
        log::warn!("unknown font {:?}; drawing nothing for \"{text}\"", font.id);
        return Ok(RgbaImage::new(1, 1));
    };

    let width = fonts.measure_text(text, Font::new(font.id, size)).x.ceil().max(1.0);
    check_extent(width, height)?;
    let (width, height) = (width as u32, height as u32);

    let ascent = face
        .horizontal_line_metrics(size)
        .map(|m| m.ascent)
        .unwrap_or(size * 0.8);
    let baseline = height as f32 * BASELINE_FRACTION;

    let mut layout: Layout<()> = Layout::new(CoordinateSystem::PositiveYDown);
    layout.reset(&LayoutSettings {
        y: baseline - ascent,
        ..LayoutSettings::default()
    });
    layout.append(&[face], &TextStyle::new(text, size, 0));

    let [r, g, b, a] = color.to_rgba8();
    let mut img = RgbaImage::from_pixel(width, height, image::Rgba([r, g, b, 0]));

    for glyph in layout.glyphs() {
        if !glyph.char_data.rasterize() || glyph.width == 0 || glyph.height == 0 {
            continue;
        }
        let (metrics, coverage) = face.rasterize_config(glyph.key);
        let gx = glyph.x.round() as i64;
        let gy = glyph.y.round() as i64;

        for row in 0..metrics.height {
            for col in 0..metrics.width {
                let cov = coverage[row * metrics.width + col];
                if cov == 0 {
                    continue;
                }
                let (px, py) = (gx + col as i64, gy + row as i64);
                if px < 0 || py < 0 || px >= width as i64 || py >= height as i64 {
                    continue;
                }
                let alpha = (cov as u16 * a as u16 / 255) as u8;
                let pixel = img.get_pixel_mut(px as u32, py as u32);
                // Overlapping glyphs keep the stronger coverage.
                pixel.0[3] = pixel.0[3].max(alpha);
            }
        }
    }

    Ok(img)
}

fn check_extent(width: f32, height: f32) -> Result<()> {
    let max = MAX_TEXT_DIMENSION as f32;
    if width > max || height > max {
        log::warn!("text bitmap {width}x{height} exceeds {MAX_TEXT_DIMENSION}px");
        return Err(RenderError::InvalidSize { width, height });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::FontId;

    #[test]
    fn unknown_font_is_a_transparent_pixel() {
        let fonts = FontSystem::new();
        let img = rasterize_text(&fonts, "hi", Font::new(FontId(0), 16.0), Color::WHITE).unwrap();
        assert_eq!(img.dimensions(), (1, 1));
        assert_eq!(img.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn huge_sizes_are_rejected_before_allocating() {
        let fonts = FontSystem::new();
        let err = rasterize_text(&fonts, "W", Font::new(FontId(0), 1e7), Color::WHITE).unwrap_err();
        assert!(matches!(err, RenderError::InvalidSize { .. }));
    }

    /// First face found at the usual Linux install paths.
    fn system_face(fonts: &mut FontSystem) -> Option<FontId> {
        [
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/noto/NotoSans-Regular.ttf",
            "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
        ]
        .iter()
        .find_map(|p| fonts.load_font_file(p).ok())
    }

    #[test]
    fn glyphs_sit_on_the_baseline() {
        let mut fonts = FontSystem::new();
        let Some(id) = system_face(&mut fonts) else {
            eprintln!("no system font installed; skipping");
            return;
        };

        let size = 20.0;
        let img = rasterize_text(&fonts, "HI", Font::new(id, size), Color::WHITE).unwrap();
        assert_eq!(img.height(), (size * LINE_HEIGHT_FACTOR).ceil() as u32);
        assert!(img.width() > 1);

        let baseline = (img.height() as f32 * BASELINE_FRACTION).ceil() as u32;
        let lit: Vec<(u32, u32)> = img
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[3] > 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!lit.is_empty());
        // Capitals have no descenders.
        assert!(lit.iter().all(|&(_, y)| y <= baseline), "ink below baseline row {baseline}");
        // Cap height reaches well above the baseline.
        let top = lit.iter().map(|&(_, y)| y).min().unwrap();
        assert!(top < baseline - (size * 0.5) as u32);
    }

    #[test]
    fn oversized_strings_are_rejected() {
        let mut fonts = FontSystem::new();
        let Some(id) = system_face(&mut fonts) else { return };

        let text = "W".repeat(2000);
        let err = rasterize_text(&fonts, &text, Font::new(id, 20.0), Color::WHITE).unwrap_err();
        assert!(matches!(err, RenderError::InvalidSize { .. }));
    }
}
