use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};

use crate::error::{RenderError, Result};
use crate::geometry::Vec2;

/// Opaque handle to a font loaded into a [`FontSystem`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FontId(pub(crate) usize);

/// A loaded face at a pixel size, as passed to `draw_text`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Font {
    pub id: FontId,
    /// Em size in logical pixels.
    pub size: f32,
}

impl Font {
    #[inline]
    pub const fn new(id: FontId, size: f32) -> Self {
        Self { id, size }
    }
}

/// Owns a collection of loaded fonts.
///
/// Fonts are immutable after loading. Load everything up front, then share
/// the system with renderers through `RendererConfig::fonts`.
#[derive(Default)]
pub struct FontSystem {
    fonts: Vec<fontdue::Font>,
}

impl std::fmt::Debug for FontSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontSystem")
            .field("fonts", &self.fonts.len())
            .finish()
    }
}

impl FontSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and stores a TrueType or OpenType font from raw bytes.
    pub fn load_font(&mut self, bytes: &[u8]) -> Result<FontId> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| RenderError::Font(e.to_string()))?;
        let id = FontId(self.fonts.len());
        self.fonts.push(font);
        log::debug!("loaded font {:?} ({} glyphs)", id, self.fonts[id.0].glyph_count());
        Ok(id)
    }

    /// Reads a font file from disk and loads it.
    pub fn load_font_file(&mut self, path: impl AsRef<std::path::Path>) -> Result<FontId> {
        let bytes = std::fs::read(path)?;
        self.load_font(&bytes)
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub(crate) fn get(&self, id: FontId) -> Option<&fontdue::Font> {
        self.fonts.get(id.0)
    }

    /// Pen extent of a single line of text, in logical pixels.
    ///
    /// Width is the pen position after the last glyph (advance-based, not the
    /// bitmap edge). Unknown fonts measure as zero width.
    #[must_use]
    pub fn measure_text(&self, text: &str, font: Font) -> Vec2 {
        let line_height = font.size * 1.2;
        let Some(face) = self.get(font.id) else {
            return Vec2::new(0.0, line_height);
        };

        let mut layout: Layout<()> = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings::default());
        layout.append(&[face], &TextStyle::new(text, font.size, 0));

        let w = layout
            .glyphs()
            .iter()
            .map(|g| {
                let m = face.metrics_indexed(g.key.glyph_index, font.size);
                (g.x - m.xmin as f32 + m.advance_width).max(0.0)
            })
            .fold(0.0f32, f32::max);

        Vec2::new(w, line_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_a_font_error() {
        let mut fonts = FontSystem::new();
        let err = fonts.load_font(b"not a font").unwrap_err();
        assert!(matches!(err, RenderError::Font(_)));
        assert!(fonts.is_empty());
    }

    #[test]
    fn unknown_font_measures_empty() {
        let fonts = FontSystem::new();
        let size = fonts.measure_text("hello", Font::new(FontId(3), 20.0));
        assert_eq!(size, Vec2::new(0.0, 24.0));
    }
}
