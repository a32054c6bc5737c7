use super::Vec2;

/// Drawable area in logical pixels.
///
/// All drawing coordinates are logical pixels with a top-left origin; the
/// backing store may be larger by the device pixel ratio.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }

    /// Logical pixel to normalized device coordinates (+Y up).
    ///
    /// A zero-sized viewport maps everything to the NDC origin.
    #[inline]
    pub fn to_ndc(self, p: Vec2) -> Vec2 {
        if !self.is_valid() {
            return Vec2::zero();
        }
        Vec2::new(
            p.x / self.width * 2.0 - 1.0,
            1.0 - p.y / self.height * 2.0,
        )
    }
}
