use super::Vec2;

/// Axis-aligned rectangle in logical pixels (top-left origin).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    #[inline]
    pub fn max(self) -> Vec2 {
        self.origin + self.size
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.size.x <= 0.0 || self.size.y <= 0.0
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.origin.is_finite() && self.size.is_finite()
    }

    /// Flips negative extents so width/height are non-negative.
    #[inline]
    pub fn normalized(self) -> Self {
        let Vec2 { mut x, mut y } = self.origin;
        let Vec2 { x: mut w, y: mut h } = self.size;

        if w < 0.0 {
            x += w;
            w = -w;
        }
        if h < 0.0 {
            y += h;
            h = -h;
        }

        Rect::new(x, y, w, h)
    }
}

/// Filled circle in logical pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Circle {
    pub center: Vec2,
    pub radius: f32,
}

impl Circle {
    #[inline]
    pub const fn new(cx: f32, cy: f32, radius: f32) -> Self {
        Self {
            center: Vec2::new(cx, cy),
            radius,
        }
    }
}

/// Straight segment drawn as a quad of `width` logical pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Line {
    pub from: Vec2,
    pub to: Vec2,
    pub width: f32,
}

impl Line {
    pub const DEFAULT_WIDTH: f32 = 1.0;

    #[inline]
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            from: Vec2::new(x1, y1),
            to: Vec2::new(x2, y2),
            width: Self::DEFAULT_WIDTH,
        }
    }

    #[inline]
    pub const fn with_width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }
}
