//! Sprite placement matrices.
//!
//! A sprite is drawn as the unit quad (0,0)–(1,1). [`build_sprite_matrix`]
//! maps that quad to normalized device coordinates:
//!
//! ```text
//! M = N · T(x, y) · R(θ) · S(w·sx, h·sy) · T(-ox, -oy)
//! ```
//!
//! where `N` maps logical pixels to NDC with +Y flipped up. Everything left of
//! `N` happens in pixel space, so rotation is aspect-correct and a positive
//! angle turns clockwise on screen.

use crate::geometry::{Vec2, Viewport};

/// 3×3 affine matrix, column-major.
///
/// Only the first two rows carry information; the third is always `0 0 1`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Affine2 {
    pub m: [f32; 9],
}

impl Default for Affine2 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine2 {
    pub const IDENTITY: Affine2 = Affine2 {
        m: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
    };

    #[inline]
    pub const fn identity() -> Self {
        Self::IDENTITY
    }

    /// `x' = a·x + c·y + tx`, `y' = b·x + d·y + ty`.
    #[inline]
    pub const fn from_parts(a: f32, b: f32, c: f32, d: f32, tx: f32, ty: f32) -> Self {
        Self {
            m: [a, b, 0.0, c, d, 0.0, tx, ty, 1.0],
        }
    }

    #[inline]
    pub const fn translation(tx: f32, ty: f32) -> Self {
        Self::from_parts(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    #[inline]
    pub const fn scale(sx: f32, sy: f32) -> Self {
        Self::from_parts(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Rotation in a y-down frame: positive angles turn +X toward +Y.
    #[inline]
    pub fn rotation(radians: f32) -> Self {
        let (s, c) = radians.sin_cos();
        Self::from_parts(c, s, -s, c, 0.0, 0.0)
    }

    /// Logical pixels (top-left origin, +Y down) to NDC (+Y up).
    pub fn pixel_to_ndc(viewport: Viewport) -> Self {
        if !viewport.is_valid() {
            return Self::scale(0.0, 0.0);
        }
        Self::from_parts(
            2.0 / viewport.width,
            0.0,
            0.0,
            -2.0 / viewport.height,
            -1.0,
            1.0,
        )
    }

    /// NDC to backing-store pixels of `width × height`.
    pub fn ndc_to_pixels(width: f32, height: f32) -> Self {
        Self::from_parts(
            width * 0.5,
            0.0,
            0.0,
            -height * 0.5,
            width * 0.5,
            height * 0.5,
        )
    }

    /// Matrix product `self · rhs` (rhs is applied first).
    pub fn multiply(self, rhs: Affine2) -> Affine2 {
        let a = &self.m;
        let b = &rhs.m;
        let mut out = [0.0f32; 9];
        for col in 0..3 {
            for row in 0..3 {
                out[col * 3 + row] = (0..3).map(|k| a[k * 3 + row] * b[col * 3 + k]).sum();
            }
        }
        Affine2 { m: out }
    }

    /// Applies `self` first, then `next`.
    #[inline]
    pub fn then(self, next: Affine2) -> Affine2 {
        next.multiply(self)
    }

    #[inline]
    pub fn apply(&self, p: Vec2) -> Vec2 {
        let m = &self.m;
        Vec2::new(
            m[0] * p.x + m[3] * p.y + m[6],
            m[1] * p.x + m[4] * p.y + m[7],
        )
    }

    #[inline]
    pub fn column(&self, i: usize) -> [f32; 3] {
        [self.m[i * 3], self.m[i * 3 + 1], self.m[i * 3 + 2]]
    }

    /// Columns padded to `vec4` for WGSL `mat3x3<f32>` uniform layout.
    pub fn padded_columns(&self) -> [[f32; 4]; 3] {
        let c = |i: usize| {
            let [x, y, z] = self.column(i);
            [x, y, z, 0.0]
        };
        [c(0), c(1), c(2)]
    }
}

/// Fully resolved sprite placement in logical pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Pivot as a fraction of the scaled size; (0.5, 0.5) is the center.
    pub origin_x: f32,
    pub origin_y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl Placement {
    /// Unit quad to logical pixels.
    pub fn pixel_matrix(&self) -> Affine2 {
        Affine2::translation(-self.origin_x, -self.origin_y)
            .then(Affine2::scale(
                self.width * self.scale_x,
                self.height * self.scale_y,
            ))
            .then(Affine2::rotation(self.rotation))
            .then(Affine2::translation(self.x, self.y))
    }
}

/// Unit quad to NDC for one sprite draw. Recomputed per draw.
pub fn build_sprite_matrix(viewport: Viewport, placement: &Placement) -> Affine2 {
    placement
        .pixel_matrix()
        .then(Affine2::pixel_to_ndc(viewport))
}

/// The unit quad's corners in triangle-list order, matching [`quad_uvs`].
pub const UNIT_QUAD: [Vec2; 6] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(0.0, 1.0),
];

/// Texture coordinates for [`UNIT_QUAD`]; the unit quad is its own UV space.
#[inline]
pub fn quad_uvs() -> [[f32; 2]; 6] {
    UNIT_QUAD.map(Vec2::to_array)
}
