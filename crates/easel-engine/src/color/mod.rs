//! Color normalization shared by every backend.
//!
//! Callers hand colors over in whatever shape they have (CSS text, numeric
//! tuples in either 0–1 or 0–255 range, keyed records). Backends only ever see
//! the canonical [`Color`]: straight alpha, every channel in `[0, 1]`.

mod css;
mod named;

/// Canonical straight-alpha RGBA color, channels in `[0, 1]`.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);

    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Straight sRGB bytes to a color.
    #[inline]
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::new(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        )
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Rounds to straight RGBA bytes.
    #[inline]
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    #[inline]
    pub fn to_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: self.a as f64,
        }
    }

    /// Replaces non-finite channels with 0 and clamps to `[0, 1]`.
    #[inline]
    pub fn clamped(self) -> Self {
        let c = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        Self::new(c(self.r), c(self.g), c(self.b), c(self.a))
    }
}

/// Every color shape the drawing contract accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorInput {
    /// Named color, hex, `rgb()`/`rgba()` or `transparent`.
    Text(String),
    /// Ordered `r, g, b`; alpha defaults to 1.
    Rgb([f32; 3]),
    /// Ordered `r, g, b, a`.
    Rgba([f32; 4]),
    /// Keyed record. Missing `a` defaults to 1.
    Keyed { r: f32, g: f32, b: f32, a: Option<f32> },
    /// Already canonical; only clamped.
    Color(Color),
}

impl ColorInput {
    pub fn keyed(r: f32, g: f32, b: f32, a: f32) -> Self {
        ColorInput::Keyed { r, g, b, a: Some(a) }
    }
}

impl From<&str> for ColorInput {
    fn from(s: &str) -> Self {
        ColorInput::Text(s.to_owned())
    }
}

impl From<String> for ColorInput {
    fn from(s: String) -> Self {
        ColorInput::Text(s)
    }
}

impl From<[f32; 3]> for ColorInput {
    fn from(v: [f32; 3]) -> Self {
        ColorInput::Rgb(v)
    }
}

impl From<[f32; 4]> for ColorInput {
    fn from(v: [f32; 4]) -> Self {
        ColorInput::Rgba(v)
    }
}

impl From<[u8; 3]> for ColorInput {
    fn from(v: [u8; 3]) -> Self {
        ColorInput::Rgb(v.map(f32::from))
    }
}

impl From<[u8; 4]> for ColorInput {
    fn from(v: [u8; 4]) -> Self {
        // Byte alpha is 0–255 while the numeric rule keeps alpha in 0–1.
        let [r, g, b, a] = v;
        ColorInput::Rgba([r as f32, g as f32, b as f32, a as f32 / 255.0])
    }
}

impl From<Color> for ColorInput {
    fn from(c: Color) -> Self {
        ColorInput::Color(c)
    }
}

/// Converts any accepted color shape to a canonical [`Color`].
///
/// Numeric forms: if the largest of r, g, b exceeds 1 all three are read as
/// 0–255, otherwise as 0–1. Alpha is always 0–1. Unparseable text yields
/// opaque black and a warning; this never fails.
pub fn normalize(input: &ColorInput) -> Color {
    match input {
        ColorInput::Text(s) => css::parse(s).unwrap_or_else(|| {
            log::warn!("could not parse color \"{s}\"; using opaque black");
            Color::BLACK
        }),
        ColorInput::Rgb([r, g, b]) => from_numeric(*r, *g, *b, 1.0),
        ColorInput::Rgba([r, g, b, a]) => from_numeric(*r, *g, *b, *a),
        ColorInput::Keyed { r, g, b, a } => from_numeric(*r, *g, *b, a.unwrap_or(1.0)),
        ColorInput::Color(c) => c.clamped(),
    }
}

fn from_numeric(r: f32, g: f32, b: f32, a: f32) -> Color {
    let finite = |v: f32| if v.is_finite() { v } else { 0.0 };
    let (r, g, b) = (finite(r), finite(g), finite(b));

    let scale = if r.max(g).max(b) > 1.0 { 1.0 / 255.0 } else { 1.0 };
    Color::new(r * scale, g * scale, b * scale, a).clamped()
}
