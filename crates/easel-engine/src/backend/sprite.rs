use std::collections::HashMap;
use std::path::PathBuf;

use image::RgbaImage;

use crate::error::Result;
use crate::transform::Placement;

/// Where a sprite's pixels come from.
#[derive(Debug, Clone)]
pub enum SpriteSource {
    /// Image file on disk.
    Path(PathBuf),
    /// Encoded image bytes (PNG, JPEG, ...).
    Bytes(Vec<u8>),
    /// Already decoded pixels, straight alpha.
    Image(RgbaImage),
}

impl SpriteSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        SpriteSource::Path(path.into())
    }

    /// True when producing pixels requires an image decode.
    pub fn needs_decode(&self) -> bool {
        !matches!(self, SpriteSource::Image(_))
    }

    /// Produces straight-alpha RGBA8 pixels.
    pub fn decode(self) -> Result<RgbaImage> {
        Ok(match self {
            SpriteSource::Path(path) => image::open(&path)?.into_rgba8(),
            SpriteSource::Bytes(bytes) => image::load_from_memory(&bytes)?.into_rgba8(),
            SpriteSource::Image(img) => img,
        })
    }
}

impl From<RgbaImage> for SpriteSource {
    fn from(img: RgbaImage) -> Self {
        SpriteSource::Image(img)
    }
}

/// One entry of a `load_sprites` call.
#[derive(Debug, Clone)]
pub struct SpriteRequest {
    pub name: String,
    pub source: SpriteSource,
    pub overwrite: bool,
}

impl SpriteRequest {
    pub fn new(name: impl Into<String>, source: SpriteSource) -> Self {
        Self {
            name: name.into(),
            source,
            overwrite: false,
        }
    }
}

/// Native dimensions of a registered sprite.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SpriteInfo {
    pub width: u32,
    pub height: u32,
}

/// Placement options for one sprite draw.
///
/// `width`/`height` left unset (or non-positive) fall back to the sprite's
/// native size. The origin is a fraction of the scaled size and defaults to
/// the top-left corner.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SpriteDraw {
    pub x: f32,
    pub y: f32,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub origin_x: f32,
    pub origin_y: f32,
}

impl Default for SpriteDraw {
    fn default() -> Self {
        Self::at(0.0, 0.0)
    }
}

impl SpriteDraw {
    pub const fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            width: None,
            height: None,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            origin_x: 0.0,
            origin_y: 0.0,
        }
    }

    pub const fn size(mut self, width: f32, height: f32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub const fn rotation(mut self, radians: f32) -> Self {
        self.rotation = radians;
        self
    }

    pub const fn scale(mut self, sx: f32, sy: f32) -> Self {
        self.scale_x = sx;
        self.scale_y = sy;
        self
    }

    pub const fn origin(mut self, ox: f32, oy: f32) -> Self {
        self.origin_x = ox;
        self.origin_y = oy;
        self
    }

    /// Fills in native dimensions for unset or non-positive sizes.
    pub fn resolve(&self, info: SpriteInfo) -> Placement {
        let pick = |v: Option<f32>, native: u32| match v {
            Some(v) if v > 0.0 => v,
            _ => native as f32,
        };

        Placement {
            x: self.x,
            y: self.y,
            width: pick(self.width, info.width),
            height: pick(self.height, info.height),
            origin_x: self.origin_x,
            origin_y: self.origin_y,
            rotation: self.rotation,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
        }
    }
}

/// A backend texture plus its native size.
#[derive(Debug)]
pub struct SpriteEntry<T> {
    pub texture: T,
    pub info: SpriteInfo,
}

/// Name-keyed texture registry owned by one backend instance.
#[derive(Debug)]
pub struct SpriteRegistry<T> {
    entries: HashMap<String, SpriteEntry<T>>,
}

impl<T> Default for SpriteRegistry<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> SpriteRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&SpriteEntry<T>> {
        self.entries.get(name)
    }

    pub fn info(&self, name: &str) -> Option<SpriteInfo> {
        self.entries.get(name).map(|e| e.info)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registers `texture`, returning the texture it replaced.
    pub fn insert(&mut self, name: &str, texture: T, info: SpriteInfo) -> Option<T> {
        self.entries
            .insert(name.to_string(), SpriteEntry { texture, info })
            .map(|old| old.texture)
    }

    pub fn remove(&mut self, name: &str) -> Option<T> {
        self.entries.remove(name).map(|e| e.texture)
    }

    /// Removes everything, yielding the textures for release.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.entries.drain().map(|(_, e)| e.texture)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
