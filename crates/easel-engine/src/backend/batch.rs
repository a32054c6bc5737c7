use crate::transform::{quad_uvs, Affine2, UNIT_QUAD};

use super::gpu::TexVertex;
use super::SpriteInfo;

/// An open accumulation of quads that share one sprite.
///
/// Quads are stored as unit-quad → NDC matrices in submission order.
#[derive(Debug, Clone)]
pub struct BatchSession {
    sprite: String,
    info: SpriteInfo,
    quads: Vec<Affine2>,
}

impl BatchSession {
    pub fn new(sprite: impl Into<String>, info: SpriteInfo) -> Self {
        Self {
            sprite: sprite.into(),
            info,
            quads: Vec::new(),
        }
    }

    pub fn sprite(&self) -> &str {
        &self.sprite
    }

    pub fn info(&self) -> SpriteInfo {
        self.info
    }

    pub fn push(&mut self, matrix: Affine2) {
        self.quads.push(matrix);
    }

    pub fn quads(&self) -> &[Affine2] {
        &self.quads
    }

    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }
}

/// Transforms every quad's corners on the CPU into one textured triangle list.
pub fn batch_vertices(quads: &[Affine2]) -> Vec<TexVertex> {
    let uvs = quad_uvs();
    let mut out = Vec::with_capacity(quads.len() * UNIT_QUAD.len());
    for m in quads {
        out.extend(UNIT_QUAD.iter().zip(uvs).map(|(corner, uv)| TexVertex {
            pos: m.apply(*corner).to_array(),
            uv,
        }));
    }
    out
}
