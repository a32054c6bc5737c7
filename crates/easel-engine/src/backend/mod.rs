//! The drawing contract and its four backends.
//!
//! Every backend implements [`Renderer`] through [`BackendRenderer`], which
//! owns the parts of the contract that must behave identically everywhere
//! (lifecycle gating, sprite registry, batching, text, counters). The
//! backend-specific half lives behind [`RasterBackend`]:
//!
//! - [`canvas`]: immediate-mode CPU rasterization into a `tiny_skia::Pixmap`;
//! - [`webgl`]: one uber-pipeline, one render pass and transient buffers per draw;
//! - [`webgl2`]: separate color/texture pipelines replayed from a per-frame arena;
//! - [`webgpu`]: one long-lived render pass per frame with per-draw bind groups.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::LocalBoxFuture;

use crate::color::{Color, ColorInput};
use crate::config::RendererConfig;
use crate::error::{RenderError, Result};
use crate::geometry::{Circle, Line, Rect};
use crate::surface::{DisplaySurface, Host};
use crate::text::Font;

mod batch;
mod lifecycle;
mod sprite;
mod stats;
mod transient;

pub mod canvas;
pub mod gpu;
pub mod webgl;
pub mod webgl2;
pub mod webgpu;

pub use batch::{batch_vertices, BatchSession};
pub use lifecycle::{BackendRenderer, RasterBackend};
pub use sprite::{SpriteDraw, SpriteInfo, SpriteRegistry, SpriteRequest, SpriteSource};
pub use stats::RenderStats;
pub use transient::{Release, TransientPool};

/// The four API classes a renderer can be built on.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BackendKind {
    Canvas2d,
    WebGl,
    WebGl2,
    WebGpu,
}

impl BackendKind {
    pub const ALL: [BackendKind; 4] = [
        BackendKind::Canvas2d,
        BackendKind::WebGl,
        BackendKind::WebGl2,
        BackendKind::WebGpu,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Canvas2d => "canvas2d",
            BackendKind::WebGl => "webgl",
            BackendKind::WebGl2 => "webgl2",
            BackendKind::WebGpu => "webgpu",
        }
    }

    /// True for the wgpu-backed kinds.
    pub fn is_gpu(self) -> bool {
        !matches!(self, BackendKind::Canvas2d)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown backend \"{0}\" (expected canvas2d, webgl, webgl2 or webgpu)")]
pub struct ParseBackendError(pub String);

impl FromStr for BackendKind {
    type Err = ParseBackendError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        BackendKind::ALL
            .into_iter()
            .find(|k| k.as_str() == lower)
            .ok_or_else(|| ParseBackendError(s.to_string()))
    }
}

/// Lifecycle of a renderer instance.
///
/// `Failed` is terminal: the instance must be discarded.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RendererState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

/// The uniform drawing contract.
///
/// Coordinates are logical pixels, top-left origin. Everything except the
/// surface accessors and [`init`](Renderer::init) returns
/// [`RenderError::NotReady`] until the renderer is `Ready`, and then mutates
/// nothing.
pub trait Renderer {
    fn kind(&self) -> BackendKind;

    fn state(&self) -> RendererState;

    /// Acquires the context or device and builds pipelines.
    ///
    /// Completes immediately once `Ready`; errors forever after a failure.
    fn init(&mut self) -> LocalBoxFuture<'_, Result<()>>;

    fn surface(&self) -> &DisplaySurface;

    fn stats(&self) -> RenderStats;

    // ── surface ───────────────────────────────────────────────────────────

    /// Sets the logical size. Allowed before `Ready`.
    fn set_size(&mut self, width: f32, height: f32) -> Result<()>;

    /// Re-reads the host size and pixel ratio. Allowed before `Ready`.
    fn resize(&mut self) -> Result<()>;

    /// Follows host resizes through a revocable subscription.
    fn set_auto_resize(&mut self, enabled: bool);

    // ── frame ─────────────────────────────────────────────────────────────

    fn begin_frame(&mut self, clear: Option<ColorInput>) -> Result<()>;

    fn clear(&mut self, color: ColorInput) -> Result<()>;

    fn end_frame(&mut self) -> Result<()>;

    fn normalize_color(&self, input: &ColorInput) -> Result<Color>;

    // ── primitives ────────────────────────────────────────────────────────

    fn draw_rect(&mut self, rect: Rect, color: ColorInput) -> Result<()>;

    fn draw_circle(&mut self, circle: Circle, color: ColorInput) -> Result<()>;

    fn draw_line(&mut self, line: Line, color: ColorInput) -> Result<()>;

    // ── sprites ───────────────────────────────────────────────────────────

    /// Decodes and uploads an image under `name`.
    ///
    /// Memoized: an existing name without `overwrite` returns the registered
    /// info without decoding or uploading.
    fn load_sprite(&mut self, name: &str, source: SpriteSource, overwrite: bool)
    -> Result<SpriteInfo>;

    /// Loads several sprites, decoding distinct names in parallel.
    fn load_sprites(&mut self, requests: Vec<SpriteRequest>) -> Result<Vec<SpriteInfo>>;

    /// Unknown names log a warning and draw nothing.
    fn draw_sprite(&mut self, name: &str, draw: &SpriteDraw) -> Result<()>;

    /// Unknown names are ignored.
    fn destroy_sprite(&mut self, name: &str) -> Result<()>;

    fn sprite_info(&self, name: &str) -> Option<SpriteInfo>;

    // ── batches ───────────────────────────────────────────────────────────

    /// Opens a batch bound to `name`, flushing any open batch first.
    ///
    /// Returns `false` (and opens nothing) for unknown sprites.
    fn begin_sprite_batch(&mut self, name: &str) -> Result<bool>;

    fn batch_sprite(&mut self, draw: &SpriteDraw) -> Result<()>;

    /// Submits the open batch as one draw. Empty batches submit nothing.
    fn end_sprite_batch(&mut self) -> Result<()>;

    // ── text ──────────────────────────────────────────────────────────────

    /// Rasterizes `text` into a sprite and draws it with its top-left at
    /// `(x, y)`. Returns the sprite key: `name`, or a generated unique one.
    fn draw_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        color: ColorInput,
        font: &Font,
        name: Option<&str>,
    ) -> Result<String>;
}

/// Builds an uninitialized renderer of `kind` mounted on `host`.
///
/// Fails with [`RenderError::Configuration`] if the host is unusable. Call
/// [`Renderer::init`] before drawing.
pub fn create_renderer(
    kind: BackendKind,
    host: Arc<dyn Host>,
    config: RendererConfig,
) -> Result<Box<dyn Renderer>> {
    let surface = DisplaySurface::mount(host)?;
    log::debug!("creating {kind} renderer");

    Ok(match kind {
        BackendKind::Canvas2d => Box::new(canvas::CanvasRenderer::with_surface(surface, config)),
        BackendKind::WebGl => Box::new(webgl::WebGlRenderer::with_surface(surface, config)),
        BackendKind::WebGl2 => Box::new(webgl2::WebGl2Renderer::with_surface(surface, config)),
        BackendKind::WebGpu => Box::new(webgpu::WebGpuRenderer::with_surface(surface, config)),
    })
}

impl From<ParseBackendError> for RenderError {
    fn from(e: ParseBackendError) -> Self {
        RenderError::Configuration(e.to_string())
    }
}
