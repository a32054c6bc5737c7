use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::LocalBoxFuture;
use image::RgbaImage;

use crate::color::{normalize, Color, ColorInput};
use crate::config::RendererConfig;
use crate::error::{RenderError, Result};
use crate::geometry::{circle_triangles, line_triangles, rect_triangles, Circle, Line, Rect, Vec2, Viewport};
use crate::surface::{DisplaySurface, Host};
use crate::text::{rasterize_text, Font};
use crate::transform::{build_sprite_matrix, Affine2};

use super::{
    BackendKind, BatchSession, RenderStats, Renderer, RendererState, SpriteDraw, SpriteInfo,
    SpriteRegistry, SpriteRequest, SpriteSource,
};

/// The backend-specific half of a renderer.
///
/// Implementations only rasterize; gating, registries, batching and text are
/// handled by [`BackendRenderer`]. Geometry arrives tessellated in logical
/// pixels, sprite quads as unit-quad → NDC matrices.
pub trait RasterBackend: Default {
    type Texture;

    const KIND: BackendKind;

    /// Acquires the context/device for `surface` and builds pipelines.
    fn init<'a>(
        &'a mut self,
        surface: &'a DisplaySurface,
        config: &'a RendererConfig,
    ) -> LocalBoxFuture<'a, Result<()>>;

    /// Re-applies the surface's backing size to the render target.
    fn apply_size(&mut self, surface: &DisplaySurface) -> Result<()>;

    /// Opens a frame, clearing to `clear` if given.
    ///
    /// `Ok(false)` means the target is unavailable and the frame is skipped;
    /// draws until `end_frame` are then dropped.
    fn begin_frame(&mut self, surface: &DisplaySurface, clear: Option<Color>) -> Result<bool>;

    fn clear(&mut self, color: Color);

    /// Fills a triangle list given in logical pixels.
    fn fill_triangles(&mut self, viewport: Viewport, vertices: &[Vec2], color: Color);

    fn create_texture(&mut self, image: &RgbaImage, label: &str) -> Result<Self::Texture>;

    /// Releases a texture; deferred until the frame ends if one is open.
    fn destroy_texture(&mut self, texture: Self::Texture);

    fn draw_sprite(&mut self, texture: &Self::Texture, matrix: &Affine2);

    /// Draws every quad in one submission.
    fn draw_sprite_batch(&mut self, texture: &Self::Texture, quads: &[Affine2]);

    /// Finishes the frame opened by `begin_frame` (skipped or not) and
    /// releases every transient resource.
    fn end_frame(&mut self) -> Result<()>;

    fn transient_outstanding(&self) -> usize;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum FramePhase {
    Idle,
    Open,
    Skipped,
}

static TEXT_KEYS: AtomicU64 = AtomicU64::new(0);

fn next_text_key() -> String {
    format!("__text_{}", TEXT_KEYS.fetch_add(1, Ordering::Relaxed))
}

/// A [`Renderer`] over any [`RasterBackend`].
pub struct BackendRenderer<B: RasterBackend> {
    backend: B,
    surface: DisplaySurface,
    config: RendererConfig,
    state: RendererState,
    sprites: SpriteRegistry<B::Texture>,
    batch: Option<BatchSession>,
    frame: FramePhase,
    counters: RenderStats,
}

impl<B: RasterBackend> BackendRenderer<B> {
    /// Mounts on `host`. Fails with `Configuration` if the host is unusable.
    pub fn new(host: Arc<dyn Host>, config: RendererConfig) -> Result<Self> {
        Ok(Self::with_surface(DisplaySurface::mount(host)?, config))
    }

    pub fn with_surface(surface: DisplaySurface, config: RendererConfig) -> Self {
        Self {
            backend: B::default(),
            surface,
            config,
            state: RendererState::Uninitialized,
            sprites: SpriteRegistry::new(),
            batch: None,
            frame: FramePhase::Idle,
            counters: RenderStats::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.state == RendererState::Ready {
            Ok(())
        } else {
            Err(RenderError::NotReady {
                backend: B::KIND,
                state: self.state,
            })
        }
    }

    fn open_frame(&mut self, clear: Option<Color>) -> Result<()> {
        self.surface.poll_resize()?;
        if self.surface.take_dirty() {
            self.backend.apply_size(&self.surface)?;
        }

        self.frame = if self.backend.begin_frame(&self.surface, clear)? {
            FramePhase::Open
        } else {
            log::debug!("{}: target unavailable, skipping frame", B::KIND);
            FramePhase::Skipped
        };
        Ok(())
    }

    /// Opens a frame implicitly if needed; returns whether drawing is live.
    fn ensure_frame(&mut self) -> Result<bool> {
        if self.frame == FramePhase::Idle {
            self.open_frame(None)?;
        }
        Ok(self.frame == FramePhase::Open)
    }

    fn finish_frame(&mut self) -> Result<()> {
        let phase = std::mem::replace(&mut self.frame, FramePhase::Idle);
        match phase {
            FramePhase::Idle => {
                log::debug!("{}: end_frame without an open frame", B::KIND);
                Ok(())
            }
            FramePhase::Open => {
                self.backend.end_frame()?;
                self.counters.frames += 1;
                Ok(())
            }
            FramePhase::Skipped => self.backend.end_frame(),
        }
    }

    fn fill(&mut self, vertices: Vec<Vec2>, color: Color) -> Result<()> {
        if vertices.is_empty() || !self.ensure_frame()? {
            return Ok(());
        }
        self.backend
            .fill_triangles(self.surface.viewport(), &vertices, color);
        self.counters.draw_calls += 1;
        Ok(())
    }

    fn install_sprite(&mut self, name: &str, image: RgbaImage) -> Result<SpriteInfo> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidSize {
                width: width as f32,
                height: height as f32,
            });
        }

        let texture = self.backend.create_texture(&image, name)?;
        self.counters.uploads += 1;

        let info = SpriteInfo { width, height };
        if let Some(old) = self.sprites.insert(name, texture, info) {
            self.backend.destroy_texture(old);
        }
        log::debug!("{}: sprite \"{name}\" uploaded ({width}x{height})", B::KIND);
        Ok(info)
    }

    fn flush_batch(&mut self) -> Result<()> {
        let Some(session) = self.batch.take() else {
            return Ok(());
        };
        if session.is_empty() {
            log::debug!("{}: discarding empty batch for \"{}\"", B::KIND, session.sprite());
            return Ok(());
        }
        if !self.ensure_frame()? {
            return Ok(());
        }
        let Some(entry) = self.sprites.get(session.sprite()) else {
            log::warn!(
                "sprite \"{}\" was destroyed while batched; dropping {} quads",
                session.sprite(),
                session.len()
            );
            return Ok(());
        };

        self.backend.draw_sprite_batch(&entry.texture, session.quads());
        self.counters.batch_submissions += 1;
        self.counters.draw_calls += 1;
        Ok(())
    }
}

impl<B: RasterBackend> Drop for BackendRenderer<B> {
    fn drop(&mut self) {
        for texture in self.sprites.drain() {
            self.backend.destroy_texture(texture);
        }
    }
}

impl<B: RasterBackend> Renderer for BackendRenderer<B> {
    fn kind(&self) -> BackendKind {
        B::KIND
    }

    fn state(&self) -> RendererState {
        self.state
    }

    fn init(&mut self) -> LocalBoxFuture<'_, Result<()>> {
        Box::pin(async move {
            match self.state {
                RendererState::Ready => return Ok(()),
                RendererState::Failed => {
                    return Err(RenderError::Discarded { backend: B::KIND });
                }
                RendererState::Uninitialized | RendererState::Initializing => {}
            }

            self.state = RendererState::Initializing;
            log::debug!("{} renderer initializing", B::KIND);

            match self.backend.init(&self.surface, &self.config).await {
                Ok(()) => {
                    // init sized the target from the surface.
                    self.surface.take_dirty();
                    self.state = RendererState::Ready;
                    let (w, h) = self.surface.backing_size();
                    log::info!("{} renderer ready ({w}x{h} backing store)", B::KIND);
                    Ok(())
                }
                Err(e) => {
                    self.state = RendererState::Failed;
                    log::error!("{} renderer failed to initialize: {e}", B::KIND);
                    Err(e)
                }
            }
        })
    }

    fn surface(&self) -> &DisplaySurface {
        &self.surface
    }

    fn stats(&self) -> RenderStats {
        RenderStats {
            live_sprites: self.sprites.len(),
            transient_outstanding: self.backend.transient_outstanding(),
            ..self.counters
        }
    }

    fn set_size(&mut self, width: f32, height: f32) -> Result<()> {
        self.surface.set_size(width, height)
    }

    fn resize(&mut self) -> Result<()> {
        self.surface.resize()
    }

    fn set_auto_resize(&mut self, enabled: bool) {
        self.surface.set_auto_resize(enabled);
    }

    fn begin_frame(&mut self, clear: Option<ColorInput>) -> Result<()> {
        self.ensure_ready()?;
        let clear = clear.as_ref().map(normalize);

        if self.frame != FramePhase::Idle {
            log::warn!("{}: begin_frame while a frame is open; finishing it first", B::KIND);
            self.finish_frame()?;
        }
        self.open_frame(clear)
    }

    fn clear(&mut self, color: ColorInput) -> Result<()> {
        self.ensure_ready()?;
        let color = normalize(&color);
        if self.ensure_frame()? {
            self.backend.clear(color);
        }
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        self.ensure_ready()?;
        if self.batch.is_some() {
            log::warn!("{}: batch still open at end_frame; submitting it", B::KIND);
            self.flush_batch()?;
        }
        self.finish_frame()
    }

    fn normalize_color(&self, input: &ColorInput) -> Result<Color> {
        self.ensure_ready()?;
        Ok(normalize(input))
    }

    fn draw_rect(&mut self, rect: Rect, color: ColorInput) -> Result<()> {
        self.ensure_ready()?;
        self.fill(rect_triangles(rect), normalize(&color))
    }

    fn draw_circle(&mut self, circle: Circle, color: ColorInput) -> Result<()> {
        self.ensure_ready()?;
        let segments = self.config.circle_segments;
        self.fill(circle_triangles(circle, segments), normalize(&color))
    }

    fn draw_line(&mut self, line: Line, color: ColorInput) -> Result<()> {
        self.ensure_ready()?;
        self.fill(line_triangles(line), normalize(&color))
    }

    fn load_sprite(
        &mut self,
        name: &str,
        source: SpriteSource,
        overwrite: bool,
    ) -> Result<SpriteInfo> {
        self.ensure_ready()?;

        if !overwrite && let Some(info) = self.sprites.info(name) {
            return Ok(info);
        }

        let decoded = source.needs_decode();
        let image = source.decode()?;
        if decoded {
            self.counters.decodes += 1;
        }
        self.install_sprite(name, image)
    }

    fn load_sprites(&mut self, requests: Vec<SpriteRequest>) -> Result<Vec<SpriteInfo>> {
        self.ensure_ready()?;

        let mut order = Vec::with_capacity(requests.len());
        let mut seen = HashSet::new();
        let mut pending = Vec::new();
        for req in requests {
            order.push(req.name.clone());
            // Later duplicates resolve to the first request's result.
            if !seen.insert(req.name.clone()) {
                continue;
            }
            if self.sprites.contains(&req.name) && !req.overwrite {
                continue;
            }
            pending.push((req.name, req.source));
        }

        let decoded: Vec<(String, bool, Result<RgbaImage>)> = std::thread::scope(|scope| {
            let handles: Vec<_> = pending
                .into_iter()
                .map(|(name, source)| {
                    let needs_decode = source.needs_decode();
                    (name, needs_decode, scope.spawn(move || source.decode()))
                })
                .collect();

            handles
                .into_iter()
                .map(|(name, needs_decode, handle)| {
                    let result = handle.join().unwrap_or_else(|_| {
                        Err(RenderError::Configuration(format!(
                            "decoder for sprite \"{name}\" panicked"
                        )))
                    });
                    (name, needs_decode, result)
                })
                .collect()
        });

        let mut first_error = None;
        for (name, needs_decode, result) in decoded {
            let installed = result.and_then(|image| {
                if needs_decode {
                    self.counters.decodes += 1;
                }
                self.install_sprite(&name, image)
            });
            if let Err(e) = installed {
                log::warn!("failed to load sprite \"{name}\": {e}");
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        order
            .into_iter()
            .map(|name| {
                self.sprites
                    .info(&name)
                    .ok_or(RenderError::ResourceNotFound(name))
            })
            .collect()
    }

    fn draw_sprite(&mut self, name: &str, draw: &SpriteDraw) -> Result<()> {
        self.ensure_ready()?;

        let Some(info) = self.sprites.info(name) else {
            log::warn!("sprite \"{name}\" not found");
            return Ok(());
        };
        if !self.ensure_frame()? {
            return Ok(());
        }

        let matrix = build_sprite_matrix(self.surface.viewport(), &draw.resolve(info));
        if let Some(entry) = self.sprites.get(name) {
            self.backend.draw_sprite(&entry.texture, &matrix);
            self.counters.draw_calls += 1;
        }
        Ok(())
    }

    fn destroy_sprite(&mut self, name: &str) -> Result<()> {
        self.ensure_ready()?;
        if let Some(texture) = self.sprites.remove(name) {
            self.backend.destroy_texture(texture);
            log::debug!("{}: sprite \"{name}\" destroyed", B::KIND);
        }
        Ok(())
    }

    fn sprite_info(&self, name: &str) -> Option<SpriteInfo> {
        self.sprites.info(name)
    }

    fn begin_sprite_batch(&mut self, name: &str) -> Result<bool> {
        self.ensure_ready()?;
        if self.batch.is_some() {
            self.flush_batch()?;
        }

        let Some(info) = self.sprites.info(name) else {
            log::warn!("cannot batch unknown sprite \"{name}\"");
            return Ok(false);
        };
        self.batch = Some(BatchSession::new(name, info));
        Ok(true)
    }

    fn batch_sprite(&mut self, draw: &SpriteDraw) -> Result<()> {
        self.ensure_ready()?;
        let Some(session) = self.batch.as_mut() else {
            log::warn!("batch_sprite called without an open batch");
            return Ok(());
        };
        let matrix = build_sprite_matrix(self.surface.viewport(), &draw.resolve(session.info()));
        session.push(matrix);
        Ok(())
    }

    fn end_sprite_batch(&mut self) -> Result<()> {
        self.ensure_ready()?;
        self.flush_batch()
    }

    fn draw_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        color: ColorInput,
        font: &Font,
        name: Option<&str>,
    ) -> Result<String> {
        self.ensure_ready()?;

        let color = normalize(&color);
        let image = rasterize_text(&self.config.fonts, text, *font, color)?;
        let key = name.map_or_else(next_text_key, str::to_string);

        self.install_sprite(&key, image)?;
        self.draw_sprite(&key, &SpriteDraw::at(x, y))?;
        Ok(key)
    }
}
