//! Immediate-mode CPU backend over a `tiny_skia::Pixmap`.
//!
//! Every call rasterizes straight into the backing store; there is nothing to
//! submit and nothing transient.

use futures::future::LocalBoxFuture;
use image::RgbaImage;
use tiny_skia::{FillRule, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Transform};

use crate::color::Color;
use crate::config::RendererConfig;
use crate::error::{RenderError, Result};
use crate::geometry::{Vec2, Viewport};
use crate::surface::DisplaySurface;
use crate::transform::Affine2;

use super::{BackendKind, BackendRenderer, RasterBackend};

pub type CanvasRenderer = BackendRenderer<CanvasBackend>;

#[derive(Debug, Default)]
pub struct CanvasBackend {
    /// `None` while the backing store is zero-sized.
    pixmap: Option<Pixmap>,
}

impl CanvasBackend {
    /// The backing store, premultiplied.
    pub fn pixels(&self) -> Option<&Pixmap> {
        self.pixmap.as_ref()
    }

    /// Copies the backing store out as straight-alpha RGBA.
    pub fn snapshot(&self) -> Option<RgbaImage> {
        let pixmap = self.pixmap.as_ref()?;
        let data = pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        RgbaImage::from_raw(pixmap.width(), pixmap.height(), data)
    }

    fn backing_transform(&self) -> Option<Affine2> {
        let pixmap = self.pixmap.as_ref()?;
        Some(Affine2::ndc_to_pixels(
            pixmap.width() as f32,
            pixmap.height() as f32,
        ))
    }
}

fn skia_color(color: Color) -> tiny_skia::Color {
    let c = color.clamped();
    tiny_skia::Color::from_rgba(c.r, c.g, c.b, c.a).unwrap_or(tiny_skia::Color::TRANSPARENT)
}

fn skia_transform(m: &Affine2) -> Transform {
    let m = &m.m;
    Transform::from_row(m[0], m[1], m[3], m[4], m[6], m[7])
}

impl RasterBackend for CanvasBackend {
    type Texture = Pixmap;

    const KIND: BackendKind = BackendKind::Canvas2d;

    fn init<'a>(
        &'a mut self,
        surface: &'a DisplaySurface,
        _config: &'a RendererConfig,
    ) -> LocalBoxFuture<'a, Result<()>> {
        Box::pin(async move { self.apply_size(surface) })
    }

    fn apply_size(&mut self, surface: &DisplaySurface) -> Result<()> {
        let (w, h) = surface.backing_size();
        // Resizing a canvas discards its contents.
        self.pixmap = Pixmap::new(w, h);
        Ok(())
    }

    fn begin_frame(&mut self, _surface: &DisplaySurface, clear: Option<Color>) -> Result<bool> {
        if let Some(color) = clear {
            self.clear(color);
        }
        Ok(self.pixmap.is_some())
    }

    fn clear(&mut self, color: Color) {
        if let Some(pixmap) = self.pixmap.as_mut() {
            pixmap.fill(skia_color(color));
        }
    }

    fn fill_triangles(&mut self, viewport: Viewport, vertices: &[Vec2], color: Color) {
        let Some(to_backing) = self.backing_transform() else { return };
        let Some(pixmap) = self.pixmap.as_mut() else { return };
        let m = Affine2::pixel_to_ndc(viewport).then(to_backing);

        let mut pb = PathBuilder::new();
        for tri in vertices.chunks_exact(3) {
            let [a, b, c] = [m.apply(tri[0]), m.apply(tri[1]), m.apply(tri[2])];
            pb.move_to(a.x, a.y);
            pb.line_to(b.x, b.y);
            pb.line_to(c.x, c.y);
            pb.close();
        }
        let Some(path) = pb.finish() else { return };

        let mut paint = Paint::default();
        paint.set_color(skia_color(color));
        paint.anti_alias = false;

        pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }

    fn create_texture(&mut self, image: &RgbaImage, _label: &str) -> Result<Pixmap> {
        let (w, h) = image.dimensions();
        let mut pixmap = Pixmap::new(w, h).ok_or(RenderError::InvalidSize {
            width: w as f32,
            height: h as f32,
        })?;

        for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
            let [r, g, b, a] = src.0;
            *dst = tiny_skia::ColorU8::from_rgba(r, g, b, a).premultiply();
        }
        Ok(pixmap)
    }

    fn destroy_texture(&mut self, texture: Pixmap) {
        drop(texture);
    }

    fn draw_sprite(&mut self, texture: &Pixmap, matrix: &Affine2) {
        let Some(to_backing) = self.backing_transform() else { return };
        let Some(pixmap) = self.pixmap.as_mut() else { return };

        // Texel space → unit quad → NDC → backing pixels.
        let m = Affine2::scale(1.0 / texture.width() as f32, 1.0 / texture.height() as f32)
            .then(*matrix)
            .then(to_backing);

        let paint = PixmapPaint {
            opacity: 1.0,
            blend_mode: tiny_skia::BlendMode::SourceOver,
            quality: FilterQuality::Bilinear,
        };
        pixmap.draw_pixmap(0, 0, texture.as_ref(), &paint, skia_transform(&m), None);
    }

    fn draw_sprite_batch(&mut self, texture: &Pixmap, quads: &[Affine2]) {
        for quad in quads {
            self.draw_sprite(texture, quad);
        }
    }

    fn end_frame(&mut self) -> Result<()> {
        Ok(())
    }

    fn transient_outstanding(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::{Renderer, SpriteDraw, SpriteSource};
    use crate::geometry::{Circle, Rect};
    use crate::surface::OffscreenHost;

    fn ready(w: f32, h: f32, dpr: f32) -> CanvasRenderer {
        let host = Arc::new(OffscreenHost::with_ratio(w, h, dpr));
        let mut r = CanvasRenderer::new(host, RendererConfig::default()).unwrap();
        pollster::block_on(r.init()).unwrap();
        r
    }

    fn pixel(r: &CanvasRenderer, x: u32, y: u32) -> [u8; 4] {
        r.backend().snapshot().unwrap().get_pixel(x, y).0
    }

    #[test]
    fn clear_fills_the_backing_store() {
        let mut r = ready(4.0, 4.0, 1.0);
        r.begin_frame(Some("#ff0000".into())).unwrap();
        r.end_frame().unwrap();
        assert_eq!(pixel(&r, 0, 0), [255, 0, 0, 255]);
        assert_eq!(pixel(&r, 3, 3), [255, 0, 0, 255]);
    }

    #[test]
    fn rect_covers_its_pixels_only() {
        let mut r = ready(20.0, 20.0, 1.0);
        r.begin_frame(Some("black".into())).unwrap();
        r.draw_rect(Rect::new(5.0, 5.0, 10.0, 10.0), [0, 255, 0].into()).unwrap();
        r.end_frame().unwrap();

        assert_eq!(pixel(&r, 10, 10), [0, 255, 0, 255]);
        assert_eq!(pixel(&r, 2, 2), [0, 0, 0, 255]);
        assert_eq!(pixel(&r, 17, 17), [0, 0, 0, 255]);
    }

    #[test]
    fn backing_store_scales_with_ratio() {
        let mut r = ready(10.0, 10.0, 2.0);
        assert_eq!(r.backend().pixels().map(|p| (p.width(), p.height())), Some((20, 20)));

        r.begin_frame(Some("black".into())).unwrap();
        r.draw_rect(Rect::new(5.0, 0.0, 5.0, 10.0), "white".into()).unwrap();
        r.end_frame().unwrap();

        assert_eq!(pixel(&r, 15, 10), [255, 255, 255, 255]);
        assert_eq!(pixel(&r, 5, 10), [0, 0, 0, 255]);
    }

    #[test]
    fn circle_center_is_filled() {
        let mut r = ready(32.0, 32.0, 1.0);
        r.begin_frame(Some("transparent".into())).unwrap();
        r.draw_circle(Circle::new(16.0, 16.0, 8.0), "blue".into()).unwrap();
        r.end_frame().unwrap();

        assert_eq!(pixel(&r, 16, 16), [0, 0, 255, 255]);
        assert_eq!(pixel(&r, 1, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn half_alpha_blends_straight() {
        let mut r = ready(2.0, 2.0, 1.0);
        r.begin_frame(Some("white".into())).unwrap();
        r.draw_rect(Rect::new(0.0, 0.0, 2.0, 2.0), [0.0, 0.0, 0.0, 0.5].into()).unwrap();
        r.end_frame().unwrap();

        let [red, _, _, a] = pixel(&r, 0, 0);
        assert_eq!(a, 255);
        assert!((126..=129).contains(&red), "got {red}");
    }

    #[test]
    fn centered_sprite_lands_on_its_position() {
        let mut r = ready(40.0, 40.0, 1.0);
        let img = RgbaImage::from_pixel(10, 10, image::Rgba([255, 0, 0, 255]));
        r.load_sprite("dot", SpriteSource::Image(img), false).unwrap();

        r.begin_frame(Some("black".into())).unwrap();
        r.draw_sprite("dot", &SpriteDraw::at(30.0, 10.0).origin(0.5, 0.5)).unwrap();
        r.end_frame().unwrap();

        assert_eq!(pixel(&r, 30, 10), [255, 0, 0, 255]);
        assert_eq!(pixel(&r, 27, 7), [255, 0, 0, 255]);
        assert_eq!(pixel(&r, 10, 30), [0, 0, 0, 255]);
    }

    #[test]
    fn batch_draws_every_quad() {
        let mut r = ready(30.0, 10.0, 1.0);
        let img = RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 255, 255]));
        r.load_sprite("tile", SpriteSource::Image(img), false).unwrap();

        r.begin_frame(Some("black".into())).unwrap();
        r.begin_sprite_batch("tile").unwrap();
        for x in [2.0, 12.0, 22.0] {
            r.batch_sprite(&SpriteDraw::at(x, 2.0).size(6.0, 6.0)).unwrap();
        }
        r.end_sprite_batch().unwrap();
        r.end_frame().unwrap();

        for x in [5, 15, 25] {
            assert_eq!(pixel(&r, x, 5), [0, 0, 255, 255]);
        }
        assert_eq!(pixel(&r, 10, 5), [0, 0, 0, 255]);
        assert_eq!(r.stats().batch_submissions, 1);
    }

    #[test]
    fn resize_reallocates_the_backing_store() {
        let mut r = ready(10.0, 10.0, 1.0);
        r.set_size(16.0, 8.0).unwrap();
        r.begin_frame(None).unwrap();
        r.end_frame().unwrap();
        assert_eq!(r.backend().pixels().map(|p| (p.width(), p.height())), Some((16, 8)));
    }

    #[test]
    fn zero_sized_surface_skips_frames() {
        let mut r = ready(10.0, 10.0, 1.0);
        r.set_size(0.0, 0.0).unwrap();
        r.begin_frame(Some("red".into())).unwrap();
        r.draw_rect(Rect::new(0.0, 0.0, 5.0, 5.0), "red".into()).unwrap();
        r.end_frame().unwrap();

        assert!(r.backend().pixels().is_none());
        assert_eq!(r.stats().frames, 0);
        assert_eq!(r.stats().draw_calls, 0);
    }
}
