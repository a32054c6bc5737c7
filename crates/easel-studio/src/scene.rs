//! The demo scene, drawn identically on every backend.

use anyhow::Result;
use easel_engine::geometry::{Circle, Line, Rect};
use easel_engine::text::Font;
use easel_engine::{Renderer, SpriteDraw};
use image::{Rgba, RgbaImage};

const CHECKER: &str = "checker";
const TILE: &str = "tile";

/// 16×16 two-tone checkerboard.
fn checker() -> RgbaImage {
    RgbaImage::from_fn(16, 16, |x, y| {
        if (x / 4 + y / 4) % 2 == 0 {
            Rgba([240, 200, 60, 255])
        } else {
            Rgba([40, 40, 60, 255])
        }
    })
}

pub struct Scene {
    font: Option<Font>,
}

impl Scene {
    pub fn new(font: Option<Font>) -> Self {
        Self { font }
    }

    /// Uploads the scene's sprites. Safe to call again; loads are memoized.
    pub fn load(&self, r: &mut dyn Renderer) -> Result<()> {
        r.load_sprite(CHECKER, checker().into(), false)?;
        r.load_sprite(
            TILE,
            RgbaImage::from_pixel(4, 4, Rgba([90, 200, 255, 255])).into(),
            false,
        )?;
        Ok(())
    }

    /// Draws one frame at time `t` seconds.
    pub fn draw(&self, r: &mut dyn Renderer, t: f32) -> Result<()> {
        let (w, h) = r.surface().logical_size();

        r.begin_frame(Some("#1b1f2a".into()))?;

        for i in 0..8 {
            let x = i as f32 * w / 8.0;
            let shade = 40 + i as u8 * 20;
            r.draw_rect(Rect::new(x, h - 40.0, w / 8.0 - 4.0, 32.0), [shade, 80, 120].into())?;
        }

        r.draw_circle(
            Circle::new(w * 0.25, h * 0.4, 60.0 + 10.0 * t.sin()),
            "rgba(255, 99, 71, 0.8)".into(),
        )?;
        r.draw_line(
            Line::new(0.0, 0.0, w, h - 48.0).with_width(3.0),
            "#90e090".into(),
        )?;

        r.draw_sprite(
            CHECKER,
            &SpriteDraw::at(w * 0.65, h * 0.4)
                .size(128.0, 128.0)
                .origin(0.5, 0.5)
                .rotation(t),
        )?;

        if r.begin_sprite_batch(TILE)? {
            for i in 0..64 {
                let a = i as f32 / 64.0 * std::f32::consts::TAU + t * 0.5;
                r.batch_sprite(
                    &SpriteDraw::at(w * 0.65 + a.cos() * 110.0, h * 0.4 + a.sin() * 110.0)
                        .size(6.0, 6.0)
                        .origin(0.5, 0.5),
                )?;
            }
            r.end_sprite_batch()?;
        }

        if let Some(font) = &self.font {
            let label = format!("{} backend", r.kind());
            r.draw_text(
                &label,
                16.0,
                16.0,
                "white".into(),
                font,
                Some("title"),
            )?;
        }

        r.end_frame()?;
        Ok(())
    }
}
