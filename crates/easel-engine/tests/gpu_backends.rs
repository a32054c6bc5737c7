//! Offscreen frames on the wgpu backends.
//!
//! Hosts without a matching adapter skip: `init` must then fail cleanly and
//! leave the instance `Failed`.

use std::sync::Arc;

use easel_engine::geometry::{Circle, Line, Rect};
use easel_engine::{
    create_renderer, BackendKind, OffscreenHost, RenderError, Renderer, RendererConfig,
    RendererState, SpriteDraw,
};
use image::{Rgba, RgbaImage};

/// Initializes `kind` on an offscreen host, or returns `None` if the host
/// lacks the API.
fn ready(kind: BackendKind) -> Option<Box<dyn Renderer>> {
    let host = Arc::new(OffscreenHost::with_ratio(64.0, 48.0, 1.5));
    let mut r = create_renderer(kind, host, RendererConfig::default()).unwrap();

    match pollster::block_on(r.init()) {
        Ok(()) => Some(r),
        Err(e) => {
            log::warn!("skipping {kind}: {e}");
            assert_eq!(r.state(), RendererState::Failed);
            assert!(matches!(
                pollster::block_on(r.init()),
                Err(RenderError::Discarded { .. })
            ));
            None
        }
    }
}

fn full_frame(r: &mut dyn Renderer) {
    let tile = RgbaImage::from_pixel(8, 8, Rgba([200, 40, 40, 255]));
    r.load_sprite("tile", tile.into(), false).unwrap();

    r.begin_frame(Some("#102030".into())).unwrap();
    r.draw_rect(Rect::new(4.0, 4.0, 20.0, 10.0), "orange".into()).unwrap();
    r.draw_circle(Circle::new(40.0, 24.0, 8.0), [0.2, 0.4, 0.8, 0.5].into()).unwrap();
    r.draw_line(Line::new(0.0, 0.0, 64.0, 48.0).with_width(2.0), "white".into()).unwrap();
    r.draw_sprite("tile", &SpriteDraw::at(32.0, 24.0).rotation(0.5).origin(0.5, 0.5))
        .unwrap();

    assert!(r.begin_sprite_batch("tile").unwrap());
    for i in 0..10 {
        r.batch_sprite(&SpriteDraw::at(i as f32 * 6.0, 40.0).size(4.0, 4.0))
            .unwrap();
    }
    r.end_sprite_batch().unwrap();

    r.clear("black".into()).unwrap();
    r.draw_rect(Rect::new(0.0, 0.0, 8.0, 8.0), "red".into()).unwrap();
    r.end_frame().unwrap();
}

fn check_backend(kind: BackendKind) {
    let Some(mut r) = ready(kind) else { return };
    assert_eq!(r.kind(), kind);
    assert_eq!(r.surface().backing_size(), (96, 72));

    full_frame(r.as_mut());
    let stats = r.stats();
    assert_eq!(stats.frames, 1);
    assert_eq!(stats.draw_calls, 6);
    assert_eq!(stats.batch_submissions, 1);
    assert_eq!(stats.transient_outstanding, 0);

    // Resize between frames, then draw again.
    r.set_size(32.0, 32.0).unwrap();
    full_frame(r.as_mut());
    assert_eq!(r.stats().frames, 2);
    assert_eq!(r.stats().uploads, 1);
    assert_eq!(r.stats().transient_outstanding, 0);

    // Destroying mid-frame defers the release until the frame ends.
    r.begin_frame(None).unwrap();
    r.draw_sprite("tile", &SpriteDraw::at(0.0, 0.0)).unwrap();
    r.destroy_sprite("tile").unwrap();
    r.end_frame().unwrap();
    assert_eq!(r.stats().live_sprites, 0);
}

#[test_log::test]
fn webgl_offscreen_frames() {
    check_backend(BackendKind::WebGl);
}

#[test_log::test]
fn webgl2_offscreen_frames() {
    check_backend(BackendKind::WebGl2);
}

#[test_log::test]
fn webgpu_offscreen_frames() {
    check_backend(BackendKind::WebGpu);
}

#[test_log::test]
fn zero_sized_gpu_targets_skip_frames() {
    let Some(mut r) = ready(BackendKind::WebGpu) else { return };
    r.set_size(0.0, 0.0).unwrap();

    r.begin_frame(Some("red".into())).unwrap();
    r.draw_rect(Rect::new(0.0, 0.0, 4.0, 4.0), "blue".into()).unwrap();
    r.end_frame().unwrap();

    assert_eq!(r.stats().frames, 0);
    assert_eq!(r.stats().draw_calls, 0);
}

fn check_device_limits(kind: BackendKind) {
    let Some(mut r) = ready(kind) else { return };

    let wide = RgbaImage::new(40_000, 1);
    assert!(matches!(
        r.load_sprite("wide", wide.into(), false),
        Err(RenderError::InvalidSize { .. })
    ));
    assert_eq!(r.stats().uploads, 0);
    assert_eq!(r.stats().live_sprites, 0);

    // Oversized targets skip frames like zero-sized ones.
    r.set_size(40_000.0, 10.0).unwrap();
    r.begin_frame(Some("red".into())).unwrap();
    r.draw_rect(Rect::new(0.0, 0.0, 4.0, 4.0), "blue".into()).unwrap();
    r.end_frame().unwrap();
    assert_eq!(r.stats().frames, 0);
    assert_eq!(r.stats().draw_calls, 0);

    r.set_size(32.0, 32.0).unwrap();
    full_frame(r.as_mut());
    assert_eq!(r.stats().frames, 1);
}

#[test_log::test]
fn webgl_rejects_sizes_over_the_device_limit() {
    check_device_limits(BackendKind::WebGl);
}

#[test_log::test]
fn webgl2_rejects_sizes_over_the_device_limit() {
    check_device_limits(BackendKind::WebGl2);
}

#[test_log::test]
fn webgpu_rejects_sizes_over_the_device_limit() {
    check_device_limits(BackendKind::WebGpu);
}
