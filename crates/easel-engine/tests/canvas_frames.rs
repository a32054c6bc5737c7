//! End-to-end frames through the public API on the CPU backend.

use std::io::Cursor;
use std::sync::Arc;

use easel_engine::backend::canvas::CanvasRenderer;
use easel_engine::geometry::{Circle, Line, Rect};
use easel_engine::{
    create_renderer, BackendKind, OffscreenHost, RenderError, Renderer, RendererConfig,
    RendererState, SpriteDraw, SpriteRequest, SpriteSource,
};
use image::{ImageFormat, Rgba, RgbaImage};

fn canvas(w: f32, h: f32) -> (Arc<OffscreenHost>, CanvasRenderer) {
    let host = Arc::new(OffscreenHost::new(w, h));
    let mut r = CanvasRenderer::new(host.clone(), RendererConfig::default()).unwrap();
    pollster::block_on(r.init()).unwrap();
    (host, r)
}

fn png(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
    let mut bytes = Vec::new();
    RgbaImage::from_pixel(w, h, Rgba(px))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn pixel(r: &CanvasRenderer, x: u32, y: u32) -> [u8; 4] {
    r.backend().snapshot().unwrap().get_pixel(x, y).0
}

#[test_log::test]
fn operations_before_init_are_rejected_without_side_effects() {
    let host = Arc::new(OffscreenHost::new(32.0, 32.0));
    let mut r = create_renderer(BackendKind::Canvas2d, host, RendererConfig::default()).unwrap();
    assert_eq!(r.state(), RendererState::Uninitialized);

    let err = r.draw_rect(Rect::new(0.0, 0.0, 4.0, 4.0), "red".into()).unwrap_err();
    assert!(matches!(err, RenderError::NotReady { backend: BackendKind::Canvas2d, .. }));
    assert!(r.begin_frame(None).is_err());
    assert!(r.load_sprite("a", SpriteSource::Bytes(png(1, 1, [0; 4])), false).is_err());
    assert!(r.normalize_color(&"red".into()).is_err());
    assert_eq!(r.stats(), Default::default());

    // Surface operations are fine before init.
    r.set_size(64.0, 16.0).unwrap();
    assert_eq!(r.surface().backing_size(), (64, 16));

    pollster::block_on(r.init()).unwrap();
    assert_eq!(r.state(), RendererState::Ready);
    pollster::block_on(r.init()).unwrap();
}

#[test_log::test]
fn a_full_frame_renders_every_primitive() {
    let (_host, mut r) = canvas(40.0, 40.0);

    r.begin_frame(Some("#000".into())).unwrap();
    r.draw_rect(Rect::new(0.0, 0.0, 10.0, 10.0), "red".into()).unwrap();
    r.draw_circle(Circle::new(30.0, 30.0, 6.0), "lime".into()).unwrap();
    r.draw_line(Line::new(0.0, 20.0, 40.0, 20.0).with_width(4.0), "blue".into()).unwrap();
    r.end_frame().unwrap();

    assert_eq!(pixel(&r, 5, 5), [255, 0, 0, 255]);
    assert_eq!(pixel(&r, 30, 30), [0, 255, 0, 255]);
    assert_eq!(pixel(&r, 20, 20), [0, 0, 255, 255]);
    assert_eq!(pixel(&r, 20, 35), [0, 0, 0, 255]);

    let stats = r.stats();
    assert_eq!(stats.draw_calls, 3);
    assert_eq!(stats.frames, 1);
    assert_eq!(stats.transient_outstanding, 0);
}

#[test_log::test]
fn color_spellings_render_identically() {
    let (_host, mut r) = canvas(8.0, 2.0);
    let spellings = ["#ff8000", "rgb(255, 128, 0)", "#FF8000FF"];

    r.begin_frame(Some("black".into())).unwrap();
    for (i, c) in spellings.iter().enumerate() {
        r.draw_rect(Rect::new(i as f32 * 2.0, 0.0, 2.0, 2.0), (*c).into()).unwrap();
    }
    r.draw_rect(Rect::new(6.0, 0.0, 2.0, 2.0), [255u8, 128, 0].into()).unwrap();
    r.end_frame().unwrap();

    let expected = pixel(&r, 0, 0);
    for x in [2, 4, 6] {
        assert_eq!(pixel(&r, x, 1), expected, "column {x}");
    }
}

#[test_log::test]
fn sprite_loads_are_memoized_by_name() {
    let (_host, mut r) = canvas(16.0, 16.0);
    let bytes = png(4, 2, [255, 255, 255, 255]);

    let first = r.load_sprite("hero", SpriteSource::Bytes(bytes), false).unwrap();
    let again = r.load_sprite("hero", SpriteSource::Bytes(png(8, 8, [0; 4])), false).unwrap();
    assert_eq!(first, again);
    assert_eq!((first.width, first.height), (4, 2));
    assert_eq!(r.stats().decodes, 1);
    assert_eq!(r.stats().uploads, 1);

    let replaced = r.load_sprite("hero", SpriteSource::Bytes(png(8, 8, [0; 4])), true).unwrap();
    assert_eq!((replaced.width, replaced.height), (8, 8));
    assert_eq!(r.stats().live_sprites, 1);
}

#[test_log::test]
fn bulk_loads_resolve_every_request_in_order() {
    let (_host, mut r) = canvas(16.0, 16.0);
    let infos = r
        .load_sprites(vec![
            SpriteRequest::new("a", SpriteSource::Bytes(png(2, 3, [1, 2, 3, 255]))),
            SpriteRequest::new("b", SpriteSource::Bytes(png(5, 1, [1, 2, 3, 255]))),
            SpriteRequest::new("a", SpriteSource::Bytes(png(9, 9, [1, 2, 3, 255]))),
        ])
        .unwrap();

    let dims: Vec<_> = infos.iter().map(|i| (i.width, i.height)).collect();
    assert_eq!(dims, vec![(2, 3), (5, 1), (2, 3)]);
    assert_eq!(r.stats().decodes, 2);
}

#[test_log::test]
fn empty_batches_submit_nothing() {
    let (_host, mut r) = canvas(16.0, 16.0);
    r.load_sprite("tile", RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255])).into(), false)
        .unwrap();

    r.begin_frame(None).unwrap();
    assert!(r.begin_sprite_batch("tile").unwrap());
    r.end_sprite_batch().unwrap();
    assert!(!r.begin_sprite_batch("missing").unwrap());
    r.end_frame().unwrap();

    assert_eq!(r.stats().batch_submissions, 0);
    assert_eq!(r.stats().draw_calls, 0);
}

#[test_log::test]
fn rotated_sprite_keeps_its_center() {
    let (_host, mut r) = canvas(40.0, 40.0);
    r.load_sprite("bar", RgbaImage::from_pixel(20, 4, Rgba([255, 255, 0, 255])).into(), false)
        .unwrap();

    r.begin_frame(Some("black".into())).unwrap();
    r.draw_sprite(
        "bar",
        &SpriteDraw::at(20.0, 20.0)
            .origin(0.5, 0.5)
            .rotation(std::f32::consts::FRAC_PI_2),
    )
    .unwrap();
    r.end_frame().unwrap();

    // A quarter turn stands the bar upright around (20, 20).
    assert_eq!(pixel(&r, 20, 20), [255, 255, 0, 255]);
    assert_eq!(pixel(&r, 20, 12), [255, 255, 0, 255]);
    assert_eq!(pixel(&r, 12, 20), [0, 0, 0, 255]);
}

#[test_log::test]
fn auto_resize_follows_the_host() {
    let (host, mut r) = canvas(10.0, 10.0);
    r.set_auto_resize(true);

    host.set_inner_size(24.0, 12.0);
    r.begin_frame(Some("white".into())).unwrap();
    r.end_frame().unwrap();
    assert_eq!(r.surface().backing_size(), (24, 12));
    assert_eq!(r.backend().pixels().map(|p| (p.width(), p.height())), Some((24, 12)));

    r.set_auto_resize(false);
    host.set_inner_size(50.0, 50.0);
    r.begin_frame(None).unwrap();
    r.end_frame().unwrap();
    assert_eq!(r.surface().backing_size(), (24, 12));
}
