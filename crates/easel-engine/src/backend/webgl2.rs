//! GL-class backend with separate color and texture pipelines.
//!
//! Draws are appended to per-frame CPU arenas and an op list. `end_frame`
//! uploads both arenas once into persistent vertex buffers and replays the
//! ops, one render pass per clear segment.

use std::ops::Range;

use futures::future::LocalBoxFuture;
use image::RgbaImage;

use crate::color::Color;
use crate::config::RendererConfig;
use crate::error::{RenderError, Result};
use crate::geometry::{Vec2, Viewport};
use crate::surface::DisplaySurface;
use crate::transform::Affine2;

use super::gpu::{
    self, color_vertices, compile_wgsl, ColorVertex, GpuContext, GpuFrame, GpuTexture, TexVertex,
    TextureBinder,
};
use super::{batch_vertices, BackendKind, BackendRenderer, RasterBackend, RendererState};

pub type WebGl2Renderer = BackendRenderer<WebGl2Backend>;

const COLOR_SHADER: &str = include_str!("shaders/color.wgsl");
const SPRITE_SHADER: &str = include_str!("shaders/sprite.wgsl");

/// One recorded operation, replayed in order at `end_frame`.
#[derive(Debug)]
enum Op {
    Clear(Color),
    Color(Range<u32>),
    Textured {
        group: wgpu::BindGroup,
        range: Range<u32>,
    },
}

/// A vertex buffer that only ever grows.
struct GrowableBuffer {
    label: &'static str,
    buffer: Option<wgpu::Buffer>,
    capacity: usize,
}

impl GrowableBuffer {
    const fn new(label: &'static str) -> Self {
        Self {
            label,
            buffer: None,
            capacity: 0,
        }
    }

    /// Uploads `bytes`, reallocating first if they don't fit.
    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if bytes.len() > self.capacity || self.buffer.is_none() {
            let new_cap = bytes.len().next_power_of_two().max(4096);
            if let Some(old) = self.buffer.take() {
                old.destroy();
            }
            self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(self.label),
                size: new_cap as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.capacity = new_cap;
            log::debug!("{}: grew to {new_cap} bytes", self.label);
        }
        if let Some(buffer) = self.buffer.as_ref() {
            queue.write_buffer(buffer, 0, bytes);
        }
    }
}

struct Pipelines {
    ctx: GpuContext,
    color_pipeline: wgpu::RenderPipeline,
    sprite_pipeline: wgpu::RenderPipeline,
    textures: TextureBinder,
    color_vbo: GrowableBuffer,
    sprite_vbo: GrowableBuffer,
}

#[derive(Default)]
pub struct WebGl2Backend {
    gpu: Option<Pipelines>,
    frame: Option<GpuFrame>,
    ops: Vec<Op>,
    color_arena: Vec<ColorVertex>,
    sprite_arena: Vec<TexVertex>,
    doomed: Vec<GpuTexture>,
}

impl WebGl2Backend {
    pub fn context(&self) -> Option<&GpuContext> {
        self.gpu.as_ref().map(|g| &g.ctx)
    }

    fn pipelines(&self) -> Result<&Pipelines> {
        self.gpu.as_ref().ok_or(RenderError::NotReady {
            backend: BackendKind::WebGl2,
            state: RendererState::Uninitialized,
        })
    }

    fn push_textured(&mut self, texture: &GpuTexture, vertices: Vec<TexVertex>) {
        if self.frame.is_none() || vertices.is_empty() {
            return;
        }
        let start = self.sprite_arena.len() as u32;
        self.sprite_arena.extend(vertices);
        self.ops.push(Op::Textured {
            group: texture.bind_group.clone(),
            range: start..self.sprite_arena.len() as u32,
        });
    }

    fn reset_arenas(&mut self) {
        self.ops.clear();
        self.color_arena.clear();
        self.sprite_arena.clear();
    }
}

/// Splits `ops` at every clear: each segment starts with its clear color
/// (if any) followed by the draws up to the next clear.
fn segments(ops: &[Op]) -> Vec<(Option<Color>, &[Op])> {
    let mut out = Vec::new();
    let mut clear = None;
    let mut start = 0;

    for (i, op) in ops.iter().enumerate() {
        if let Op::Clear(color) = op {
            if i > start {
                out.push((clear, &ops[start..i]));
            }
            clear = Some(*color);
            start = i + 1;
        }
    }
    if start < ops.len() || clear.is_some() || out.is_empty() {
        out.push((clear, &ops[start..]));
    }
    out
}

impl RasterBackend for WebGl2Backend {
    type Texture = GpuTexture;

    const KIND: BackendKind = BackendKind::WebGl2;

    fn init<'a>(
        &'a mut self,
        surface: &'a DisplaySurface,
        config: &'a RendererConfig,
    ) -> LocalBoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let ctx = GpuContext::new(Self::KIND, surface, config).await?;
            let device = ctx.device();

            let color_shader = compile_wgsl(device, "easel webgl2 color shader", COLOR_SHADER)?;
            let sprite_shader = compile_wgsl(device, "easel webgl2 sprite shader", SPRITE_SHADER)?;
            let textures = TextureBinder::new(device, "easel webgl2 texture bgl");

            let color_pipeline = gpu::create_pipeline(
                device,
                "easel webgl2 color pipeline",
                &color_shader,
                &[],
                &[ColorVertex::layout()],
                ctx.format(),
            );
            let sprite_pipeline = gpu::create_pipeline(
                device,
                "easel webgl2 sprite pipeline",
                &sprite_shader,
                &[textures.layout()],
                &[TexVertex::layout()],
                ctx.format(),
            );

            self.gpu = Some(Pipelines {
                ctx,
                color_pipeline,
                sprite_pipeline,
                textures,
                color_vbo: GrowableBuffer::new("easel webgl2 color vbo"),
                sprite_vbo: GrowableBuffer::new("easel webgl2 sprite vbo"),
            });
            Ok(())
        })
    }

    fn apply_size(&mut self, surface: &DisplaySurface) -> Result<()> {
        if let Some(state) = self.gpu.as_mut() {
            state.ctx.resize(surface.backing_size());
        }
        Ok(())
    }

    fn begin_frame(&mut self, _surface: &DisplaySurface, clear: Option<Color>) -> Result<bool> {
        self.reset_arenas();
        let Some(frame) = self.pipelines()?.ctx.acquire()? else {
            return Ok(false);
        };
        self.frame = Some(frame);

        if let Some(color) = clear {
            self.ops.push(Op::Clear(color));
        }
        Ok(true)
    }

    fn clear(&mut self, color: Color) {
        if self.frame.is_some() {
            self.ops.push(Op::Clear(color));
        }
    }

    fn fill_triangles(&mut self, viewport: Viewport, vertices: &[Vec2], color: Color) {
        if self.frame.is_none() {
            return;
        }
        let start = self.color_arena.len() as u32;
        self.color_arena
            .extend(color_vertices(viewport, vertices, color));
        self.ops
            .push(Op::Color(start..self.color_arena.len() as u32));
    }

    fn create_texture(&mut self, image: &RgbaImage, label: &str) -> Result<GpuTexture> {
        let state = self.pipelines()?;
        state
            .textures
            .upload(state.ctx.device(), state.ctx.queue(), image, label)
    }

    fn destroy_texture(&mut self, texture: GpuTexture) {
        if self.frame.is_some() {
            self.doomed.push(texture);
        } else {
            texture.destroy();
        }
    }

    fn draw_sprite(&mut self, texture: &GpuTexture, matrix: &Affine2) {
        self.push_textured(texture, batch_vertices(std::slice::from_ref(matrix)));
    }

    fn draw_sprite_batch(&mut self, texture: &GpuTexture, quads: &[Affine2]) {
        self.push_textured(texture, batch_vertices(quads));
    }

    fn end_frame(&mut self) -> Result<()> {
        let frame = self.frame.take();
        if let (Some(state), Some(frame)) = (self.gpu.as_mut(), frame) {
            let (device, queue) = (state.ctx.device(), state.ctx.queue());
            state.color_vbo
                .upload(device, queue, bytemuck::cast_slice(&self.color_arena));
            state.sprite_vbo
                .upload(device, queue, bytemuck::cast_slice(&self.sprite_arena));

            let mut encoder = state.ctx.encoder("easel webgl2 frame encoder");
            for (clear, ops) in segments(&self.ops) {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("easel webgl2 pass"),
                    color_attachments: &[Some(gpu::color_attachment(
                        &frame.view,
                        clear.map(Color::to_wgpu),
                    ))],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                    multiview_mask: None,
                });

                for op in ops {
                    match op {
                        Op::Clear(_) => {}
                        Op::Color(range) => {
                            let Some(vbo) = state.color_vbo.buffer.as_ref() else { continue };
                            pass.set_pipeline(&state.color_pipeline);
                            pass.set_vertex_buffer(0, vbo.slice(..));
                            pass.draw(range.clone(), 0..1);
                        }
                        Op::Textured { group, range } => {
                            let Some(vbo) = state.sprite_vbo.buffer.as_ref() else { continue };
                            pass.set_pipeline(&state.sprite_pipeline);
                            pass.set_bind_group(0, group, &[]);
                            pass.set_vertex_buffer(0, vbo.slice(..));
                            pass.draw(range.clone(), 0..1);
                        }
                    }
                }
            }
            state.ctx.submit(encoder);
            frame.present();
        }

        for texture in self.doomed.drain(..) {
            texture.destroy();
        }
        self.reset_arenas();
        Ok(())
    }

    /// Recorded ops still waiting for replay.
    fn transient_outstanding(&self) -> usize {
        self.ops.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(range: Range<u32>) -> Op {
        Op::Color(range)
    }

    fn summary(segs: &[(Option<Color>, &[Op])]) -> Vec<(bool, usize)> {
        segs.iter().map(|(c, ops)| (c.is_some(), ops.len())).collect()
    }

    #[test]
    fn shaders_validate() {
        gpu::validate_wgsl("webgl2 color", COLOR_SHADER).unwrap();
        gpu::validate_wgsl("webgl2 sprite", SPRITE_SHADER).unwrap();
    }

    #[test]
    fn empty_frames_still_get_one_pass() {
        assert_eq!(summary(&segments(&[])), vec![(false, 0)]);
    }

    #[test]
    fn clears_split_segments() {
        let ops = [
            Op::Clear(Color::BLACK),
            shape(0..3),
            shape(3..6),
            Op::Clear(Color::WHITE),
            shape(6..9),
        ];
        assert_eq!(summary(&segments(&ops)), vec![(true, 2), (true, 1)]);
    }

    #[test]
    fn leading_draws_load_and_trailing_clear_is_kept() {
        let ops = [shape(0..3), Op::Clear(Color::WHITE)];
        assert_eq!(summary(&segments(&ops)), vec![(false, 1), (true, 0)]);
    }

    #[test]
    fn back_to_back_clears_keep_the_last() {
        let ops = [Op::Clear(Color::BLACK), Op::Clear(Color::WHITE), shape(0..3)];
        let segs = segments(&ops);
        assert_eq!(summary(&segs), vec![(true, 1)]);
        assert_eq!(segs[0].0, Some(Color::WHITE));
    }
}
