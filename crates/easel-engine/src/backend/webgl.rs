//! GL-class backend with a single uber-pipeline.
//!
//! Each draw records its own render pass and uploads its own vertex and
//! uniform buffers; those are transient and released at `end_frame`.

use bytemuck::{Pod, Zeroable};
use futures::future::LocalBoxFuture;
use image::RgbaImage;
use wgpu::util::DeviceExt;

use crate::color::Color;
use crate::config::RendererConfig;
use crate::error::{RenderError, Result};
use crate::geometry::{Vec2, Viewport};
use crate::surface::DisplaySurface;
use crate::transform::Affine2;

use super::gpu::{
    self, compile_wgsl, GpuContext, GpuFrame, GpuTexture, GpuTransient, TexVertex, TextureBinder,
};
use super::{batch_vertices, BackendKind, BackendRenderer, RasterBackend, RendererState, TransientPool};

pub type WebGlRenderer = BackendRenderer<WebGlBackend>;

const SHADER: &str = include_str!("shaders/webgl_uber.wgsl");

/// Per-draw uniform block of the uber shader.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct DrawUniforms {
    cols: [[f32; 4]; 3],
    color: [f32; 4],
    use_texture: u32,
    _pad: [u32; 3],
}

impl DrawUniforms {
    fn solid(color: Color) -> Self {
        Self {
            cols: Affine2::IDENTITY.padded_columns(),
            color: color.to_array(),
            use_texture: 0,
            _pad: [0; 3],
        }
    }

    fn textured(matrix: &Affine2) -> Self {
        Self {
            cols: matrix.padded_columns(),
            color: Color::WHITE.to_array(),
            use_texture: 1,
            _pad: [0; 3],
        }
    }
}

/// Device-side state built by `init`.
struct Pipeline {
    ctx: GpuContext,
    pipeline: wgpu::RenderPipeline,
    uniform_layout: wgpu::BindGroupLayout,
    textures: TextureBinder,
    white: GpuTexture,
}

struct OpenFrame {
    frame: GpuFrame,
    encoder: wgpu::CommandEncoder,
}

#[derive(Default)]
pub struct WebGlBackend {
    gpu: Option<Pipeline>,
    frame: Option<OpenFrame>,
    transients: TransientPool<GpuTransient>,
    /// Textures destroyed mid-frame; released after submission.
    doomed: Vec<GpuTexture>,
}

impl WebGlBackend {
    pub fn context(&self) -> Option<&GpuContext> {
        self.gpu.as_ref().map(|g| &g.ctx)
    }

    fn pipeline(&self) -> Result<&Pipeline> {
        self.gpu.as_ref().ok_or(RenderError::NotReady {
            backend: BackendKind::WebGl,
            state: RendererState::Uninitialized,
        })
    }

    /// Records one render pass: an optional clear, then an optional draw.
    fn record_pass(
        &mut self,
        clear: Option<Color>,
        draw: Option<(&[TexVertex], DrawUniforms, &wgpu::BindGroup)>,
    ) {
        let (Some(state), Some(open)) = (self.gpu.as_ref(), self.frame.as_mut()) else { return };
        let device = state.ctx.device();

        let bound = draw.map(|(vertices, uniforms, texture_group)| {
            let vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("easel webgl draw vbo"),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let ubo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("easel webgl draw ubo"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let uniform_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("easel webgl draw bind group"),
                layout: &state.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: ubo.as_entire_binding(),
                }],
            });
            (vbo, ubo, uniform_group, texture_group, vertices.len() as u32)
        });

        {
            let mut pass = open.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("easel webgl pass"),
                color_attachments: &[Some(gpu::color_attachment(
                    &open.frame.view,
                    clear.map(Color::to_wgpu),
                ))],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let Some((vbo, _, uniform_group, texture_group, count)) = &bound {
                pass.set_pipeline(&state.pipeline);
                pass.set_bind_group(0, uniform_group, &[]);
                pass.set_bind_group(1, *texture_group, &[]);
                pass.set_vertex_buffer(0, vbo.slice(..));
                pass.draw(0..*count, 0..1);
            }
        }

        if let Some((vbo, ubo, uniform_group, _, _)) = bound {
            self.transients.push(vbo.into());
            self.transients.push(ubo.into());
            self.transients.push(uniform_group.into());
        }
    }
}

impl RasterBackend for WebGlBackend {
    type Texture = GpuTexture;

    const KIND: BackendKind = BackendKind::WebGl;

    fn init<'a>(
        &'a mut self,
        surface: &'a DisplaySurface,
        config: &'a RendererConfig,
    ) -> LocalBoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let ctx = GpuContext::new(Self::KIND, surface, config).await?;
            let device = ctx.device();

            let shader = compile_wgsl(device, "easel webgl uber shader", SHADER)?;
            let uniform_layout = gpu::uniform_layout(
                device,
                "easel webgl uniform bgl",
                std::mem::size_of::<DrawUniforms>() as u64,
            );
            let textures = TextureBinder::new(device, "easel webgl texture bgl");
            let pipeline = gpu::create_pipeline(
                device,
                "easel webgl uber pipeline",
                &shader,
                &[&uniform_layout, textures.layout()],
                &[TexVertex::layout()],
                ctx.format(),
            );
            let white = textures.white(device, ctx.queue())?;

            self.gpu = Some(Pipeline {
                ctx,
                pipeline,
                uniform_layout,
                textures,
                white,
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
        let state = self.pipeline()?;
        let Some(frame) = state.ctx.acquire()? else {
            return Ok(false);
        };
        let encoder = state.ctx.encoder("easel webgl frame encoder");
        self.frame = Some(OpenFrame { frame, encoder });

        if clear.is_some() {
            self.record_pass(clear, None);
        }
        Ok(true)
    }

    fn clear(&mut self, color: Color) {
        self.record_pass(Some(color), None);
    }

    fn fill_triangles(&mut self, viewport: Viewport, vertices: &[Vec2], color: Color) {
        let Some(white) = self.gpu.as_ref().map(|g| g.white.bind_group.clone()) else { return };
        let vertices: Vec<TexVertex> = vertices
            .iter()
            .map(|v| TexVertex {
                pos: viewport.to_ndc(*v).to_array(),
                uv: [0.0, 0.0],
            })
            .collect();
        self.record_pass(None, Some((vertices.as_slice(), DrawUniforms::solid(color), &white)));
    }

    fn create_texture(&mut self, image: &RgbaImage, label: &str) -> Result<GpuTexture> {
        let state = self.pipeline()?;
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
        let quad = gpu::unit_quad_vertices();
        self.record_pass(
            None,
            Some((quad.as_slice(), DrawUniforms::textured(matrix), &texture.bind_group)),
        );
    }

    fn draw_sprite_batch(&mut self, texture: &GpuTexture, quads: &[Affine2]) {
        let vertices = batch_vertices(quads);
        self.record_pass(
            None,
            Some((
                vertices.as_slice(),
                DrawUniforms::textured(&Affine2::IDENTITY),
                &texture.bind_group,
            )),
        );
    }

    fn end_frame(&mut self) -> Result<()> {
        if let (Some(state), Some(open)) = (self.gpu.as_ref(), self.frame.take()) {
            state.ctx.submit(open.encoder);
            open.frame.present();
        }

        for texture in self.doomed.drain(..) {
            texture.destroy();
        }
        let released = self.transients.release_all();
        log::trace!("webgl: released {released} transient resources");
        Ok(())
    }

    fn transient_outstanding(&self) -> usize {
        self.transients.outstanding()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uber_shader_validates() {
        gpu::validate_wgsl("webgl uber", SHADER).unwrap();
    }

    #[test]
    fn uniform_block_matches_wgsl_layout() {
        // 3 × vec4 columns + vec4 color + u32 toggle, rounded to 16 bytes.
        assert_eq!(std::mem::size_of::<DrawUniforms>(), 80);
    }

    #[test]
    fn solid_draws_pass_positions_through() {
        let u = DrawUniforms::solid(Color::new(1.0, 0.5, 0.0, 1.0));
        assert_eq!(u.cols, Affine2::IDENTITY.padded_columns());
        assert_eq!(u.use_texture, 0);
        assert_eq!(u.color, [1.0, 0.5, 0.0, 1.0]);
    }
}
