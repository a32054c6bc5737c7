//! Explicit command-buffer backend on the primary wgpu backends.
//!
//! `begin_frame` opens a command encoder and one render pass that stays open
//! across draws. Each draw allocates its own vertex buffer, uniform buffer and
//! bind group; `end_frame` ends the pass, submits, presents and destroys them.

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
    self, compile_wgsl, GpuContext, GpuFrame, GpuTexture, GpuTransient, PosVertex, TexVertex,
    TextureBinder,
};
use super::{batch_vertices, BackendKind, BackendRenderer, RasterBackend, RendererState, TransientPool};

pub type WebGpuRenderer = BackendRenderer<WebGpuBackend>;

const COLOR_SHADER: &str = include_str!("shaders/webgpu_color.wgsl");
const SPRITE_SHADER: &str = include_str!("shaders/webgpu_sprite.wgsl");

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct FillUniform {
    color: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct PlacementUniform {
    cols: [[f32; 4]; 3],
}

struct Pipelines {
    ctx: GpuContext,
    color_pipeline: wgpu::RenderPipeline,
    sprite_pipeline: wgpu::RenderPipeline,
    fill_layout: wgpu::BindGroupLayout,
    placement_layout: wgpu::BindGroupLayout,
    textures: TextureBinder,
    quad_vbo: wgpu::Buffer,
}

struct ActiveFrame {
    // Declared before `encoder`: the pass must end before the encoder finishes.
    pass: Option<wgpu::RenderPass<'static>>,
    encoder: wgpu::CommandEncoder,
    frame: GpuFrame,
}

impl ActiveFrame {
    /// Ends the current pass (if any) and opens a new one.
    fn restart_pass(&mut self, clear: Option<Color>) {
        self.pass = None;
        let pass = self
            .encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("easel webgpu pass"),
                color_attachments: &[Some(gpu::color_attachment(
                    &self.frame.view,
                    clear.map(Color::to_wgpu),
                ))],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            })
            .forget_lifetime();
        self.pass = Some(pass);
    }
}

#[derive(Default)]
pub struct WebGpuBackend {
    gpu: Option<Pipelines>,
    frame: Option<ActiveFrame>,
    transients: TransientPool<GpuTransient>,
    doomed: Vec<GpuTexture>,
}

impl WebGpuBackend {
    pub fn context(&self) -> Option<&GpuContext> {
        self.gpu.as_ref().map(|g| &g.ctx)
    }

    fn pipelines(&self) -> Result<&Pipelines> {
        self.gpu.as_ref().ok_or(RenderError::NotReady {
            backend: BackendKind::WebGpu,
            state: RendererState::Uninitialized,
        })
    }

    fn uniform_group<T: Pod>(
        &mut self,
        layout: impl Fn(&Pipelines) -> &wgpu::BindGroupLayout,
        value: &T,
        label: &str,
    ) -> Option<wgpu::BindGroup> {
        let state = self.gpu.as_ref()?;
        let device = state.ctx.device();

        let ubo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(value),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: layout(state),
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: ubo.as_entire_binding(),
            }],
        });

        self.transients.push(ubo.into());
        self.transients.push(group.clone().into());
        Some(group)
    }

    fn vertex_buffer(&mut self, bytes: &[u8], label: &str) -> Option<wgpu::Buffer> {
        let state = self.gpu.as_ref()?;
        let vbo = state
            .ctx
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytes,
                usage: wgpu::BufferUsages::VERTEX,
            });
        self.transients.push(vbo.clone().into());
        Some(vbo)
    }

    /// Records a textured draw of `count` vertices from `vbo`.
    fn draw_textured(
        &mut self,
        texture: &GpuTexture,
        matrix: &Affine2,
        vbo: Option<wgpu::Buffer>,
        count: u32,
    ) {
        if self.frame.is_none() {
            return;
        }
        let placement = PlacementUniform {
            cols: matrix.padded_columns(),
        };
        let Some(placement_group) =
            self.uniform_group(|g| &g.placement_layout, &placement, "easel webgpu placement")
        else {
            return;
        };

        let (Some(state), Some(active)) = (self.gpu.as_ref(), self.frame.as_mut()) else { return };
        let Some(pass) = active.pass.as_mut() else { return };
        let vbo = vbo.as_ref().unwrap_or(&state.quad_vbo);

        pass.set_pipeline(&state.sprite_pipeline);
        pass.set_bind_group(0, &placement_group, &[]);
        pass.set_bind_group(1, &texture.bind_group, &[]);
        pass.set_vertex_buffer(0, vbo.slice(..));
        pass.draw(0..count, 0..1);
    }
}

impl RasterBackend for WebGpuBackend {
    type Texture = GpuTexture;

    const KIND: BackendKind = BackendKind::WebGpu;

    fn init<'a>(
        &'a mut self,
        surface: &'a DisplaySurface,
        config: &'a RendererConfig,
    ) -> LocalBoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let ctx = GpuContext::new(Self::KIND, surface, config).await?;
            let device = ctx.device();

            let color_shader = compile_wgsl(device, "easel webgpu color shader", COLOR_SHADER)?;
            let sprite_shader = compile_wgsl(device, "easel webgpu sprite shader", SPRITE_SHADER)?;

            let fill_layout = gpu::uniform_layout(
                device,
                "easel webgpu fill bgl",
                std::mem::size_of::<FillUniform>() as u64,
            );
            let placement_layout = gpu::uniform_layout(
                device,
                "easel webgpu placement bgl",
                std::mem::size_of::<PlacementUniform>() as u64,
            );
            let textures = TextureBinder::new(device, "easel webgpu texture bgl");

            let color_pipeline = gpu::create_pipeline(
                device,
                "easel webgpu color pipeline",
                &color_shader,
                &[&fill_layout],
                &[PosVertex::layout()],
                ctx.format(),
            );
            let sprite_pipeline = gpu::create_pipeline(
                device,
                "easel webgpu sprite pipeline",
                &sprite_shader,
                &[&placement_layout, textures.layout()],
                &[TexVertex::layout()],
                ctx.format(),
            );

            let quad_vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("easel webgpu unit quad vbo"),
                contents: bytemuck::cast_slice(&gpu::unit_quad_vertices()),
                usage: wgpu::BufferUsages::VERTEX,
            });

            self.gpu = Some(Pipelines {
                ctx,
                color_pipeline,
                sprite_pipeline,
                fill_layout,
                placement_layout,
                textures,
                quad_vbo,
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
        let state = self.pipelines()?;
        let Some(frame) = state.ctx.acquire()? else {
            return Ok(false);
        };

        let mut active = ActiveFrame {
            pass: None,
            encoder: state.ctx.encoder("easel webgpu frame encoder"),
            frame,
        };
        active.restart_pass(clear);
        self.frame = Some(active);
        Ok(true)
    }

    fn clear(&mut self, color: Color) {
        if let Some(active) = self.frame.as_mut() {
            active.restart_pass(Some(color));
        }
    }

    fn fill_triangles(&mut self, viewport: Viewport, vertices: &[Vec2], color: Color) {
        if self.frame.is_none() {
            return;
        }
        let positions: Vec<PosVertex> = vertices
            .iter()
            .map(|v| PosVertex {
                pos: viewport.to_ndc(*v).to_array(),
            })
            .collect();

        let fill = FillUniform {
            color: color.to_array(),
        };
        let Some(fill_group) = self.uniform_group(|g| &g.fill_layout, &fill, "easel webgpu fill")
        else {
            return;
        };
        let Some(vbo) = self.vertex_buffer(bytemuck::cast_slice(&positions), "easel webgpu fill vbo")
        else {
            return;
        };

        let (Some(state), Some(active)) = (self.gpu.as_ref(), self.frame.as_mut()) else { return };
        let Some(pass) = active.pass.as_mut() else { return };
        pass.set_pipeline(&state.color_pipeline);
        pass.set_bind_group(0, &fill_group, &[]);
        pass.set_vertex_buffer(0, vbo.slice(..));
        pass.draw(0..positions.len() as u32, 0..1);
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
        self.draw_textured(texture, matrix, None, 6);
    }

    fn draw_sprite_batch(&mut self, texture: &GpuTexture, quads: &[Affine2]) {
        if self.frame.is_none() {
            return;
        }
        let vertices = batch_vertices(quads);
        let vbo = self.vertex_buffer(bytemuck::cast_slice(&vertices), "easel webgpu batch vbo");
        if vbo.is_none() {
            return;
        }
        self.draw_textured(texture, &Affine2::IDENTITY, vbo, vertices.len() as u32);
    }

    fn end_frame(&mut self) -> Result<()> {
        if let Some(mut active) = self.frame.take() {
            active.pass = None;
            if let Some(state) = self.gpu.as_ref() {
                state.ctx.submit(active.encoder);
                active.frame.present();
            }
        }

        for texture in self.doomed.drain(..) {
            texture.destroy();
        }
        let released = self.transients.release_all();
        log::trace!("webgpu: released {released} transient resources");
        Ok(())
    }

    fn transient_outstanding(&self) -> usize {
        self.transients.outstanding()
    }
}
