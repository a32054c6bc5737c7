//! Shared wgpu plumbing for the three GPU backends.
//!
//! Each backend owns its own [`GpuContext`]; nothing here is shared between
//! renderer instances.

use bytemuck::{Pod, Zeroable};

use crate::color::Color;
use crate::geometry::{Vec2, Viewport};
use crate::transform::{quad_uvs, UNIT_QUAD};

use super::Release;

mod context;
mod shader;
mod surface;
mod texture;

pub use context::{GpuContext, GpuFrame, RenderTarget, OFFSCREEN_FORMAT};
pub use shader::{compile_wgsl, validate_wgsl};
pub use surface::SurfaceErrorAction;
pub use texture::{GpuTexture, TextureBinder};

// ── blend ─────────────────────────────────────────────────────────────────

/// Straight-alpha "source over", matching the CPU canvas.
pub fn straight_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

/// Triangle lists, no culling: rotated or mirrored sprites flip winding.
pub fn triangle_list() -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: None,
        polygon_mode: wgpu::PolygonMode::Fill,
        unclipped_depth: false,
        conservative: false,
    }
}

pub fn color_target(format: wgpu::TextureFormat) -> [Option<wgpu::ColorTargetState>; 1] {
    [Some(wgpu::ColorTargetState {
        format,
        blend: Some(straight_alpha_blend()),
        write_mask: wgpu::ColorWrites::ALL,
    })]
}

/// A `vs_main`/`fs_main` triangle-list pipeline blending into `format`.
pub fn create_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader: &wgpu::ShaderModule,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
    buffers: &[wgpu::VertexBufferLayout<'_>],
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts,
        immediate_size: 0,
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers,
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &color_target(format),
        }),
        primitive: triangle_list(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

/// Uniform buffer layout entry visible to both stages.
pub fn uniform_layout(device: &wgpu::Device, label: &str, size: u64) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(size),
            },
            count: None,
        }],
    })
}

/// Single color attachment on `view`, loading or clearing it.
pub fn color_attachment(
    view: &wgpu::TextureView,
    clear: Option<wgpu::Color>,
) -> wgpu::RenderPassColorAttachment<'_> {
    wgpu::RenderPassColorAttachment {
        view,
        resolve_target: None,
        ops: wgpu::Operations {
            load: clear.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
            store: wgpu::StoreOp::Store,
        },
        depth_slice: None,
    }
}

// ── vertices ──────────────────────────────────────────────────────────────

/// Position in NDC plus texture coordinate.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct TexVertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
}

impl TexVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x2, // pos
        1 => Float32x2  // uv
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TexVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Position in NDC plus straight-alpha color.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    pub pos: [f32; 2],
    pub color: [f32; 4],
}

impl ColorVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x2, // pos
        1 => Float32x4  // color
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ColorVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Bare NDC position.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct PosVertex {
    pub pos: [f32; 2],
}

impl PosVertex {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PosVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Unit-quad corners with matching UVs, for matrix-driven sprite draws.
pub fn unit_quad_vertices() -> [TexVertex; 6] {
    let uvs = quad_uvs();
    let mut out = [TexVertex::zeroed(); 6];
    for (slot, (corner, uv)) in out.iter_mut().zip(UNIT_QUAD.iter().zip(uvs)) {
        *slot = TexVertex {
            pos: corner.to_array(),
            uv,
        };
    }
    out
}

// ── transients ────────────────────────────────────────────────────────────

/// A per-frame GPU allocation released at `end_frame`.
#[derive(Debug)]
pub enum GpuTransient {
    Buffer(wgpu::Buffer),
    BindGroup(wgpu::BindGroup),
}

impl Release for GpuTransient {
    fn release(self) {
        match self {
            GpuTransient::Buffer(buffer) => buffer.destroy(),
            GpuTransient::BindGroup(group) => drop(group),
        }
    }
}

impl From<wgpu::Buffer> for GpuTransient {
    fn from(buffer: wgpu::Buffer) -> Self {
        GpuTransient::Buffer(buffer)
    }
}

impl From<wgpu::BindGroup> for GpuTransient {
    fn from(group: wgpu::BindGroup) -> Self {
        GpuTransient::BindGroup(group)
    }
}

/// Expands a colored triangle list (logical pixels) into NDC vertices.
pub fn color_vertices(viewport: Viewport, vertices: &[Vec2], color: Color) -> Vec<ColorVertex> {
    let color = color.to_array();
    vertices
        .iter()
        .map(|v| ColorVertex {
            pos: viewport.to_ndc(*v).to_array(),
            color,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_strides_match_shader_inputs() {
        assert_eq!(std::mem::size_of::<TexVertex>(), 16);
        assert_eq!(std::mem::size_of::<ColorVertex>(), 24);
        assert_eq!(TexVertex::layout().array_stride, 16);
        assert_eq!(ColorVertex::layout().attributes[1].offset, 8);
    }

    #[test]
    fn blend_is_straight_alpha_source_over() {
        assert_eq!(straight_alpha_blend(), wgpu::BlendState::ALPHA_BLENDING);
    }

    #[test]
    fn color_vertices_map_to_ndc() {
        let vp = Viewport::new(200.0, 100.0);
        let out = color_vertices(vp, &[Vec2::new(0.0, 0.0), Vec2::new(200.0, 100.0)], Color::WHITE);
        assert_eq!(out[0].pos, [-1.0, 1.0]);
        assert_eq!(out[1].pos, [1.0, -1.0]);
        assert_eq!(out[1].color, [1.0; 4]);
    }
}
