use std::sync::mpsc::{self, TryRecvError};
use std::time::Duration;

use image::RgbaImage;

use crate::backend::BackendKind;
use crate::config::RendererConfig;
use crate::error::{RenderError, Result};
use crate::surface::DisplaySurface;

use super::surface::{self, SurfaceErrorAction};
use super::texture::fits_texture_limit;

/// Where a GPU backend's frames land.
pub enum RenderTarget {
    /// Swapchain bound to the host window.
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    /// Plain texture for hosts without a window.
    Offscreen {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
}

/// Offscreen targets use a linear format, like the swapchain.
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Device polls before a readback gives up, one millisecond apart.
const READBACK_POLLS: u32 = 5_000;

/// Owns the wgpu core objects for one renderer instance.
pub struct GpuContext {
    /// Kept alive for the lifetime of the surface.
    _instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: RenderTarget,
    format: wgpu::TextureFormat,
    size: (u32, u32),
    /// `max_texture_dimension_2d` of the device, cached.
    max_dimension: u32,
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("adapter", &self.adapter.get_info().name)
            .field("format", &self.format)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// One acquired frame. Dropping it without [`present`](Self::present)
/// discards the swapchain image.
pub struct GpuFrame {
    pub view: wgpu::TextureView,
    surface_texture: Option<wgpu::SurfaceTexture>,
}

impl GpuFrame {
    /// Presents the swapchain image; a no-op offscreen.
    pub fn present(self) {
        if let Some(texture) = self.surface_texture {
            texture.present();
        }
    }
}

fn backends_for(kind: BackendKind) -> wgpu::Backends {
    match kind {
        BackendKind::WebGl | BackendKind::WebGl2 => wgpu::Backends::GL,
        BackendKind::WebGpu | BackendKind::Canvas2d => wgpu::Backends::PRIMARY,
    }
}

fn base_limits(kind: BackendKind) -> wgpu::Limits {
    match kind {
        BackendKind::WebGpu => wgpu::Limits::downlevel_defaults(),
        _ => wgpu::Limits::downlevel_webgl2_defaults(),
    }
}

impl GpuContext {
    /// Acquires an adapter and device of `kind`'s API class and sizes the
    /// target from `display`.
    pub async fn new(
        kind: BackendKind,
        display: &DisplaySurface,
        config: &RendererConfig,
    ) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: backends_for(kind),
            ..Default::default()
        });

        let window_surface = match display.host().surface_target() {
            Some(target) => Some(
                instance
                    .create_surface(target)
                    .map_err(|e| RenderError::Surface(format!("failed to create surface: {e}")))?,
            ),
            None => None,
        };

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference,
                compatible_surface: window_surface.as_ref(),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| RenderError::UnsupportedApi {
                backend: kind,
                reason: e.to_string(),
            })?;

        let info = adapter.get_info();
        log::debug!("{kind}: adapter \"{}\" ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("easel device"),
                required_features: wgpu::Features::empty(),
                required_limits: base_limits(kind).using_resolution(adapter.limits()),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await?;

        let size = display.backing_size();
        let max_dimension = device.limits().max_texture_dimension_2d;
        warn_if_oversized(size, max_dimension);

        let (target, format) = match window_surface {
            Some(surface) => {
                let caps = surface.get_capabilities(&adapter);
                let format = surface::choose_surface_format(&caps).ok_or_else(|| {
                    RenderError::Surface("surface reports no supported formats".into())
                })?;

                let mut surface_config = wgpu::SurfaceConfiguration {
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    format,
                    width: size.0,
                    height: size.1,
                    present_mode: config.present_mode,
                    alpha_mode: surface::choose_alpha_mode(&caps),
                    view_formats: vec![],
                    desired_maximum_frame_latency: config.desired_maximum_frame_latency,
                };
                surface::apply_resize(&surface, &device, &mut surface_config, size, max_dimension);

                (
                    RenderTarget::Surface {
                        surface,
                        config: surface_config,
                    },
                    format,
                )
            }
            None => {
                let (texture, view) = offscreen_texture(&device, clamp_extent(size, max_dimension));
                (RenderTarget::Offscreen { texture, view }, OFFSCREEN_FORMAT)
            }
        };

        Ok(Self {
            _instance: instance,
            adapter,
            device,
            queue,
            target,
            format,
            size,
            max_dimension,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Color format of the render target.
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Backing size in physical pixels.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    /// Largest width or height the device accepts for a 2D texture.
    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// True when frames can be drawn at the current size: non-zero and
    /// within the device texture limit.
    pub fn is_drawable(&self) -> bool {
        fits_texture_limit(self.size, self.max_dimension)
    }

    /// Applies a new backing size.
    ///
    /// Sizes beyond the device limit are recorded but not applied to the
    /// target; [`acquire`](Self::acquire) skips frames until a size within
    /// the limit arrives.
    pub fn resize(&mut self, size: (u32, u32)) {
        if size == self.size {
            return;
        }
        self.size = size;
        let max = self.max_dimension;
        warn_if_oversized(size, max);

        match &mut self.target {
            RenderTarget::Surface { surface, config } => {
                surface::apply_resize(surface, &self.device, config, size, max);
            }
            RenderTarget::Offscreen { texture, view } => {
                let (new_texture, new_view) = offscreen_texture(&self.device, clamp_extent(size, max));
                texture.destroy();
                *texture = new_texture;
                *view = new_view;
            }
        }
    }

    /// Acquires the next frame.
    ///
    /// `Ok(None)` means the frame should be skipped: the target is zero-sized
    /// or over the device limit, or the swapchain reported a recoverable
    /// error.
    pub fn acquire(&self) -> Result<Option<GpuFrame>> {
        if !self.is_drawable() {
            return Ok(None);
        }

        match &self.target {
            RenderTarget::Offscreen { view, .. } => Ok(Some(GpuFrame {
                view: view.clone(),
                surface_texture: None,
            })),
            RenderTarget::Surface { surface, config } => match surface.get_current_texture() {
                Ok(surface_texture) => {
                    let view = surface_texture
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default());
                    Ok(Some(GpuFrame {
                        view,
                        surface_texture: Some(surface_texture),
                    }))
                }
                Err(err) => match surface::map_surface_error(surface, &self.device, config, &err) {
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                        log::debug!("surface acquisition failed ({err}); skipping frame");
                        Ok(None)
                    }
                    SurfaceErrorAction::Fatal => Err(RenderError::Surface(err.to_string())),
                },
            },
        }
    }

    pub fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    pub fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Copies the offscreen target back into straight-alpha RGBA8.
    ///
    /// Window surfaces cannot be read back and return `Ok(None)`, as do
    /// targets that are not drawable at their current size.
    pub fn read_pixels(&self) -> Result<Option<RgbaImage>> {
        let RenderTarget::Offscreen { texture, .. } = &self.target else {
            return Ok(None);
        };
        if !self.is_drawable() {
            return Ok(None);
        }

        let (width, height) = self.size;
        let row_bytes = 4 * width;
        let padded_row = row_bytes.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("easel readback buffer"),
            size: u64::from(padded_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.encoder("easel readback encoder");
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.submit(encoder);

        let slice = buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.wait_for_map(&rx)?;

        let mut pixels = Vec::with_capacity((row_bytes * height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks(padded_row as usize).take(height as usize) {
                pixels.extend_from_slice(&row[..row_bytes as usize]);
            }
        }
        buffer.unmap();

        RgbaImage::from_raw(width, height, pixels)
            .map(Some)
            .ok_or_else(|| RenderError::Readback("mapped buffer is shorter than the target".into()))
    }

    fn wait_for_map(
        &self,
        rx: &mpsc::Receiver<std::result::Result<(), wgpu::BufferAsyncError>>,
    ) -> Result<()> {
        for _ in 0..READBACK_POLLS {
            self.device
                .poll(wgpu::PollType::Poll)
                .map_err(|e| RenderError::Readback(e.to_string()))?;
            match rx.try_recv() {
                Ok(res) => return res.map_err(|e| RenderError::Readback(e.to_string())),
                Err(TryRecvError::Empty) => std::thread::sleep(Duration::from_millis(1)),
                Err(TryRecvError::Disconnected) => {
                    return Err(RenderError::Readback("map callback dropped".into()));
                }
            }
        }
        Err(RenderError::Readback("timed out waiting for the buffer map".into()))
    }
}

fn warn_if_oversized((width, height): (u32, u32), max: u32) {
    if width > max || height > max {
        log::warn!("backing size {width}x{height} exceeds the device limit of {max}; frames will be skipped");
    }
}

/// Clamps a target extent into `1..=max` on both axes.
fn clamp_extent((width, height): (u32, u32), max: u32) -> (u32, u32) {
    (width.clamp(1, max.max(1)), height.clamp(1, max.max(1)))
}

fn offscreen_texture(device: &wgpu::Device, (width, height): (u32, u32)) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("easel offscreen target"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gl_classes_share_the_gl_backend() {
        assert_eq!(backends_for(BackendKind::WebGl), wgpu::Backends::GL);
        assert_eq!(backends_for(BackendKind::WebGl2), wgpu::Backends::GL);
        assert_eq!(backends_for(BackendKind::WebGpu), wgpu::Backends::PRIMARY);
    }

    #[test]
    fn gl_classes_request_webgl2_limits() {
        let gl = base_limits(BackendKind::WebGl2);
        assert_eq!(gl, wgpu::Limits::downlevel_webgl2_defaults());
        assert_eq!(base_limits(BackendKind::WebGl), gl);
    }

    #[test]
    fn offscreen_extent_stays_within_the_limit() {
        assert_eq!(clamp_extent((40_000, 10), 16_384), (16_384, 10));
        assert_eq!(clamp_extent((0, 0), 2048), (1, 1));
        assert_eq!(clamp_extent((640, 480), 2048), (640, 480));
    }
}
