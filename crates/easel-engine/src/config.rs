use std::sync::Arc;

use crate::text::FontSystem;

/// Renderer construction parameters shared by every backend.
///
/// GPU-only fields are ignored by the CPU backend.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Segments used for every circle, on every backend.
    pub circle_segments: u32,

    /// Adapter preference for GPU backends.
    pub power_preference: wgpu::PowerPreference,

    /// Present mode for window surfaces.
    ///
    /// FIFO is supported everywhere and is the right default for a 2D loop.
    pub present_mode: wgpu::PresentMode,

    /// Surface latency hint; support depends on platform/backend.
    pub desired_maximum_frame_latency: u32,

    /// Fonts available to `draw_text`.
    pub fonts: Arc<FontSystem>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            circle_segments: 64,
            power_preference: wgpu::PowerPreference::HighPerformance,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            fonts: Arc::new(FontSystem::new()),
        }
    }
}

impl RendererConfig {
    pub fn with_fonts(fonts: Arc<FontSystem>) -> Self {
        Self {
            fonts,
            ..Self::default()
        }
    }
}

/// Cut-offs used by `select::decide`.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    /// Clear passes per second a host must exceed for `WebGpu`.
    pub webgpu_score: f64,
    /// Clear passes per second a host must exceed for the GL backends.
    pub webgl_score: f64,
    pub min_cpu_threads: usize,
    pub min_memory_gb: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            webgpu_score: 30_000.0,
            webgl_score: 15_000.0,
            min_cpu_threads: 4,
            min_memory_gb: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectorConfig {
    /// Clear passes timed by the probe benchmark.
    pub iterations: u32,
    pub thresholds: Thresholds,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            thresholds: Thresholds::default(),
        }
    }
}
