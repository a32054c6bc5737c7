//! Error types shared by every backend.
//!
//! Construction and initialization failures are fatal for the instance that
//! raised them. Per-draw problems (unknown sprite names, unparseable colors)
//! are logged and skipped by the backends instead of surfacing here.

use thiserror::Error;

use crate::backend::{BackendKind, RendererState};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(Error, Debug)]
pub enum RenderError {
    /// The host offered no usable mount surface.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The requested API class is not available on this host.
    #[error("{backend} is not supported on this host: {reason}")]
    UnsupportedApi {
        backend: BackendKind,
        reason: String,
    },

    /// An operation was issued before `init()` completed.
    #[error("{backend} renderer is not ready (state: {state:?}); await init() first")]
    NotReady {
        backend: BackendKind,
        state: RendererState,
    },

    /// `init()` failed earlier; the instance must be replaced.
    #[error("{backend} renderer failed to initialize and must be discarded")]
    Discarded { backend: BackendKind },

    /// A sprite name is not registered.
    #[error("sprite \"{0}\" not found")]
    ResourceNotFound(String),

    /// A WGSL module failed to parse.
    #[error("shader compile error in {label}: {message}")]
    ShaderCompile { label: String, message: String },

    /// A WGSL module parsed but failed interface/type validation.
    #[error("pipeline link error in {label}: {message}")]
    PipelineLink { label: String, message: String },

    #[error("failed to create GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("surface error: {0}")]
    Surface(String),

    #[error("image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid surface size {width}x{height}")]
    InvalidSize { width: f32, height: f32 },

    #[error("font error: {0}")]
    Font(String),

    /// Copying a GPU target back to the CPU failed.
    #[error("readback failed: {0}")]
    Readback(String),
}

impl RenderError {
    /// True for errors that leave the instance usable once the caller waits
    /// or corrects its input.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RenderError::NotReady { .. }
                | RenderError::ResourceNotFound(_)
                | RenderError::InvalidSize { .. }
                | RenderError::ImageDecode(_)
                | RenderError::Io(_)
                | RenderError::Font(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_is_recoverable() {
        let err = RenderError::NotReady {
            backend: BackendKind::WebGpu,
            state: RendererState::Initializing,
        };
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("init()"));
    }

    #[test]
    fn init_failures_are_fatal() {
        let err = RenderError::ShaderCompile {
            label: "sprite".into(),
            message: "unexpected token".into(),
        };
        assert!(!err.is_recoverable());
        assert!(!RenderError::Configuration("no host".into()).is_recoverable());
    }
}
