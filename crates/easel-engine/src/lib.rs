//! Easel engine crate.
//!
//! One 2D drawing contract ([`Renderer`]) over four interchangeable
//! backends, plus the selector that picks one for the current host.

pub mod backend;
pub mod color;
pub mod config;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod select;
pub mod surface;
pub mod text;
pub mod transform;

pub use backend::{
    create_renderer, BackendKind, RenderStats, Renderer, RendererState, SpriteDraw, SpriteInfo,
    SpriteRequest, SpriteSource,
};
pub use color::{Color, ColorInput};
pub use config::{RendererConfig, SelectorConfig, Thresholds};
pub use error::{RenderError, Result};
pub use surface::{DisplaySurface, Host, OffscreenHost, WindowHost};
