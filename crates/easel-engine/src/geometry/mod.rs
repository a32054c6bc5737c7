//! Geometry in logical pixels shared by every backend.
//!
//! Canonical CPU space:
//! - Logical pixels (DPI-aware)
//! - Origin top-left
//! - +X right, +Y down
//!
//! Backends receive tessellated triangle lists from here so rasterized output
//! matches across CPU and GPU paths.

mod shapes;
mod tessellate;
mod vec2;
mod viewport;

pub use shapes::{Circle, Line, Rect};
pub use tessellate::{circle_triangles, line_triangles, rect_triangles, MIN_CIRCLE_SEGMENTS};
pub use vec2::Vec2;
pub use viewport::Viewport;
