//! Fonts and text rasterization.
//!
//! Text is drawn by rasterizing a line into an RGBA bitmap on the CPU and
//! registering the result as a sprite, so every backend reuses its sprite path.

mod font_system;
mod raster;

pub use font_system::{Font, FontId, FontSystem};
pub use raster::{rasterize_text, BASELINE_FRACTION, LINE_HEIGHT_FACTOR, MAX_TEXT_DIMENSION};
