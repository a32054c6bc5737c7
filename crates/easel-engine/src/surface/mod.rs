//! Host mounting, device-pixel scaling and resize tracking.

mod display;
mod host;
mod subscription;

pub use display::DisplaySurface;
pub use host::{Host, OffscreenHost, WindowHost};
pub use subscription::{ResizeNotifier, ResizeSubscription};
