use std::sync::Arc;

use parking_lot::Mutex;
use winit::window::Window;

use super::ResizeNotifier;

/// Whatever a renderer is mounted on.
///
/// Sizes are logical pixels; the device pixel ratio converts them to the
/// backing store.
pub trait Host: Send + Sync {
    /// Current logical `(width, height)`.
    fn inner_size(&self) -> (f32, f32);

    /// Physical pixels per logical pixel.
    fn device_pixel_ratio(&self) -> f32;

    fn resize_notifier(&self) -> &ResizeNotifier;

    /// Presentable target for GPU backends. `None` means render offscreen.
    fn surface_target(&self) -> Option<wgpu::SurfaceTarget<'static>> {
        None
    }
}

/// Host backed by a winit window.
///
/// The event loop must forward `WindowEvent::Resized` and
/// `WindowEvent::ScaleFactorChanged` through [`WindowHost::notify_resized`].
pub struct WindowHost {
    window: Arc<Window>,
    notifier: ResizeNotifier,
}

impl WindowHost {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            notifier: ResizeNotifier::new(),
        }
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn notify_resized(&self) {
        self.notifier.notify();
    }
}

impl Host for WindowHost {
    fn inner_size(&self) -> (f32, f32) {
        let scale = self.window.scale_factor();
        let logical = self.window.inner_size().to_logical::<f64>(scale);
        (logical.width as f32, logical.height as f32)
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.window.scale_factor() as f32
    }

    fn resize_notifier(&self) -> &ResizeNotifier {
        &self.notifier
    }

    fn surface_target(&self) -> Option<wgpu::SurfaceTarget<'static>> {
        Some(wgpu::SurfaceTarget::from(self.window.clone()))
    }
}

/// Headless host with a settable size.
#[derive(Debug)]
pub struct OffscreenHost {
    size: Mutex<(f32, f32)>,
    dpr: Mutex<f32>,
    notifier: ResizeNotifier,
}

impl OffscreenHost {
    pub fn new(width: f32, height: f32) -> Self {
        Self::with_ratio(width, height, 1.0)
    }

    pub fn with_ratio(width: f32, height: f32, dpr: f32) -> Self {
        Self {
            size: Mutex::new((width, height)),
            dpr: Mutex::new(dpr),
            notifier: ResizeNotifier::new(),
        }
    }

    /// Changes the logical size and notifies subscribers.
    pub fn set_inner_size(&self, width: f32, height: f32) {
        *self.size.lock() = (width, height);
        self.notifier.notify();
    }

    /// Changes the pixel ratio and notifies subscribers.
    pub fn set_device_pixel_ratio(&self, dpr: f32) {
        *self.dpr.lock() = dpr;
        self.notifier.notify();
    }
}

impl Host for OffscreenHost {
    fn inner_size(&self) -> (f32, f32) {
        *self.size.lock()
    }

    fn device_pixel_ratio(&self) -> f32 {
        *self.dpr.lock()
    }

    fn resize_notifier(&self) -> &ResizeNotifier {
        &self.notifier
    }
}
