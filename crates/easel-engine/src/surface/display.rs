use std::sync::Arc;

use crate::error::{RenderError, Result};
use crate::geometry::Viewport;

use super::{Host, ResizeSubscription};

/// Logical drawing area plus its device-pixel backing store.
///
/// Invariant: `backing == ceil(logical × dpr)` per axis. Only
/// [`set_size`](Self::set_size) and [`resize`](Self::resize) change it.
pub struct DisplaySurface {
    host: Arc<dyn Host>,
    logical: Viewport,
    dpr: f32,
    backing: (u32, u32),
    subscription: Option<ResizeSubscription>,
    /// Set whenever the backing store changed and the backend has not yet
    /// re-applied it to its target.
    dirty: bool,
}

impl std::fmt::Debug for DisplaySurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplaySurface")
            .field("logical", &self.logical)
            .field("dpr", &self.dpr)
            .field("backing", &self.backing)
            .field("auto_resize", &self.subscription.is_some())
            .finish()
    }
}

impl DisplaySurface {
    /// Binds to `host`, sizing the backing store from its current size.
    pub fn mount(host: Arc<dyn Host>) -> Result<Self> {
        let (w, h) = host.inner_size();
        let dpr = host.device_pixel_ratio();

        if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
            return Err(RenderError::Configuration(format!(
                "host reports an unusable size {w}x{h}"
            )));
        }
        if !(dpr.is_finite() && dpr > 0.0) {
            return Err(RenderError::Configuration(format!(
                "host reports an unusable device pixel ratio {dpr}"
            )));
        }

        let mut surface = Self {
            host,
            logical: Viewport::default(),
            dpr,
            backing: (0, 0),
            subscription: None,
            dirty: true,
        };
        surface.set_size(w, h)?;
        Ok(surface)
    }

    /// Sets the logical size; the backing store follows the current ratio.
    ///
    /// Zero is accepted (GPU targets defer reconfiguration); negative or
    /// non-finite sizes are rejected.
    pub fn set_size(&mut self, width: f32, height: f32) -> Result<()> {
        if !(width.is_finite() && height.is_finite()) || width < 0.0 || height < 0.0 {
            return Err(RenderError::InvalidSize { width, height });
        }

        self.logical = Viewport::new(width, height);
        self.backing = (
            (width * self.dpr).ceil() as u32,
            (height * self.dpr).ceil() as u32,
        );
        self.dirty = true;

        log::debug!(
            "surface resized: logical {width}x{height}, dpr {}, backing {}x{}",
            self.dpr,
            self.backing.0,
            self.backing.1
        );
        Ok(())
    }

    /// Re-reads size and pixel ratio from the host.
    pub fn resize(&mut self) -> Result<()> {
        let dpr = self.host.device_pixel_ratio();
        if dpr.is_finite() && dpr > 0.0 {
            self.dpr = dpr;
        } else {
            log::warn!("host reported device pixel ratio {dpr}; keeping {}", self.dpr);
        }

        let (w, h) = self.host.inner_size();
        self.set_size(w, h)
    }

    /// Subscribes to (or unsubscribes from) host resize notifications.
    pub fn set_auto_resize(&mut self, enabled: bool) {
        match (enabled, self.subscription.is_some()) {
            (true, false) => {
                self.subscription = Some(self.host.resize_notifier().subscribe());
            }
            (false, true) => {
                if let Some(sub) = self.subscription.take() {
                    sub.revoke();
                }
            }
            _ => {}
        }
    }

    pub fn auto_resize(&self) -> bool {
        self.subscription.is_some()
    }

    /// Consumes a pending host notification, if any, and resizes.
    ///
    /// Returns whether a resize happened.
    pub fn poll_resize(&mut self) -> Result<bool> {
        let pending = self
            .subscription
            .as_ref()
            .is_some_and(ResizeSubscription::take_pending);
        if pending {
            self.resize()?;
        }
        Ok(pending)
    }

    /// Returns and clears the "backing store changed" flag.
    pub(crate) fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Logical drawing area.
    pub fn viewport(&self) -> Viewport {
        self.logical
    }

    pub fn logical_size(&self) -> (f32, f32) {
        (self.logical.width, self.logical.height)
    }

    /// Size the surface is presented at; equal to the logical size.
    pub fn presented_size(&self) -> (f32, f32) {
        self.logical_size()
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.dpr
    }

    /// Backing store in physical pixels.
    pub fn backing_size(&self) -> (u32, u32) {
        self.backing
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::OffscreenHost;

    fn mount(w: f32, h: f32, dpr: f32) -> (Arc<OffscreenHost>, DisplaySurface) {
        let host = Arc::new(OffscreenHost::with_ratio(w, h, dpr));
        let surface = DisplaySurface::mount(host.clone()).unwrap();
        (host, surface)
    }

    #[test]
    fn backing_is_ceiled_by_ratio() {
        let (_host, mut s) = mount(800.0, 600.0, 2.0);
        assert_eq!(s.backing_size(), (1600, 1200));

        s.set_size(101.0, 33.0).unwrap();
        assert_eq!(s.logical_size(), (101.0, 33.0));
        assert_eq!(s.presented_size(), (101.0, 33.0));
        assert_eq!(s.backing_size(), (202, 66));
    }

    #[test]
    fn fractional_ratio_rounds_up() {
        let (_host, s) = mount(101.0, 10.0, 1.5);
        assert_eq!(s.backing_size(), (152, 15));
    }

    #[test]
    fn unusable_host_is_a_configuration_error() {
        let host = Arc::new(OffscreenHost::new(0.0, 100.0));
        assert!(matches!(
            DisplaySurface::mount(host),
            Err(RenderError::Configuration(_))
        ));

        let host = Arc::new(OffscreenHost::with_ratio(10.0, 10.0, f32::NAN));
        assert!(matches!(
            DisplaySurface::mount(host),
            Err(RenderError::Configuration(_))
        ));
    }

    #[test]
    fn negative_sizes_are_rejected_and_zero_is_kept() {
        let (_host, mut s) = mount(100.0, 100.0, 1.0);
        assert!(matches!(
            s.set_size(-1.0, 10.0),
            Err(RenderError::InvalidSize { .. })
        ));
        assert_eq!(s.logical_size(), (100.0, 100.0));

        s.set_size(0.0, 0.0).unwrap();
        assert_eq!(s.backing_size(), (0, 0));
    }

    #[test]
    fn auto_resize_follows_host_until_disabled() {
        let (host, mut s) = mount(100.0, 100.0, 1.0);
        s.set_auto_resize(true);
        assert_eq!(host.resize_notifier().subscriber_count(), 1);

        host.set_inner_size(200.0, 50.0);
        assert!(s.poll_resize().unwrap());
        assert_eq!(s.logical_size(), (200.0, 50.0));
        assert!(!s.poll_resize().unwrap());

        s.set_auto_resize(false);
        assert_eq!(host.resize_notifier().subscriber_count(), 0);
        host.set_inner_size(300.0, 300.0);
        assert!(!s.poll_resize().unwrap());
        assert_eq!(s.logical_size(), (200.0, 50.0));
    }

    #[test]
    fn explicit_resize_picks_up_ratio_changes() {
        let (host, mut s) = mount(100.0, 100.0, 1.0);
        host.set_device_pixel_ratio(3.0);
        s.resize().unwrap();
        assert_eq!(s.device_pixel_ratio(), 3.0);
        assert_eq!(s.backing_size(), (300, 300));
    }

    #[test]
    fn dirty_flag_is_consumed() {
        let (_host, mut s) = mount(10.0, 10.0, 1.0);
        assert!(s.take_dirty());
        assert!(!s.take_dirty());
        s.set_size(20.0, 20.0).unwrap();
        assert!(s.take_dirty());
    }
}
