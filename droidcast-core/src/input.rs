//! Input bridge: host events in, device injection out.
//!
//! Pointer coordinates arrive normalized (0..1 in both axes, relative
//! to the drawn video region) and are scaled to absolute device
//! pixels using the session's authoritative screen geometry before
//! injection. [`VideoLayout`] is the pure mapper hosts use to turn a
//! raw container point into those normalized coordinates while
//! excluding the letterbox bars an aspect-ratio mismatch introduces.
//!
//! Every injection is a silent no-op when no session is Active;
//! input is never queued for a stopped or mid-restart session. A
//! failing injection is logged and dropped; the user simply retries
//! the gesture.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;

use crate::surface::{SizeF, SizePx};
use crate::transport::{
    DeviceController, KeyAction, ScreenPowerMode, TouchAction, TouchEvent,
};

// ── VideoLayout ──────────────────────────────────────────────────

/// Maps points in the host container to the drawn video region.
///
/// The video is aspect-fit inside the container, so the drawn region
/// is centered with letterbox (or pillarbox) bars on the short axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoLayout {
    /// Host container size in on-screen units.
    pub container: SizeF,
    /// Device-reported video geometry in pixels.
    pub video: SizePx,
}

impl VideoLayout {
    pub fn new(container: SizeF, video: SizePx) -> Self {
        Self { container, video }
    }

    /// The drawn video rectangle inside the container, in on-screen
    /// units: `(x, y, width, height)`.
    pub fn video_rect(&self) -> (f64, f64, f64, f64) {
        if self.video.width == 0
            || self.video.height == 0
            || self.container.width <= 0.0
            || self.container.height <= 0.0
        {
            return (0.0, 0.0, self.container.width, self.container.height);
        }
        let scale = f64::min(
            self.container.width / self.video.width as f64,
            self.container.height / self.video.height as f64,
        );
        let width = self.video.width as f64 * scale;
        let height = self.video.height as f64 * scale;
        (
            (self.container.width - width) / 2.0,
            (self.container.height - height) / 2.0,
            width,
            height,
        )
    }

    /// Map a container point to normalized video coordinates, or
    /// `None` when the point falls in a letterbox bar.
    pub fn normalize(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let (vx, vy, vw, vh) = self.video_rect();
        if vw <= 0.0 || vh <= 0.0 {
            return None;
        }
        let nx = (x - vx) / vw;
        let ny = (y - vy) / vh;
        if (0.0..=1.0).contains(&nx) && (0.0..=1.0).contains(&ny) {
            Some((nx, ny))
        } else {
            None
        }
    }
}

// ── InputRoute ───────────────────────────────────────────────────

/// Where injections currently go. Replaced wholesale on every session
/// (re)start and cleared on stop, so input can never reach a stale
/// session.
#[derive(Clone)]
pub struct InputRoute {
    /// The active controller channel.
    pub controller: Arc<dyn DeviceController>,
    /// Authoritative device geometry for coordinate scaling.
    pub device: SizePx,
}

// ── InputBridge ──────────────────────────────────────────────────

/// Host-facing injection surface. Cheap to clone.
#[derive(Clone)]
pub struct InputBridge {
    route_rx: watch::Receiver<Option<InputRoute>>,
}

impl InputBridge {
    pub(crate) fn new(route_rx: watch::Receiver<Option<InputRoute>>) -> Self {
        Self { route_rx }
    }

    fn route(&self) -> Option<InputRoute> {
        self.route_rx.borrow().clone()
    }

    /// Inject a touch event at normalized video coordinates.
    ///
    /// Coordinates outside 0..1 are clamped; without an active
    /// session this is a no-op.
    pub async fn touch(&self, action: TouchAction, nx: f64, ny: f64) {
        let Some(route) = self.route() else { return };
        let event = TouchEvent {
            action,
            x: scale_axis(nx, route.device.width),
            y: scale_axis(ny, route.device.height),
        };
        if let Err(e) = route.controller.inject_touch(event).await {
            warn!(error = %e, "touch injection failed");
        }
    }

    /// Inject a key event by numeric device key code.
    pub async fn key(&self, action: KeyAction, keycode: u32) {
        let Some(route) = self.route() else { return };
        if let Err(e) = route.controller.inject_key(action, keycode).await {
            warn!(error = %e, keycode, "key injection failed");
        }
    }

    /// Inject raw text (printable characters).
    pub async fn text(&self, text: &str) {
        let Some(route) = self.route() else { return };
        if let Err(e) = route.controller.inject_text(text).await {
            warn!(error = %e, "text injection failed");
        }
    }

    /// Toggle the device screen power mode.
    pub async fn set_screen_power_mode(&self, mode: ScreenPowerMode) {
        let Some(route) = self.route() else { return };
        if let Err(e) = route.controller.set_screen_power_mode(mode).await {
            warn!(error = %e, "screen power toggle failed");
        }
    }

    /// Push host clipboard text to the device, optionally pasting it
    /// immediately.
    pub async fn set_clipboard(&self, text: &str, paste: bool) {
        let Some(route) = self.route() else { return };
        if let Err(e) = route.controller.set_clipboard(text, paste).await {
            warn!(error = %e, "clipboard push failed");
        }
    }
}

/// Scale a normalized coordinate to an absolute pixel on one axis.
fn scale_axis(n: f64, extent: u32) -> u32 {
    if extent == 0 {
        return 0;
    }
    let px = (n.clamp(0.0, 1.0) * extent as f64) as u32;
    px.min(extent - 1)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingController {
        touches: Mutex<Vec<TouchEvent>>,
        keys: Mutex<Vec<(KeyAction, u32)>>,
        texts: Mutex<Vec<String>>,
        clipboard: Mutex<Vec<(String, bool)>>,
        fail: bool,
    }

    #[async_trait]
    impl DeviceController for RecordingController {
        async fn inject_touch(&self, event: TouchEvent) -> Result<(), SessionError> {
            if self.fail {
                return Err(SessionError::Injection("nope".into()));
            }
            self.touches.lock().unwrap().push(event);
            Ok(())
        }
        async fn inject_key(&self, action: KeyAction, keycode: u32) -> Result<(), SessionError> {
            self.keys.lock().unwrap().push((action, keycode));
            Ok(())
        }
        async fn inject_text(&self, text: &str) -> Result<(), SessionError> {
            self.texts.lock().unwrap().push(text.to_string());
            Ok(())
        }
        async fn set_clipboard(&self, text: &str, paste: bool) -> Result<(), SessionError> {
            self.clipboard.lock().unwrap().push((text.to_string(), paste));
            Ok(())
        }
        async fn set_screen_power_mode(&self, _mode: ScreenPowerMode) -> Result<(), SessionError> {
            Ok(())
        }
    }

    fn bridge_with_route(
        controller: Arc<RecordingController>,
        device: SizePx,
    ) -> (InputBridge, watch::Sender<Option<InputRoute>>) {
        let (tx, rx) = watch::channel(Some(InputRoute {
            controller,
            device,
        }));
        (InputBridge::new(rx), tx)
    }

    #[tokio::test]
    async fn touch_scales_to_device_pixels() {
        let controller = Arc::new(RecordingController::default());
        let (bridge, _tx) = bridge_with_route(controller.clone(), SizePx::new(1080, 2400));

        bridge.touch(TouchAction::Down, 0.5, 0.25).await;

        let touches = controller.touches.lock().unwrap();
        assert_eq!(touches.len(), 1);
        assert_eq!((touches[0].x, touches[0].y), (540, 600));
        assert_eq!(touches[0].action, TouchAction::Down);
    }

    #[tokio::test]
    async fn touch_clamps_out_of_range() {
        let controller = Arc::new(RecordingController::default());
        let (bridge, _tx) = bridge_with_route(controller.clone(), SizePx::new(1080, 2400));

        bridge.touch(TouchAction::Move, 1.5, -0.2).await;

        let touches = controller.touches.lock().unwrap();
        assert_eq!((touches[0].x, touches[0].y), (1079, 0));
    }

    #[tokio::test]
    async fn no_route_is_a_silent_noop() {
        let (_tx, rx) = watch::channel(None);
        let bridge = InputBridge::new(rx);

        // Nothing to assert beyond "does not panic / does not hang".
        bridge.touch(TouchAction::Down, 0.5, 0.5).await;
        bridge.key(KeyAction::Down, 24).await;
        bridge.text("hello").await;
        bridge.set_clipboard("copy", false).await;
    }

    #[tokio::test]
    async fn cleared_route_stops_injection() {
        let controller = Arc::new(RecordingController::default());
        let (bridge, tx) = bridge_with_route(controller.clone(), SizePx::new(1080, 2400));

        bridge.touch(TouchAction::Down, 0.5, 0.5).await;
        tx.send(None).unwrap();
        bridge.touch(TouchAction::Up, 0.5, 0.5).await;

        // Only the first event reached the controller.
        assert_eq!(controller.touches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_injection_is_swallowed() {
        let controller = Arc::new(RecordingController {
            fail: true,
            ..Default::default()
        });
        let (bridge, _tx) = bridge_with_route(controller, SizePx::new(1080, 2400));

        // Must not panic or propagate.
        bridge.touch(TouchAction::Down, 0.1, 0.1).await;
    }

    #[tokio::test]
    async fn key_and_text_pass_through() {
        let controller = Arc::new(RecordingController::default());
        let (bridge, _tx) = bridge_with_route(controller.clone(), SizePx::new(1080, 2400));

        bridge.key(KeyAction::Down, 26).await;
        bridge.key(KeyAction::Up, 26).await;
        bridge.text("droid").await;
        bridge.set_clipboard("paste me", true).await;

        assert_eq!(
            *controller.keys.lock().unwrap(),
            vec![(KeyAction::Down, 26), (KeyAction::Up, 26)]
        );
        assert_eq!(*controller.texts.lock().unwrap(), vec!["droid"]);
        assert_eq!(
            *controller.clipboard.lock().unwrap(),
            vec![("paste me".to_string(), true)]
        );
    }

    // ── VideoLayout ──────────────────────────────────────────────

    #[test]
    fn layout_without_letterbox_maps_directly() {
        // Container and video share the 9:16 aspect ratio.
        let layout = VideoLayout::new(SizeF::new(270.0, 600.0), SizePx::new(1080, 2400));
        let (nx, ny) = layout.normalize(135.0, 300.0).unwrap();
        assert!((nx - 0.5).abs() < 1e-9);
        assert!((ny - 0.5).abs() < 1e-9);
    }

    #[test]
    fn layout_excludes_pillarbox_bars() {
        // Portrait video in a wide container → pillarboxed: a 270-wide
        // drawn region centered at x = 365 in a 1000-wide container.
        let layout = VideoLayout::new(SizeF::new(1000.0, 600.0), SizePx::new(1080, 2400));
        let (vx, _, vw, vh) = layout.video_rect();
        assert!((vw - 270.0).abs() < 1e-9);
        assert!((vh - 600.0).abs() < 1e-9);
        assert!((vx - 365.0).abs() < 1e-9);

        // Inside the bar: no coordinates.
        assert!(layout.normalize(100.0, 300.0).is_none());
        // Center of the drawn region.
        let (nx, ny) = layout.normalize(500.0, 300.0).unwrap();
        assert!((nx - 0.5).abs() < 1e-9);
        assert!((ny - 0.5).abs() < 1e-9);
    }

    #[test]
    fn degenerate_layout_is_safe() {
        let layout = VideoLayout::new(SizeF::new(0.0, 0.0), SizePx::new(1080, 2400));
        assert!(layout.normalize(10.0, 10.0).is_none());
    }
}
