//! Frame renderer and overlay compositor.
//!
//! Draws each decoded frame to the full drawing surface, then, if an
//! overlay is configured, maps the overlay's host-side placement into
//! surface-pixel space, clips to the configured shape, draws the
//! overlay source frame, and restores un-clipped state. A fixed
//! watermark label may be drawn in a corner on every frame.
//!
//! The presented-draw path here is the sole place frame counts are
//! recorded, so the performance monitor only sees frames that actually
//! reached the surface.

use tracing::warn;

use crate::monitor::FrameProbe;
use crate::surface::{
    ClipRegion, FracRect, LabelCorner, PixelRect, ScreenRect, SizePx, Surface,
};
use crate::transport::VideoFrame;

// ── Overlay ──────────────────────────────────────────────────────

/// Clipping shape for the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayShape {
    /// Rounded rectangle over the full placement rect.
    RoundedRect,
    /// Circle center-cropped to the smaller dimension.
    Circle,
    /// Square center-cropped to the smaller dimension.
    Square,
    /// Fit the source's aspect ratio inside the placement rect, no crop.
    FitRect,
}

/// Provides overlay frames (e.g. a picture-in-picture webcam feed).
///
/// Absent source = no overlay drawing at all; returning `None` skips
/// the overlay for that frame only.
pub trait OverlaySource: Send {
    fn next_frame(&mut self) -> Option<VideoFrame>;
}

/// Placement and shape of the compositor overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlaySpec {
    pub shape: OverlayShape,
    /// Placement as fractions of the rendering surface, independent
    /// of the surface resolution.
    pub placement: FracRect,
    /// Corner radius in surface pixels for [`OverlayShape::RoundedRect`].
    pub corner_radius: f64,
}

impl OverlaySpec {
    /// Build a placement from host-side on-screen bounds: the overlay
    /// container's bounds expressed as a ratio of the mirroring
    /// container's bounds.
    pub fn from_screen_bounds(
        shape: OverlayShape,
        overlay: ScreenRect,
        container: ScreenRect,
        corner_radius: f64,
    ) -> Option<Self> {
        if container.width <= 0.0 || container.height <= 0.0 {
            return None;
        }
        Some(Self {
            shape,
            placement: FracRect {
                x: (overlay.x - container.x) / container.width,
                y: (overlay.y - container.y) / container.height,
                width: overlay.width / container.width,
                height: overlay.height / container.height,
            },
            corner_radius,
        })
    }
}

// ── Layout helpers ───────────────────────────────────────────────

/// Largest rect with `content`'s aspect ratio centered in `bounds`.
pub fn fit_rect(content: SizePx, bounds: PixelRect) -> PixelRect {
    if content.width == 0 || content.height == 0 || bounds.width == 0 || bounds.height == 0 {
        return bounds;
    }
    let scale = f64::min(
        bounds.width as f64 / content.width as f64,
        bounds.height as f64 / content.height as f64,
    );
    let width = (content.width as f64 * scale) as u32;
    let height = (content.height as f64 * scale) as u32;
    PixelRect {
        x: bounds.x + (bounds.width - width) / 2,
        y: bounds.y + (bounds.height - height) / 2,
        width,
        height,
    }
}

// ── Renderer ─────────────────────────────────────────────────────

/// Draws decoded frames and composites the optional overlay.
pub struct Renderer {
    surface: Box<dyn Surface>,
    probe: FrameProbe,
    overlay: Option<(OverlaySpec, Box<dyn OverlaySource>)>,
    watermark: Option<String>,
}

impl Renderer {
    /// Bind a surface sized to the device-reported geometry.
    pub fn bind(
        mut surface: Box<dyn Surface>,
        geometry: SizePx,
        probe: FrameProbe,
        watermark: Option<String>,
    ) -> Self {
        surface.set_resolution(geometry);
        Self {
            surface,
            probe,
            overlay: None,
            watermark,
        }
    }

    /// Install or replace the overlay.
    pub fn set_overlay(&mut self, spec: OverlaySpec, source: Box<dyn OverlaySource>) {
        self.overlay = Some((spec, source));
    }

    /// Remove the overlay.
    pub fn clear_overlay(&mut self) {
        self.overlay = None;
    }

    /// Draw one frame. Draw failures are logged and dropped; the
    /// frame is simply not counted as presented.
    pub fn render(&mut self, frame: &VideoFrame) {
        let resolution = self.surface.resolution();
        let full = PixelRect::new(0, 0, resolution.width, resolution.height);

        if let Err(e) = self.surface.draw_frame(frame, full) {
            warn!(error = %e, "frame draw failed");
            return;
        }

        if let Some((spec, source)) = &mut self.overlay {
            if let Some(overlay_frame) = source.next_frame() {
                let rect = spec.placement.to_pixels(resolution);
                draw_overlay(self.surface.as_mut(), spec, &overlay_frame, rect);
            }
        }

        if let Some(label) = &self.watermark {
            self.surface.draw_label(label, LabelCorner::BottomRight);
        }

        self.probe.record_frame();
    }

    /// Release the surface binding, returning the surface and any
    /// overlay so a restart can rebind them.
    pub fn into_parts(self) -> (Box<dyn Surface>, Option<(OverlaySpec, Box<dyn OverlaySource>)>) {
        (self.surface, self.overlay)
    }
}

fn draw_overlay(
    surface: &mut dyn Surface,
    spec: &OverlaySpec,
    frame: &VideoFrame,
    rect: PixelRect,
) {
    if rect.width == 0 || rect.height == 0 {
        return;
    }

    match spec.shape {
        OverlayShape::RoundedRect => {
            surface.push_clip(ClipRegion::RoundedRect {
                rect,
                radius: spec.corner_radius,
            });
            let _ = surface.draw_frame(frame, rect);
            surface.pop_clip();
        }
        OverlayShape::Circle => {
            let square = rect.center_square();
            surface.push_clip(ClipRegion::Circle { rect: square });
            let _ = surface.draw_frame(frame, square);
            surface.pop_clip();
        }
        OverlayShape::Square => {
            let square = rect.center_square();
            surface.push_clip(ClipRegion::Rect { rect: square });
            let _ = surface.draw_frame(frame, square);
            surface.pop_clip();
        }
        OverlayShape::FitRect => {
            let fitted = fit_rect(SizePx::new(frame.width, frame.height), rect);
            let _ = surface.draw_frame(frame, fitted);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
