//! Virtual display ("desktop mode") geometry derivation.
//!
//! Desktop mode mirrors a created virtual display instead of the
//! device's physical screen. Its geometry comes from the host
//! container's rendered size: the downstream encoder requires even
//! dimensions, and the display density is scaled from a reference
//! size/DPI pair so content keeps a usable physical size.

use crate::config::DesktopConfig;
use crate::surface::SizeF;
use crate::transport::ProvisionRequest;

/// Computed virtual display geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesktopGeometry {
    /// Display width in pixels (even).
    pub width: u32,
    /// Display height in pixels (even).
    pub height: u32,
    /// Derived display density.
    pub dpi: u32,
}

/// Derive virtual display geometry from the host container size.
///
/// Width and height are rounded down to the nearest even integer.
/// DPI scales with the smaller dimension against the configured
/// reference pair and is clamped to the configured minimum.
pub fn desktop_geometry(container: SizeF, cfg: &DesktopConfig) -> DesktopGeometry {
    let width = (container.width.max(0.0) as u32) & !1;
    let height = (container.height.max(0.0) as u32) & !1;

    let smaller = width.min(height);
    let scaled = (smaller as u64 * cfg.reference_dpi as u64) / cfg.reference_dim.max(1) as u64;
    let dpi = (scaled as u32).max(cfg.min_dpi);

    DesktopGeometry { width, height, dpi }
}

impl DesktopGeometry {
    /// Build the transport provisioning request for this geometry,
    /// with rate bounds taken from the selected quality preset.
    pub fn provision_request(&self, bit_rate: u32, max_frame_rate: u32) -> ProvisionRequest {
        ProvisionRequest::Desktop {
            width: self.width,
            height: self.height,
            dpi: self.dpi,
            bit_rate,
            max_frame_rate,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
