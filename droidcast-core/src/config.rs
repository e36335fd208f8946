//! Configuration for the display session core.
//!
//! Every knob has a serde default so hosts can supply partial
//! configuration and still get the documented behavior.

use serde::{Deserialize, Serialize};

/// Top-level session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Performance monitoring / degradation policy.
    pub monitor: MonitorConfig,
    /// Resize reconciliation tuning.
    pub resize: ResizeConfig,
    /// Virtual display (desktop mode) geometry derivation.
    pub desktop: DesktopConfig,
    /// Reduced bit rate (bits/second) requested during a
    /// resize-triggered restart to shorten the visual disruption.
    /// The next explicit action returns to the preset's bit rate.
    pub transition_bit_rate: u32,
    /// Optional watermark label drawn in a corner of every frame.
    pub watermark: Option<String>,
    /// Whether the degradation policy starts enabled. A manual preset
    /// switch disables it until the host re-enables.
    pub auto_adapt: bool,
}

/// Performance monitor tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sampling interval in milliseconds.
    pub interval_ms: u64,
    /// Frames-per-second floor; samples below it count as slow.
    pub threshold_fps: f64,
    /// Consecutive slow windows required before a degradation signal.
    pub slow_window_count: u32,
}

/// Resize reconciliation tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeConfig {
    /// Minimum delta (pixels, either dimension) since the last
    /// successful start before a resize is acted on.
    pub threshold_px: u32,
    /// Quiet period with no further resizes before restarting.
    pub debounce_ms: u64,
}

/// Virtual display geometry derivation (desktop mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    /// Reference smaller-dimension the DPI scale is anchored to.
    pub reference_dim: u32,
    /// DPI at the reference dimension.
    pub reference_dpi: u32,
    /// Lower DPI clamp for small containers.
    pub min_dpi: u32,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            resize: ResizeConfig::default(),
            desktop: DesktopConfig::default(),
            transition_bit_rate: 1_000_000,
            watermark: None,
            auto_adapt: true,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            threshold_fps: 15.0,
            slow_window_count: 4,
        }
    }
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            threshold_px: 50,
            debounce_ms: 500,
        }
    }
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            reference_dim: 1080,
            reference_dpi: 240,
            min_dpi: 120,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.monitor.interval_ms, 5_000);
        assert_eq!(cfg.monitor.threshold_fps, 15.0);
        assert_eq!(cfg.monitor.slow_window_count, 4);
        assert_eq!(cfg.resize.threshold_px, 50);
        assert_eq!(cfg.resize.debounce_ms, 500);
        assert!(cfg.auto_adapt);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: SessionConfig =
            serde_json::from_str(r#"{"monitor": {"threshold_fps": 20.0}}"#).unwrap();
        assert_eq!(cfg.monitor.threshold_fps, 20.0);
        // Untouched fields fall back to defaults.
        assert_eq!(cfg.monitor.interval_ms, 5_000);
        assert_eq!(cfg.resize.threshold_px, 50);
    }

    #[test]
    fn roundtrip_json() {
        let cfg = SessionConfig {
            watermark: Some("droidcast".into()),
            ..Default::default()
        };
        let text = serde_json::to_string(&cfg).unwrap();
        let back: SessionConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.watermark.as_deref(), Some("droidcast"));
        assert_eq!(back.transition_bit_rate, cfg.transition_bit_rate);
    }
}
