//! The Transport collaborator seam.
//!
//! The core treats device provisioning, the mirroring wire protocol
//! and codec decoding as a black box behind these traits: push the
//! server binary and connect ([`Transport::provision`]), then open
//! the decoded video stream, the input-injection controller and the
//! clipboard channel on the returned connection.
//!
//! All channel bindings obtained from a connection are exclusively
//! owned by the current session; a restart constructs entirely fresh
//! bindings rather than reusing old ones.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::error::SessionError;

// ── Provisioning ─────────────────────────────────────────────────

/// What the transport should provision the mirroring endpoint for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionRequest {
    /// Mirror the device's physical screen under preset bounds.
    Mirror {
        /// Longest-side resolution cap, `0` = native.
        max_dimension: u32,
        /// Video bit rate in bits/second.
        bit_rate: u32,
        /// Frame-rate cap.
        max_frame_rate: u32,
    },
    /// Create and mirror a virtual display (desktop mode).
    Desktop {
        /// Virtual display width (even).
        width: u32,
        /// Virtual display height (even).
        height: u32,
        /// Display density.
        dpi: u32,
        /// Video bit rate in bits/second.
        bit_rate: u32,
        /// Frame-rate cap.
        max_frame_rate: u32,
    },
}

impl ProvisionRequest {
    /// The bit rate carried by either request shape.
    pub fn bit_rate(&self) -> u32 {
        match self {
            Self::Mirror { bit_rate, .. } | Self::Desktop { bit_rate, .. } => *bit_rate,
        }
    }

    /// Rewrite the bit rate (used for the transition bit rate during
    /// resize-triggered restarts).
    pub fn with_bit_rate(mut self, rate: u32) -> Self {
        match &mut self {
            Self::Mirror { bit_rate, .. } | Self::Desktop { bit_rate, .. } => *bit_rate = rate,
        }
        self
    }
}

// ── Video stream ─────────────────────────────────────────────────

/// Metadata reported by the device when the video stream opens.
///
/// The device is authoritative: `width`/`height` may diverge from the
/// requested preset bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMetadata {
    /// Actual stream width in pixels.
    pub width: u32,
    /// Actual stream height in pixels.
    pub height: u32,
    /// Codec name, informational.
    pub codec: String,
}

/// A single decoded video frame.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Decoded pixel data (layout owned by the host surface).
    pub data: Bytes,
}

/// Live decoded-frame source ("video elbow stream").
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<VideoFrame, SessionError>> + Send>>;

/// Device-to-host clipboard change stream.
pub type ClipboardStream = Pin<Box<dyn Stream<Item = Result<String, SessionError>> + Send>>;

// ── Input events ─────────────────────────────────────────────────

/// Touch phases forwarded to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchAction {
    Down,
    Move,
    Up,
}

/// Key phases forwarded to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Down,
    Up,
}

/// Device screen power states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenPowerMode {
    Off,
    Normal,
}

/// A touch event in absolute device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchEvent {
    pub action: TouchAction,
    /// Absolute device X in pixels.
    pub x: u32,
    /// Absolute device Y in pixels.
    pub y: u32,
}

// ── Collaborator traits ──────────────────────────────────────────

/// Provisions mirroring endpoints on the connected device.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Push the server binary and establish a connection configured
    /// for `request`. The returned handle owns the device side; the
    /// session borrows it and drops it on stop.
    async fn provision(
        &self,
        request: &ProvisionRequest,
    ) -> Result<Box<dyn DeviceConnection>, SessionError>;
}

/// A live, provisioned device connection.
#[async_trait]
pub trait DeviceConnection: Send {
    /// Open the video elbow stream and read the device-reported
    /// metadata.
    async fn open_video(&mut self) -> Result<(StreamMetadata, FrameStream), SessionError>;

    /// Open the input-injection controller channel.
    async fn open_controller(&mut self) -> Result<Arc<dyn DeviceController>, SessionError>;

    /// Open the device-to-host clipboard channel.
    async fn open_clipboard(&mut self) -> Result<ClipboardStream, SessionError>;
}

/// Injects input into the device.
#[async_trait]
pub trait DeviceController: Send + Sync {
    /// Inject a touch event at absolute device coordinates.
    async fn inject_touch(&self, event: TouchEvent) -> Result<(), SessionError>;

    /// Inject a key event by numeric device key code.
    async fn inject_key(&self, action: KeyAction, keycode: u32) -> Result<(), SessionError>;

    /// Inject raw text (printable characters).
    async fn inject_text(&self, text: &str) -> Result<(), SessionError>;

    /// Push host clipboard text to the device, optionally pasting it
    /// immediately.
    async fn set_clipboard(&self, text: &str, paste: bool) -> Result<(), SessionError>;

    /// Toggle the device screen power mode.
    async fn set_screen_power_mode(&self, mode: ScreenPowerMode) -> Result<(), SessionError>;
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_bit_rate_rewrites_mirror() {
        let req = ProvisionRequest::Mirror {
            max_dimension: 1920,
            bit_rate: 12_000_000,
            max_frame_rate: 60,
        };
        let req = req.with_bit_rate(1_000_000);
        assert_eq!(req.bit_rate(), 1_000_000);
        assert!(matches!(
            req,
            ProvisionRequest::Mirror {
                max_dimension: 1920,
                ..
            }
        ));
    }

    #[test]
    fn with_bit_rate_rewrites_desktop() {
        let req = ProvisionRequest::Desktop {
            width: 1280,
            height: 720,
            dpi: 160,
            bit_rate: 8_000_000,
            max_frame_rate: 60,
        };
        assert_eq!(req.with_bit_rate(500_000).bit_rate(), 500_000);
    }
}
