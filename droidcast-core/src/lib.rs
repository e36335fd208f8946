//! # droidcast-core
//!
//! Adaptive-quality remote display session core for the droidcast
//! device console. Establishes a live screen-mirroring stream from a
//! connected Android device, renders decoded frames, injects
//! touch/key/text/clipboard events back into the device, and
//! automatically degrades stream quality under sustained
//! underperformance.
//!
//! ## Architecture
//!
//! ```text
//! HOST UI                                   DEVICE (via Transport)
//! ┌──────────────────────────┐             ┌─────────────────────┐
//! │ SessionHandle            │  provision  │ mirroring endpoint  │
//! │   │ commands             │ ──────────► │                     │
//! │   ▼                      │   frames    │ video elbow stream  │
//! │ SessionController ◄──────┼──────────── │                     │
//! │   │        │             │  injection  │ controller channel  │
//! │ Renderer  PerfMonitor    │ ──────────► │                     │
//! │   │        │             │  clipboard  │ clipboard channel   │
//! │ Surface   Degrade signal │ ◄─────────► │                     │
//! └──────────────────────────┘             └─────────────────────┘
//! ```
//!
//! ## Sub-modules
//!
//! | Module      | Purpose                                            |
//! |-------------|----------------------------------------------------|
//! | `quality`   | Fixed quality ladder and preset tags               |
//! | `monitor`   | Frame-rate sampling and the degradation signal     |
//! | `render`    | Frame drawing and overlay compositing              |
//! | `input`     | Normalized-to-device input injection bridge        |
//! | `session`   | Lifecycle controller (start/stop/restart/adapt)    |
//! | `desktop`   | Virtual display ("desktop mode") geometry          |
//! | `transport` | Collaborator traits for the device connection      |
//! | `surface`   | Host drawing-target trait and geometry types       |
//! | `events`    | Phases, status snapshots and UI notifications      |
//! | `config`    | Tunables with serde defaults                       |
//! | `error`     | `SessionError` — typed, `thiserror`-based errors   |

pub mod config;
pub mod desktop;
pub mod error;
pub mod events;
pub mod input;
pub mod monitor;
pub mod quality;
pub mod render;
pub mod session;
pub mod surface;
pub mod transport;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use config::{DesktopConfig, MonitorConfig, ResizeConfig, SessionConfig};
pub use desktop::{DesktopGeometry, desktop_geometry};
pub use error::SessionError;
pub use events::{SessionEvent, SessionPhase, SessionStatus};
pub use input::{InputBridge, VideoLayout};
pub use monitor::{FrameProbe, MonitorSignal, PerfMonitor, PerformanceWindow};
pub use quality::{PresetId, QualityLadder, QualityPreset};
pub use render::{OverlayShape, OverlaySource, OverlaySpec, Renderer};
pub use session::{SessionController, SessionHandle, StartRequest};
pub use surface::{ClipRegion, FracRect, LabelCorner, PixelRect, ScreenRect, SizeF, SizePx, Surface};
pub use transport::{
    ClipboardStream, DeviceConnection, DeviceController, FrameStream, KeyAction, ProvisionRequest,
    ScreenPowerMode, StreamMetadata, TouchAction, TouchEvent, Transport, VideoFrame,
};
