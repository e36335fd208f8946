//! Session phases and the host-facing event surface.

use serde::{Deserialize, Serialize};

use crate::quality::PresetId;

// ── SessionPhase ─────────────────────────────────────────────────

/// The current phase of the display session.
///
/// ```text
///  Idle ──► Starting ──► Active ◄──► Adapting
///              │            │            │
///              ▼            ▼            ▼
///           Failed ◄──── Stopped ◄───────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// No session has been started. Initial state.
    #[default]
    Idle,

    /// Provisioning the transport and opening the video stream.
    Starting,

    /// Frames are flowing and input is accepted.
    Active,

    /// A restart (degrade, resize or preset switch) is in progress.
    Adapting,

    /// Torn down cleanly. Terminal until the next start.
    Stopped,

    /// Torn down after a provisioning or protocol error.
    Failed,
}

impl SessionPhase {
    /// A live session exists (no new start may begin).
    pub fn is_live(self) -> bool {
        matches!(self, Self::Starting | Self::Active | Self::Adapting)
    }

    /// Input injection is allowed.
    pub fn accepts_input(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Starting => write!(f, "Starting"),
            Self::Active => write!(f, "Active"),
            Self::Adapting => write!(f, "Adapting"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

// ── SessionStatus ────────────────────────────────────────────────

/// Snapshot of the session published to the host UI via `watch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Current phase.
    pub phase: SessionPhase,
    /// Currently selected preset.
    pub preset: PresetId,
    /// Last measured frames per second.
    pub fps: f64,
    /// A restart is pending or in progress ("adapting, please wait").
    pub adapting: bool,
    /// Authoritative device-reported width, 0 before the first start.
    pub width: u32,
    /// Authoritative device-reported height, 0 before the first start.
    pub height: u32,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            preset: PresetId::Ultra,
            fps: 0.0,
            adapting: false,
            width: 0,
            height: 0,
        }
    }
}

// ── SessionEvent ─────────────────────────────────────────────────

/// One-shot notifications pushed to the host UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The phase changed.
    PhaseChanged(SessionPhase),
    /// An automatic downgrade completed.
    QualityDegraded { from: PresetId, to: PresetId },
    /// A degradation signal arrived at the ladder floor; nothing to
    /// drop to, the session stays as is.
    AlreadyAtMinimum,
    /// Restart busy flag ("adapting, please wait").
    Adapting(bool),
    /// The session failed with a user-visible error message.
    Failed(String),
    /// The device clipboard changed.
    ClipboardFromDevice(String),
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_phases() {
        assert!(SessionPhase::Starting.is_live());
        assert!(SessionPhase::Active.is_live());
        assert!(SessionPhase::Adapting.is_live());
        assert!(!SessionPhase::Idle.is_live());
        assert!(!SessionPhase::Stopped.is_live());
        assert!(!SessionPhase::Failed.is_live());
    }

    #[test]
    fn only_active_accepts_input() {
        assert!(SessionPhase::Active.accepts_input());
        assert!(!SessionPhase::Adapting.accepts_input());
        assert!(!SessionPhase::Stopped.accepts_input());
    }

    #[test]
    fn status_snapshot_serializes() {
        let status = SessionStatus {
            phase: SessionPhase::Active,
            preset: PresetId::High,
            fps: 42.5,
            adapting: false,
            width: 1080,
            height: 2400,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"active\""));
        assert!(json.contains("\"high\""));
        let back: SessionStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }
}
