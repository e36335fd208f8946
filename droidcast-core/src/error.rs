//! Domain-specific error types for the display session core.
//!
//! All fallible operations return `Result<T, SessionError>`.
//! No panics on invalid input — every error is typed and recoverable.
//!
//! Only provisioning and protocol errors are user-visible failures;
//! cancellation and injection errors are local by design (see
//! [`SessionError::is_expected_cancellation`]).

use thiserror::Error;

/// The canonical error type for the display session core.
#[derive(Debug, Error)]
pub enum SessionError {
    // ── Provisioning Errors ──────────────────────────────────────
    /// The transport could not establish the device connection.
    #[error("provisioning failed: {0}")]
    Provision(String),

    /// A session start was requested while another session is live.
    #[error("a session is already starting or active")]
    SessionBusy,

    /// No drawing surface was supplied for the start request.
    #[error("no drawing surface bound")]
    NoSurface,

    // ── Protocol / Metadata Errors ───────────────────────────────
    /// The video stream's metadata was missing or malformed.
    #[error("invalid stream metadata: {0}")]
    Protocol(&'static str),

    /// The device reported a codec the host cannot present.
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    // ── Cancellation ─────────────────────────────────────────────
    /// A stream or channel was aborted by our own stop/restart call.
    ///
    /// Always recovered silently — never surfaced to the UI.
    #[error("operation cancelled")]
    Cancelled,

    // ── Injection Errors ─────────────────────────────────────────
    /// A single touch/key/text/clipboard injection failed.
    ///
    /// Logged and dropped; the session keeps running.
    #[error("input injection failed: {0}")]
    Injection(String),

    // ── Connection Errors ────────────────────────────────────────
    /// The underlying I/O layer reported an error.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    /// An mpsc/watch channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// The video stream ended without being cancelled (device side
    /// disconnected or the mirroring server exited).
    #[error("stream ended unexpectedly")]
    StreamEnded,

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

impl SessionError {
    /// Whether this error is an expected consequence of our own
    /// stop/restart and must be swallowed rather than surfaced.
    ///
    /// Covers explicit cancellation plus the I/O shapes a torn-down
    /// transport produces when the pipe observes the disconnect first.
    pub fn is_expected_cancellation(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Self::ChannelClosed => true,
            _ => false,
        }
    }

    /// Whether this error must be surfaced to the UI as a session
    /// failure (provisioning and protocol classes only).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Provision(_)
                | Self::Protocol(_)
                | Self::UnsupportedCodec(_)
                | Self::NoSurface
                | Self::StreamEnded
        )
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for SessionError {
    fn from(s: String) -> Self {
        SessionError::Other(s)
    }
}

impl From<&str> for SessionError {
    fn from(s: &str) -> Self {
        SessionError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for SessionError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        SessionError::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = SessionError::Provision("adb offline".into());
        assert!(e.to_string().contains("adb offline"));

        let e = SessionError::UnsupportedCodec("av2".into());
        assert!(e.to_string().contains("av2"));
    }

    #[test]
    fn cancellation_classification() {
        assert!(SessionError::Cancelled.is_expected_cancellation());
        assert!(SessionError::ChannelClosed.is_expected_cancellation());

        let aborted = std::io::Error::new(std::io::ErrorKind::ConnectionAborted, "gone");
        assert!(SessionError::from(aborted).is_expected_cancellation());

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        assert!(!SessionError::from(denied).is_expected_cancellation());

        assert!(!SessionError::Provision("x".into()).is_expected_cancellation());
    }

    #[test]
    fn fatal_classification() {
        assert!(SessionError::Provision("x".into()).is_fatal());
        assert!(SessionError::Protocol("no metadata").is_fatal());
        assert!(!SessionError::Injection("tap lost".into()).is_fatal());
        assert!(!SessionError::Cancelled.is_fatal());
    }

    #[test]
    fn from_string() {
        let e: SessionError = "something broke".into();
        assert!(matches!(e, SessionError::Other(_)));
    }
}
