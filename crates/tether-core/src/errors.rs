//! Error hierarchy for the Tether session core.
//!
//! One enum covers every failure domain the session can surface:
//!
//! - [`TetherError::Config`] — missing/placeholder credential, fatal to start
//! - [`TetherError::Transport`] — socket-level failure, recovered by the
//!   reconnection controller up to the attempt cap
//! - [`TetherError::Protocol`] — malformed/unexpected frame, logged only
//! - [`TetherError::NotConnected`] — send attempted while not open
//! - [`TetherError::SessionClosed`] — pending request rejected by `stop()`
//! - [`TetherError::ReconnectExhausted`] — terminal, manual restart required
//! - [`TetherError::RequestTimeout`] — one-shot request deadline elapsed
//!
//! The classification helpers ([`TetherError::is_retryable`],
//! [`TetherError::is_fatal`]) drive the propagation policy: retryable errors
//! feed the reconnection controller, fatal ones are surfaced once to the
//! editor host and the session stays disconnected.

use thiserror::Error;

/// Top-level error type for the Tether session core.
#[derive(Debug, Error)]
pub enum TetherError {
    /// Missing or placeholder service credential. Fatal to `start()`,
    /// user-visible, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Socket-level failure. Triggers the reconnection controller.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed or unexpected inbound frame. Logged, does not tear down
    /// the session.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A send was attempted while the session was not open.
    #[error("session is not connected")]
    NotConnected,

    /// A pending request was rejected because the session was stopped.
    #[error("session closed while request was pending")]
    SessionClosed,

    /// The reconnection controller ran out of attempts.
    #[error("reconnection failed after {attempts} attempts")]
    ReconnectExhausted {
        /// How many attempts were made before giving up.
        attempts: u32,
    },

    /// A one-shot request did not complete within its deadline.
    #[error("request timed out after {timeout_ms} ms")]
    RequestTimeout {
        /// The configured timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The remote service reported an explicit error frame.
    #[error("service error {code}: {message}")]
    Service {
        /// Service-assigned error code.
        code: i64,
        /// Human-readable message from the service.
        message: String,
    },
}

impl TetherError {
    /// Whether the reconnection controller should attempt recovery.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::NotConnected)
    }

    /// Whether this error ends the session until a manual restart.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::ReconnectExhausted { .. } | Self::SessionClosed
        )
    }

    /// Machine-readable code for logging and host display.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Transport(_) => "TRANSPORT",
            Self::Protocol(_) => "PROTOCOL",
            Self::NotConnected => "NOT_CONNECTED",
            Self::SessionClosed => "SESSION_CLOSED",
            Self::ReconnectExhausted { .. } => "RECONNECT_EXHAUSTED",
            Self::RequestTimeout { .. } => "REQUEST_TIMEOUT",
            Self::Service { .. } => "SERVICE",
        }
    }
}

/// Result type for Tether operations.
pub type Result<T> = std::result::Result<T, TetherError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = TetherError::Config("API key not set".into());
        assert_eq!(err.to_string(), "configuration error: API key not set");
    }

    #[test]
    fn reconnect_exhausted_display() {
        let err = TetherError::ReconnectExhausted { attempts: 5 };
        assert_eq!(err.to_string(), "reconnection failed after 5 attempts");
    }

    #[test]
    fn request_timeout_display() {
        let err = TetherError::RequestTimeout { timeout_ms: 30_000 };
        assert!(err.to_string().contains("30000 ms"));
    }

    #[test]
    fn service_error_display() {
        let err = TetherError::Service {
            code: 429,
            message: "quota exceeded".into(),
        };
        assert_eq!(err.to_string(), "service error 429: quota exceeded");
    }

    #[test]
    fn transport_is_retryable_not_fatal() {
        let err = TetherError::Transport("connection reset".into());
        assert!(err.is_retryable());
        assert!(!err.is_fatal());
    }

    #[test]
    fn not_connected_is_retryable() {
        assert!(TetherError::NotConnected.is_retryable());
    }

    #[test]
    fn config_is_fatal_not_retryable() {
        let err = TetherError::Config("missing".into());
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
    }

    #[test]
    fn exhausted_is_fatal() {
        assert!(TetherError::ReconnectExhausted { attempts: 5 }.is_fatal());
    }

    #[test]
    fn protocol_is_neither_retryable_nor_fatal() {
        let err = TetherError::Protocol("truncated frame".into());
        assert!(!err.is_retryable());
        assert!(!err.is_fatal());
    }

    #[test]
    fn codes_are_distinct() {
        let errors = [
            TetherError::Config(String::new()),
            TetherError::Transport(String::new()),
            TetherError::Protocol(String::new()),
            TetherError::NotConnected,
            TetherError::SessionClosed,
            TetherError::ReconnectExhausted { attempts: 0 },
            TetherError::RequestTimeout { timeout_ms: 0 },
            TetherError::Service {
                code: 0,
                message: String::new(),
            },
        ];
        let codes: std::collections::HashSet<_> = errors.iter().map(TetherError::code).collect();
        assert_eq!(codes.len(), errors.len());
    }
}
