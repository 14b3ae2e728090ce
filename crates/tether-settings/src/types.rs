//! Settings type definitions.
//!
//! All fields are serde-defaulted so a partial user file deep-merges cleanly
//! over compiled defaults.

use serde::{Deserialize, Serialize};
use tether_core::backoff::BackoffConfig;

/// Default bidirectional generation endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/\
google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-live-001";

/// Known placeholder credential value shipped in sample config files.
pub const PLACEHOLDER_CREDENTIAL: &str = "AIza...";

/// Primary credential environment variable.
pub const CREDENTIAL_ENV: &str = "TETHER_API_KEY";

/// Legacy credential environment variable, honored as a fallback.
pub const CREDENTIAL_ENV_FALLBACK: &str = "GEMINI_API_KEY";

/// Top-level settings for the Tether session core.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TetherSettings {
    /// Remote service parameters.
    #[serde(default)]
    pub service: ServiceSettings,
    /// Keep-alive mechanism selection and intervals.
    #[serde(default)]
    pub keep_alive: KeepAliveSettings,
    /// Reconnection backoff parameters.
    #[serde(default)]
    pub reconnect: BackoffConfig,
    /// Event dispatch parameters.
    #[serde(default)]
    pub dispatch: DispatchSettings,
}

/// Remote generation service parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSettings {
    /// WebSocket endpoint (without the credential query parameter).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model identifier sent in the setup envelope.
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.into()
}
fn default_model() -> String {
    DEFAULT_MODEL.into()
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
        }
    }
}

impl ServiceSettings {
    /// Full connection URL with the credential attached.
    ///
    /// A pathless endpoint gets a `/` before the query: the WebSocket
    /// handshake request-target must start with a path.
    #[must_use]
    pub fn url_with_key(&self, key: &str) -> String {
        let has_path = self
            .endpoint
            .find("://")
            .is_some_and(|i| self.endpoint[i + 3..].contains('/'));
        if has_path {
            format!("{}?key={key}", self.endpoint)
        } else {
            format!("{}/?key={key}", self.endpoint)
        }
    }
}

/// Which keep-alive mechanism to run on an open transport.
///
/// Exactly one mechanism is active per open transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepAliveVariant {
    /// Protocol-level ping frames at a short interval.
    ProtocolPing,
    /// Application-level keep-alive envelopes at a long interval, sized to
    /// land just under the service's idle timeout.
    AppEnvelope,
}

/// Keep-alive configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeepAliveSettings {
    /// Selected mechanism.
    #[serde(default = "default_variant")]
    pub variant: KeepAliveVariant,
    /// Ping-frame interval in ms (protocol variant).
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// Keep-alive envelope interval in ms (application variant). Default is
    /// nine minutes, for a service with a ten-minute idle timeout.
    #[serde(default = "default_envelope_interval_ms")]
    pub envelope_interval_ms: u64,
}

fn default_variant() -> KeepAliveVariant {
    KeepAliveVariant::ProtocolPing
}
fn default_ping_interval_ms() -> u64 {
    30_000
}
fn default_envelope_interval_ms() -> u64 {
    540_000
}

impl Default for KeepAliveSettings {
    fn default() -> Self {
        Self {
            variant: default_variant(),
            ping_interval_ms: default_ping_interval_ms(),
            envelope_interval_ms: default_envelope_interval_ms(),
        }
    }
}

impl KeepAliveSettings {
    /// Interval of the active mechanism in ms.
    #[must_use]
    pub fn active_interval_ms(&self) -> u64 {
        match self.variant {
            KeepAliveVariant::ProtocolPing => self.ping_interval_ms,
            KeepAliveVariant::AppEnvelope => self.envelope_interval_ms,
        }
    }
}

/// Host-event dispatch parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchSettings {
    /// Debounce delay for document-change events in ms.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Timeout for one-shot requests in ms.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Lines included on each side of the cursor in editor snapshots.
    #[serde(default = "default_window_radius")]
    pub window_radius: usize,
}

fn default_debounce_ms() -> u64 {
    300
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_window_radius() -> usize {
    150
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            window_radius: default_window_radius(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
