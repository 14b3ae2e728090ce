//! Settings error types.

use thiserror::Error;

/// Errors that can occur when loading settings or resolving the credential.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to read the settings file from disk.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse JSON in the settings file.
    #[error("failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The service credential is missing or a placeholder.
    #[error("service credential unavailable: {0}")]
    Credential(String),
}

impl SettingsError {
    /// Convert into the core error taxonomy (credential problems are
    /// configuration errors as far as the session is concerned).
    #[must_use]
    pub fn into_tether(self) -> tether_core::TetherError {
        tether_core::TetherError::Config(self.to_string())
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
