//! # tether-settings
//!
//! Configuration management with layered sources for the Tether session core.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`TetherSettings::default()`]
//! 2. **User file** — `~/.tether/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `TETHER_*` overrides (highest priority)
//!
//! The service credential is never stored in the settings file; it is resolved
//! separately from the environment via [`resolve_credential`].
//!
//! # Usage
//!
//! ```no_run
//! use tether_settings::get_settings;
//!
//! let settings = get_settings();
//! println!("model: {}", settings.service.model);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    check_credential_value, deep_merge, load_settings, load_settings_from_path,
    resolve_credential, settings_path,
};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton.
///
/// Initialized on first access via [`get_settings`]. The settings are loaded
/// from `~/.tether/settings.json` with env var overrides, or fall back to
/// compiled defaults if loading fails.
static SETTINGS: OnceLock<TetherSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.tether/settings.json` with env var
/// overrides. On subsequent calls, returns the cached value. If loading
/// fails, returns compiled defaults.
pub fn get_settings() -> &'static TetherSettings {
    SETTINGS.get_or_init(|| load_settings().unwrap_or_default())
}

/// Initialize the global settings with a specific value.
///
/// # Errors
///
/// Returns the provided settings back if the global was already initialized.
pub fn init_settings(settings: TetherSettings) -> std::result::Result<(), TetherSettings> {
    SETTINGS.set(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
