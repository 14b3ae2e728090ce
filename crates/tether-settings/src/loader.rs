//! Settings loading with deep merge, environment overrides, and credential
//! resolution.
//!
//! Loading flow:
//! 1. Start with compiled [`TetherSettings::default()`]
//! 2. If `~/.tether/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)
//!
//! The credential never lives in the settings file; it is resolved from the
//! environment at session start so it cannot end up in a merged JSON dump.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{
    CREDENTIAL_ENV, CREDENTIAL_ENV_FALLBACK, KeepAliveVariant, PLACEHOLDER_CREDENTIAL,
    TetherSettings,
};

/// Resolve the path to the settings file (`~/.tether/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tether").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TetherSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<TetherSettings> {
    let defaults = serde_json::to_value(TetherSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: TetherSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Resolve the service credential from the environment.
///
/// Checks [`CREDENTIAL_ENV`] first, then [`CREDENTIAL_ENV_FALLBACK`]. An
/// unset, empty, or placeholder value is an error — surfaced to the user,
/// never a crash.
pub fn resolve_credential() -> Result<String> {
    let value = std::env::var(CREDENTIAL_ENV)
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| {
            std::env::var(CREDENTIAL_ENV_FALLBACK)
                .ok()
                .filter(|v| !v.is_empty())
        });

    check_credential_value(value)
}

/// Validate a candidate credential value (pure; testable without env vars).
pub fn check_credential_value(value: Option<String>) -> Result<String> {
    match value {
        None => Err(SettingsError::Credential(format!(
            "{CREDENTIAL_ENV} is not set"
        ))),
        Some(v) if v == PLACEHOLDER_CREDENTIAL => Err(SettingsError::Credential(format!(
            "{CREDENTIAL_ENV} is still the placeholder value"
        ))),
        Some(v) => Ok(v),
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Each env var has strict parsing rules; invalid values are logged and
/// ignored (falling back to file/default).
pub fn apply_env_overrides(settings: &mut TetherSettings) {
    // ── Service ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("TETHER_ENDPOINT") {
        settings.service.endpoint = v;
    }
    if let Some(v) = read_env_string("TETHER_MODEL") {
        settings.service.model = v;
    }

    // ── Keep-alive ──────────────────────────────────────────────────
    if let Some(v) = read_env_string("TETHER_KEEPALIVE") {
        match parse_keepalive_variant(&v) {
            Some(variant) => settings.keep_alive.variant = variant,
            None => {
                tracing::warn!(value = %v, "invalid TETHER_KEEPALIVE, ignoring");
            }
        }
    }
    if let Some(v) = read_env_u64("TETHER_PING_INTERVAL_MS", 1000, 600_000) {
        settings.keep_alive.ping_interval_ms = v;
    }
    if let Some(v) = read_env_u64("TETHER_ENVELOPE_INTERVAL_MS", 1000, 3_600_000) {
        settings.keep_alive.envelope_interval_ms = v;
    }

    // ── Reconnect ───────────────────────────────────────────────────
    if let Some(v) = read_env_u32("TETHER_MAX_RECONNECT_ATTEMPTS", 0, 100) {
        settings.reconnect.max_attempts = v;
    }
    if let Some(v) = read_env_u64("TETHER_RECONNECT_BASE_MS", 1, 600_000) {
        settings.reconnect.base_delay_ms = v;
    }
    if let Some(v) = read_env_u64("TETHER_RECONNECT_CAP_MS", 1, 3_600_000) {
        settings.reconnect.max_delay_ms = v;
    }

    // ── Dispatch ────────────────────────────────────────────────────
    if let Some(v) = read_env_u64("TETHER_DEBOUNCE_MS", 0, 60_000) {
        settings.dispatch.debounce_ms = v;
    }
    if let Some(v) = read_env_u64("TETHER_REQUEST_TIMEOUT_MS", 1000, 3_600_000) {
        settings.dispatch.request_timeout_ms = v;
    }
    if let Some(v) = read_env_u64("TETHER_WINDOW_RADIUS", 1, 10_000) {
        if let Ok(radius) = usize::try_from(v) {
            settings.dispatch.window_radius = radius;
        }
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a keep-alive variant name.
pub fn parse_keepalive_variant(val: &str) -> Option<KeepAliveVariant> {
    match val.to_lowercase().as_str() {
        "protocol_ping" | "ping" => Some(KeepAliveVariant::ProtocolPing),
        "app_envelope" | "envelope" => Some(KeepAliveVariant::AppEnvelope),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_u32(name: &str, min: u32, max: u32) -> Option<u32> {
    let val = std::env::var(name).ok()?;
    let result = parse_u32_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u32 env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
