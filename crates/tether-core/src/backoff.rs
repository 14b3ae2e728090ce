//! Reconnection backoff calculation.
//!
//! The portable, sync-only math behind the reconnection controller. The
//! controller itself (timer scheduling, state machine) lives in
//! `tether-session`; this module only answers "how long until the next
//! attempt":
//!
//! - [`BackoffConfig`]: attempt cap, base delay, ceiling, jitter
//! - [`backoff_delay_ms`]: `min(base * 2^attempt, cap)`
//! - [`backoff_delay_ms_with_random`]: the same with explicit jitter input

use serde::{Deserialize, Serialize};

/// Default maximum reconnection attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Default delay ceiling in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
/// Default jitter factor (0.0–1.0).
pub const DEFAULT_JITTER_FACTOR: f64 = 0.0;

/// Configuration for reconnection backoff.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffConfig {
    /// Maximum number of reconnection attempts (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for exponential backoff in ms (default: 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Delay ceiling in ms (default: 30000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter factor 0.0–1.0 (default: 0.0, i.e. deterministic delays).
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_jitter_factor() -> f64 {
    DEFAULT_JITTER_FACTOR
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

/// Calculate the delay before reconnection attempt `attempt` (zero-based).
///
/// Formula: `min(base_delay * 2^attempt, max_delay)`.
#[must_use]
pub fn backoff_delay_ms(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(31));
    exponential.min(max_delay_ms)
}

/// Calculate the backoff delay with explicit jitter randomness.
///
/// `random` should be a value in `[0.0, 1.0)` from a PRNG; it maps to a
/// symmetric `±jitter_factor` band around the capped exponential delay.
/// Callers supply the randomness so the scheduling logic stays testable.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn backoff_delay_ms_with_random(
    attempt: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
    random: f64,
) -> u64 {
    let capped = backoff_delay_ms(attempt, base_delay_ms, max_delay_ms);
    // Maps random [0,1) to [-jitter, +jitter]
    let jitter = 1.0 + (random * 2.0 - 1.0) * jitter_factor;
    ((capped as f64) * jitter).round().max(0.0) as u64
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // -- BackoffConfig --

    #[test]
    fn config_defaults() {
        let config = BackoffConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay_ms, 1000);
        assert_eq!(config.max_delay_ms, 30_000);
        assert!(config.jitter_factor.abs() < f64::EPSILON);
    }

    #[test]
    fn config_serde_defaults() {
        let config: BackoffConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.max_delay_ms, 30_000);
    }

    #[test]
    fn config_serde_roundtrip() {
        let config = BackoffConfig {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            jitter_factor: 0.1,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: BackoffConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_attempts, 3);
        assert_eq!(back.base_delay_ms, 500);
    }

    // -- backoff_delay_ms --

    #[test]
    fn exponential_growth() {
        assert_eq!(backoff_delay_ms(0, 1000, 30_000), 1000);
        assert_eq!(backoff_delay_ms(1, 1000, 30_000), 2000);
        assert_eq!(backoff_delay_ms(2, 1000, 30_000), 4000);
        assert_eq!(backoff_delay_ms(3, 1000, 30_000), 8000);
        assert_eq!(backoff_delay_ms(4, 1000, 30_000), 16_000);
    }

    #[test]
    fn caps_at_ceiling() {
        assert_eq!(backoff_delay_ms(5, 1000, 30_000), 30_000);
        assert_eq!(backoff_delay_ms(10, 1000, 30_000), 30_000);
    }

    #[test]
    fn high_attempt_no_overflow() {
        let delay = backoff_delay_ms(100, 1000, 30_000);
        assert_eq!(delay, 30_000);
    }

    // -- backoff_delay_ms_with_random --

    #[test]
    fn jitter_random_zero_lowers_delay() {
        // random = 0.0 → factor 1 - 0.2 = 0.8
        let delay = backoff_delay_ms_with_random(0, 1000, 30_000, 0.2, 0.0);
        assert_eq!(delay, 800);
    }

    #[test]
    fn jitter_random_half_is_neutral() {
        let delay = backoff_delay_ms_with_random(0, 1000, 30_000, 0.2, 0.5);
        assert_eq!(delay, 1000);
    }

    #[test]
    fn jitter_random_one_raises_delay() {
        let delay = backoff_delay_ms_with_random(0, 1000, 30_000, 0.2, 1.0);
        assert_eq!(delay, 1200);
    }

    #[test]
    fn zero_jitter_matches_plain_delay() {
        for attempt in 0..8 {
            assert_eq!(
                backoff_delay_ms_with_random(attempt, 1000, 30_000, 0.0, 0.7),
                backoff_delay_ms(attempt, 1000, 30_000),
            );
        }
    }

    // -- property: delays never exceed ceiling * (1 + jitter) --

    proptest::proptest! {
        #[test]
        fn delay_bounded_by_jittered_ceiling(
            attempt in 0u32..64,
            base in 1u64..10_000,
            cap in 1u64..100_000,
            random in 0.0f64..1.0,
        ) {
            let delay = backoff_delay_ms_with_random(attempt, base, cap, 0.2, random);
            let limit = ((cap as f64) * 1.2).round() as u64;
            proptest::prop_assert!(delay <= limit);
        }

        #[test]
        fn delay_monotone_in_attempt(
            attempt in 0u32..16,
            base in 1u64..1000,
        ) {
            let d1 = backoff_delay_ms(attempt, base, u64::MAX);
            let d2 = backoff_delay_ms(attempt + 1, base, u64::MAX);
            proptest::prop_assert!(d2 >= d1);
        }
    }
}
