//! Reconnection controller.
//!
//! A pure state machine: the session actor feeds it connection lifecycle
//! transitions and it answers whether (and after what delay) to try again.
//! Timer scheduling and the actual dialing stay in the actor so this logic
//! is testable without a runtime.
//!
//! Rules:
//! - at most one scheduled attempt at a time
//! - a clean close (code 1000) is final; no retry
//! - the attempt counter resets only when a socket actually opens, so a
//!   flapping link that dies mid-handshake still runs out of attempts
//! - delays follow `min(base * 2^attempt, cap)`

use tether_core::backoff::{backoff_delay_ms_with_random, BackoffConfig};

use crate::transport::NORMAL_CLOSE;

/// Controller state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconnectState {
    /// No attempt scheduled.
    Idle,
    /// One attempt is scheduled or dialing.
    Scheduled,
    /// The attempt budget is spent.
    Exhausted,
}

/// Decision for a disconnect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Schedule attempt `attempt` after `delay_ms`.
    Retry {
        /// Zero-based attempt number.
        attempt: u32,
        /// Delay before dialing, in ms.
        delay_ms: u64,
    },
    /// The budget is spent; surface a terminal failure.
    GiveUp,
    /// Deliberate shutdown or duplicate signal; do nothing.
    Stay,
}

/// Tracks reconnection attempts across socket lifetimes.
#[derive(Debug)]
pub struct ReconnectController {
    config: BackoffConfig,
    state: ReconnectState,
    attempts: u32,
}

impl ReconnectController {
    /// New controller with the given backoff parameters.
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            state: ReconnectState::Idle,
            attempts: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ReconnectState {
        self.state
    }

    /// Attempts consumed since the last successful open.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// A socket opened. Resets the attempt budget.
    pub fn on_open(&mut self) {
        self.attempts = 0;
        self.state = ReconnectState::Idle;
    }

    /// The scheduled attempt's timer fired and dialing begins.
    pub fn on_attempt_started(&mut self) {
        if self.state == ReconnectState::Scheduled {
            self.state = ReconnectState::Idle;
        }
    }

    /// The connection dropped (or a dial failed). `close_code` is the
    /// WebSocket close code when the peer performed a close handshake.
    ///
    /// Delays are deterministic here (neutral jitter); the session supplies
    /// real randomness via [`ReconnectController::on_disconnect_with_random`].
    pub fn on_disconnect(&mut self, close_code: Option<u16>) -> ReconnectDecision {
        self.on_disconnect_with_random(close_code, 0.5)
    }

    /// Like [`ReconnectController::on_disconnect`] with explicit jitter input
    /// in `[0.0, 1.0)`.
    pub fn on_disconnect_with_random(
        &mut self,
        close_code: Option<u16>,
        random: f64,
    ) -> ReconnectDecision {
        if close_code == Some(NORMAL_CLOSE) {
            self.state = ReconnectState::Idle;
            return ReconnectDecision::Stay;
        }
        match self.state {
            // Only one attempt may be in flight.
            ReconnectState::Scheduled => ReconnectDecision::Stay,
            ReconnectState::Exhausted => ReconnectDecision::Stay,
            ReconnectState::Idle => {
                if self.attempts >= self.config.max_attempts {
                    self.state = ReconnectState::Exhausted;
                    return ReconnectDecision::GiveUp;
                }
                let attempt = self.attempts;
                self.attempts += 1;
                self.state = ReconnectState::Scheduled;
                ReconnectDecision::Retry {
                    attempt,
                    delay_ms: backoff_delay_ms_with_random(
                        attempt,
                        self.config.base_delay_ms,
                        self.config.max_delay_ms,
                        self.config.jitter_factor,
                        random,
                    ),
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> ReconnectController {
        ReconnectController::new(BackoffConfig::default())
    }

    // ── retry scheduling ─────────────────────────────────────────────

    #[test]
    fn abnormal_close_schedules_retry_with_backoff() {
        let mut ctrl = controller();
        assert_eq!(
            ctrl.on_disconnect(Some(1006)),
            ReconnectDecision::Retry { attempt: 0, delay_ms: 1000 }
        );
        assert_eq!(ctrl.state(), ReconnectState::Scheduled);
    }

    #[test]
    fn delays_double_across_failed_attempts() {
        let mut ctrl = controller();
        let mut delays = Vec::new();
        for _ in 0..5 {
            match ctrl.on_disconnect(None) {
                ReconnectDecision::Retry { delay_ms, .. } => {
                    delays.push(delay_ms);
                    ctrl.on_attempt_started();
                }
                other => panic!("expected retry, got {other:?}"),
            }
        }
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16_000]);
    }

    #[test]
    fn gives_up_after_budget_spent() {
        let mut ctrl = controller();
        for _ in 0..5 {
            let _ = ctrl.on_disconnect(None);
            ctrl.on_attempt_started();
        }
        assert_eq!(ctrl.on_disconnect(None), ReconnectDecision::GiveUp);
        assert_eq!(ctrl.state(), ReconnectState::Exhausted);
        // Further disconnects stay put.
        assert_eq!(ctrl.on_disconnect(None), ReconnectDecision::Stay);
    }

    // ── clean close ──────────────────────────────────────────────────

    #[test]
    fn clean_close_never_retries() {
        let mut ctrl = controller();
        assert_eq!(ctrl.on_disconnect(Some(NORMAL_CLOSE)), ReconnectDecision::Stay);
        assert_eq!(ctrl.state(), ReconnectState::Idle);
        assert_eq!(ctrl.attempts(), 0);
    }

    // ── single pending attempt ───────────────────────────────────────

    #[test]
    fn duplicate_disconnect_while_scheduled_is_ignored() {
        let mut ctrl = controller();
        let _ = ctrl.on_disconnect(None);
        assert_eq!(ctrl.on_disconnect(None), ReconnectDecision::Stay);
        assert_eq!(ctrl.attempts(), 1);
    }

    // ── attempt reset ────────────────────────────────────────────────

    #[test]
    fn open_resets_budget() {
        let mut ctrl = controller();
        for _ in 0..3 {
            let _ = ctrl.on_disconnect(None);
            ctrl.on_attempt_started();
        }
        assert_eq!(ctrl.attempts(), 3);
        ctrl.on_open();
        assert_eq!(ctrl.attempts(), 0);
        assert_eq!(
            ctrl.on_disconnect(None),
            ReconnectDecision::Retry { attempt: 0, delay_ms: 1000 }
        );
    }

    #[test]
    fn failed_dial_does_not_reset_budget() {
        // A dial that fails before the handshake never calls on_open, so
        // attempts keep accruing.
        let mut ctrl = controller();
        let _ = ctrl.on_disconnect(None);
        ctrl.on_attempt_started();
        assert_eq!(
            ctrl.on_disconnect(None),
            ReconnectDecision::Retry { attempt: 1, delay_ms: 2000 }
        );
    }

    #[test]
    fn jitter_widens_the_delay_band() {
        let mut ctrl = ReconnectController::new(BackoffConfig {
            jitter_factor: 0.2,
            ..BackoffConfig::default()
        });
        match ctrl.on_disconnect_with_random(None, 1.0) {
            ReconnectDecision::Retry { delay_ms, .. } => assert_eq!(delay_ms, 1200),
            other => panic!("expected retry, got {other:?}"),
        }
    }

    #[test]
    fn custom_budget_respected() {
        let mut ctrl = ReconnectController::new(BackoffConfig {
            max_attempts: 1,
            ..BackoffConfig::default()
        });
        assert!(matches!(
            ctrl.on_disconnect(None),
            ReconnectDecision::Retry { .. }
        ));
        ctrl.on_attempt_started();
        assert_eq!(ctrl.on_disconnect(None), ReconnectDecision::GiveUp);
    }
}
