//! Per-dependency circuit breaker with a rolling count window, as required
//! by the data model (`CircuitState`): 10-call window, 50% failure rate
//! trips the breaker, 30s open dwell, 3 half-open probes.
//!
//! Adapted from a consecutive-failure-counter breaker shape into a rolling
//! window: state transitions are driven by `record_outcome` over a
//! fixed-capacity ring buffer of recent call outcomes instead of a simple
//! streak counter.

use std::collections::VecDeque;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::BreakerProfileConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitBreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStats {
    pub state: CircuitBreakerState,
    pub total_calls: u64,
    pub failed_calls: u64,
    pub failure_rate: f64,
}

struct Inner {
    state: CircuitBreakerState,
    outcomes: VecDeque<bool>,
    opened_at: Option<Instant>,
    half_open_successes: u32,
    total_calls: u64,
    failed_calls: u64,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: CircuitBreakerState::Closed,
            outcomes: VecDeque::new(),
            opened_at: None,
            half_open_successes: 0,
            total_calls: 0,
            failed_calls: 0,
        }
    }
}

/// The error the breaker itself produces; distinct from the wrapped
/// operation's own error type.
#[derive(Debug, thiserror::Error)]
pub enum BreakerRejection {
    #[error("circuit breaker open, retry after {retry_after_seconds}s")]
    Open { retry_after_seconds: u64 },
}

pub struct CircuitBreaker {
    config: BreakerProfileConfig,
    state: RwLock<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerProfileConfig) -> Self {
        Self {
            config,
            state: RwLock::new(Inner::new()),
        }
    }

    /// Checks whether a call may proceed right now, performing the
    /// Open -> HalfOpen transition as a side effect when the dwell has
    /// elapsed. Returns the remaining dwell in seconds when rejecting.
    pub fn try_acquire(&self) -> Result<(), BreakerRejection> {
        let mut inner = self.state.write().expect("circuit breaker lock poisoned");
        match inner.state {
            CircuitBreakerState::Closed => Ok(()),
            CircuitBreakerState::HalfOpen => Ok(()),
            CircuitBreakerState::Open => {
                let opened_at = inner.opened_at.unwrap_or_else(Instant::now);
                let elapsed = opened_at.elapsed();
                if elapsed >= self.config.open_dwell {
                    inner.state = CircuitBreakerState::HalfOpen;
                    inner.half_open_successes = 0;
                    Ok(())
                } else {
                    let remaining = self.config.open_dwell.saturating_sub(elapsed);
                    Err(BreakerRejection::Open {
                        retry_after_seconds: remaining.as_secs().max(1),
                    })
                }
            }
        }
    }

    /// Records the outcome of one logical call (already retried internally)
    /// and advances the state machine.
    pub fn record_outcome(&self, success: bool) {
        let mut inner = self.state.write().expect("circuit breaker lock poisoned");
        inner.total_calls += 1;
        if !success {
            inner.failed_calls += 1;
        }

        match inner.state {
            CircuitBreakerState::HalfOpen => {
                if success {
                    inner.half_open_successes += 1;
                    if inner.half_open_successes >= self.config.half_open_probes {
                        inner.state = CircuitBreakerState::Closed;
                        inner.outcomes.clear();
                        inner.opened_at = None;
                    }
                } else {
                    inner.state = CircuitBreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    inner.outcomes.clear();
                }
            }
            CircuitBreakerState::Closed => {
                inner.outcomes.push_back(success);
                while inner.outcomes.len() > self.config.window_size {
                    inner.outcomes.pop_front();
                }
                if inner.outcomes.len() >= self.config.window_size {
                    let failures = inner.outcomes.iter().filter(|o| !**o).count();
                    let failure_rate = failures as f64 / inner.outcomes.len() as f64;
                    if failure_rate * 100.0 >= self.config.threshold_percent as f64 {
                        inner.state = CircuitBreakerState::Open;
                        inner.opened_at = Some(Instant::now());
                        inner.outcomes.clear();
                    }
                }
            }
            CircuitBreakerState::Open => {
                // A call slipped through right as the breaker opened; ignore.
            }
        }
    }

    pub fn force_open(&self) {
        let mut inner = self.state.write().expect("circuit breaker lock poisoned");
        inner.state = CircuitBreakerState::Open;
        inner.opened_at = Some(Instant::now());
    }

    pub fn force_closed(&self) {
        let mut inner = self.state.write().expect("circuit breaker lock poisoned");
        inner.state = CircuitBreakerState::Closed;
        inner.outcomes.clear();
        inner.opened_at = None;
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.state.read().expect("circuit breaker lock poisoned");
        let failure_rate = if inner.total_calls == 0 {
            0.0
        } else {
            inner.failed_calls as f64 / inner.total_calls as f64
        };
        CircuitBreakerStats {
            state: inner.state,
            total_calls: inner.total_calls,
            failed_calls: inner.failed_calls,
            failure_rate,
        }
    }

    pub fn remaining_open_dwell(&self) -> Duration {
        let inner = self.state.read().expect("circuit breaker lock poisoned");
        match (inner.state, inner.opened_at) {
            (CircuitBreakerState::Open, Some(opened_at)) => {
                self.config.open_dwell.saturating_sub(opened_at.elapsed())
            }
            _ => Duration::ZERO,
        }
    }
}
