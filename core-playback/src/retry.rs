//! # Retry Policy
//!
//! Bounded automatic recovery from engine failures.
//!
//! Every *failed* report increments a counter of consecutive failures. While
//! the counter stays within `max_retries` the caller re-issues the load;
//! beyond that the failure is terminal. The counter returns to zero on a
//! *ready* report or a visible start of playback, and when the host starts a
//! new load explicitly.

use tracing::debug;

/// Outcome of a failure report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-issue the load. `attempt` is 1-based.
    Retry { attempt: u32 },
    /// Retries are exhausted after `failures` consecutive failures.
    GiveUp { failures: u32 },
}

impl RetryDecision {
    /// Pure decision over the failure count (including the failure being
    /// decided) and the configured bound.
    pub fn evaluate(consecutive_failures: u32, max_retries: u32) -> Self {
        if consecutive_failures <= max_retries {
            RetryDecision::Retry {
                attempt: consecutive_failures,
            }
        } else {
            RetryDecision::GiveUp {
                failures: consecutive_failures,
            }
        }
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, RetryDecision::Retry { .. })
    }
}

/// Consecutive-failure counter for one controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    consecutive_failures: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            consecutive_failures: 0,
        }
    }

    /// Count a failure and decide what to do about it.
    ///
    /// After a [`RetryDecision::GiveUp`] the counter keeps its terminal value
    /// until [`reset`](Self::reset).
    pub fn record_failure(&mut self) -> RetryDecision {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let decision = RetryDecision::evaluate(self.consecutive_failures, self.max_retries);
        debug!(
            failures = self.consecutive_failures,
            max_retries = self.max_retries,
            retry = decision.is_retry(),
            "Recorded playback failure"
        );
        decision
    }

    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Takes effect on the next failure; the current count is kept.
    pub fn set_max_retries(&mut self, max_retries: u32) {
        self.max_retries = max_retries;
    }
}
