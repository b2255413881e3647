//! Retry/backoff policy for failed loads
//!
//! Remote sources failing with `SourceUnsupportedOrAborted` are terminal on
//! the first occurrence. Every other failure (and that same kind on a local
//! source) is retried with exponential backoff until either the attempt
//! budget or the total backoff window is used up.

use crate::failure::{FailureKind, LoadFailure};
use std::time::Duration;
use vgal_common::params::RetryParams;

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule another attempt after `delay`
    Retry { delay: Duration },
    /// Give up; the item shows a terminal marker
    Terminal,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    max_total_window: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryParams::default())
    }
}

impl RetryPolicy {
    pub fn new(params: &RetryParams) -> Self {
        Self {
            max_attempts: params.max_attempts.max(1),
            base_delay: Duration::from_millis(params.base_delay_ms),
            max_delay: Duration::from_millis(params.max_delay_ms.max(params.base_delay_ms)),
            max_total_window: Duration::from_millis(params.max_total_window_ms),
        }
    }

    /// Backoff before attempt `failed_attempt + 1`
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Decide the follow-up of `failure`
    ///
    /// `backoff_spent` is the sum of delays already waited for this item.
    pub fn decide(&self, failure: &LoadFailure, is_local: bool, backoff_spent: Duration) -> RetryDecision {
        if failure.kind == FailureKind::SourceUnsupportedOrAborted && !is_local {
            return RetryDecision::Terminal;
        }
        if failure.attempt >= self.max_attempts {
            return RetryDecision::Terminal;
        }

        let delay = self.backoff(failure.attempt);
        if backoff_spent + delay > self.max_total_window {
            return RetryDecision::Terminal;
        }
        RetryDecision::Retry { delay }
    }
}
