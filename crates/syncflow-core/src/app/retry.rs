//! RetryController - 1 回の試行結果から次の状態を決める
//!
//! Decider と同じく純粋関数として設計している（副作用なし）。
//! Decision の適用（retry_count の更新、再投入タイマー）はスケジューラが行う。

use std::time::Duration;

use crate::domain::{AttemptOutcome, SyncTask};

/// Retry policy for failed attempts.
///
/// Linear backoff: retry `n` (1-indexed) waits `retry_delay * n`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub retry_delay: Duration,

    /// Spend retry budget on attempts whose errors are all permanent.
    pub retry_permanent_errors: bool,
}

impl RetryPolicy {
    pub fn new(retry_delay: Duration) -> Self {
        Self {
            retry_delay,
            retry_permanent_errors: true,
        }
    }

    pub fn with_retry_permanent_errors(mut self, retry: bool) -> Self {
        self.retry_permanent_errors = retry;
        self
    }

    /// Delay before retry number `retry_count` (the already incremented count).
    ///
    /// Example with retry_delay=5s:
    /// - retry 1: 5s
    /// - retry 2: 10s
    /// - retry 3: 15s
    pub fn next_delay(&self, retry_count: u32) -> Duration {
        self.retry_delay.saturating_mul(retry_count.max(1))
    }
}

/// The next action for a task after one attempt settled.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Every target is in sync.
    Complete,

    /// Put the task back to pending; admissible again after `delay`.
    Retry { delay: Duration, reason: String },

    /// Give up for good.
    Fail { reason: String },
}

#[derive(Debug, Clone)]
pub struct RetryController {
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn decide(&self, task: &SyncTask, outcome: &AttemptOutcome) -> Decision {
        let AttemptOutcome::Failed {
            errors,
            permanent_only,
        } = *outcome
        else {
            return Decision::Complete;
        };

        let schedule = &task.schedule;
        if permanent_only && !self.policy.retry_permanent_errors {
            return Decision::Fail {
                reason: format!("{errors} target(s) failed permanently"),
            };
        }
        if schedule.retry_count >= schedule.max_retries {
            return Decision::Fail {
                reason: format!(
                    "Max retries reached: {}/{} ({errors} target(s) failing)",
                    schedule.retry_count, schedule.max_retries
                ),
            };
        }

        let next = schedule.retry_count + 1;
        let delay = self.policy.next_delay(next);
        Decision::Retry {
            delay,
            reason: format!(
                "Retry {next}/{} after {delay:?} ({errors} target(s) failing)",
                schedule.max_retries
            ),
        }
    }
}
