//! Scheduling hints attached to every sync task.

use serde::{Deserialize, Serialize};

/// How a task gets admitted into execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Admitted as soon as a concurrency slot is free.
    #[default]
    Immediate,

    /// Deferred until `batch_sync` runs for the task's owner.
    Batch,

    /// Waits until the caller explicitly releases it.
    Manual,
}

/// Coarse ordering hint among pending tasks.
///
/// `Ord` follows urgency: `High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Schedule of a task. Only `retry_count` changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub strategy: Strategy,
    pub priority: Priority,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl Schedule {
    pub fn new(strategy: Strategy, priority: Priority, max_retries: u32) -> Self {
        Self {
            strategy,
            priority,
            retry_count: 0,
            max_retries,
        }
    }

    pub fn retries_left(&self) -> u32 {
        self.max_retries.saturating_sub(self.retry_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_orders_by_urgency() {
        let mut ps = vec![Priority::Low, Priority::High, Priority::Medium];
        ps.sort_by(|a, b| b.cmp(a));
        assert_eq!(ps, vec![Priority::High, Priority::Medium, Priority::Low]);
    }

    #[test]
    fn retries_left_saturates() {
        let mut s = Schedule::new(Strategy::Immediate, Priority::Medium, 2);
        assert_eq!(s.retries_left(), 2);
        s.retry_count = 3;
        assert_eq!(s.retries_left(), 0);
    }
}
