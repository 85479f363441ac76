//! Sync task state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a sync task.
///
/// State transitions:
/// - Pending -> Running -> Completed
/// - Pending -> Running -> Pending (retry scheduled, loops until max_retries)
/// - Pending -> Running -> Failed (retries exhausted)
/// - Pending -> Cancelled
///
/// Completed / Failed / Cancelled are terminal: nothing leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for admission (fresh, or waiting out a retry delay).
    Pending,

    /// Target syncs for the current attempt are in flight.
    Running,

    /// Every target was synced in the final attempt.
    Completed,

    /// Retries exhausted (or permanently failing targets).
    Failed,

    /// Cancelled before it ever ran.
    Cancelled,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}
