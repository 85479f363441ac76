//! Events - タスクのライフサイクル通知
//!
//! 各イベントは発生時点の `TaskSnapshot` を持つ。購読側はスナップショットだけ
//! 見ればよく、スケジューラの内部状態には触れない。

use serde::{Deserialize, Serialize};

use super::task::TaskSnapshot;

/// Discriminant used to filter subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    TaskCreated,
    TaskStarted,
    TaskCompleted,
    TaskFailed,
    TaskCancelled,
    TaskCleaned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "task", rename_all = "camelCase")]
pub enum SyncEvent {
    TaskCreated(TaskSnapshot),
    TaskStarted(TaskSnapshot),
    TaskCompleted(TaskSnapshot),
    TaskFailed(TaskSnapshot),
    TaskCancelled(TaskSnapshot),
    TaskCleaned(TaskSnapshot),
}

impl SyncEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SyncEvent::TaskCreated(_) => EventKind::TaskCreated,
            SyncEvent::TaskStarted(_) => EventKind::TaskStarted,
            SyncEvent::TaskCompleted(_) => EventKind::TaskCompleted,
            SyncEvent::TaskFailed(_) => EventKind::TaskFailed,
            SyncEvent::TaskCancelled(_) => EventKind::TaskCancelled,
            SyncEvent::TaskCleaned(_) => EventKind::TaskCleaned,
        }
    }

    pub fn task(&self) -> &TaskSnapshot {
        match self {
            SyncEvent::TaskCreated(t)
            | SyncEvent::TaskStarted(t)
            | SyncEvent::TaskCompleted(t)
            | SyncEvent::TaskFailed(t)
            | SyncEvent::TaskCancelled(t)
            | SyncEvent::TaskCleaned(t) => t,
        }
    }
}
