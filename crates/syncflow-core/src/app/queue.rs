//! TaskQueue - スケジューラが保持する全タスクのコンテナ
//!
//! # 設計
//! - 正本は `SyncTask`（状態遷移はレコード側のメソッドで行う）
//! - キューはメンバーシップと取り出し順だけを管理し、status は変更しない
//! - 取り出し順: priority 降順 → 作成時刻昇順 → 投入順（安定）

use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;

use crate::domain::{SyncError, SyncTask, SyncTaskId};

struct QueueEntry {
    /// Insertion sequence; breaks ties between tasks created in the same instant.
    seq: u64,
    task: SyncTask,
}

/// In-memory task container with priority-ordered extraction.
#[derive(Default)]
pub struct TaskQueue {
    entries: HashMap<SyncTaskId, QueueEntry>,
    next_seq: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task. A duplicate id is a programming error.
    pub fn enqueue(&mut self, task: SyncTask) -> Result<(), SyncError> {
        if self.entries.contains_key(&task.id) {
            return Err(SyncError::DuplicateTask(task.id));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(task.id, QueueEntry { seq, task });
        Ok(())
    }

    /// Up to `n` ids matching `predicate`, highest priority first, oldest first within a priority.
    pub fn next_batch<P>(&self, n: usize, mut predicate: P) -> Vec<SyncTaskId>
    where
        P: FnMut(&SyncTask) -> bool,
    {
        if n == 0 {
            return Vec::new();
        }
        let mut matching: Vec<&QueueEntry> = self
            .entries
            .values()
            .filter(|entry| predicate(&entry.task))
            .collect();
        matching.sort_by(|a, b| admission_order(a, b));
        matching.into_iter().take(n).map(|e| e.task.id).collect()
    }

    pub fn find(&self, id: &SyncTaskId) -> Option<&SyncTask> {
        self.entries.get(id).map(|e| &e.task)
    }

    pub fn find_mut(&mut self, id: &SyncTaskId) -> Option<&mut SyncTask> {
        self.entries.get_mut(id).map(|e| &mut e.task)
    }

    pub fn remove(&mut self, id: &SyncTaskId) -> Option<SyncTask> {
        self.entries.remove(id).map(|e| e.task)
    }

    /// Tasks in admission order.
    pub fn iter(&self) -> impl Iterator<Item = &SyncTask> {
        let mut all: Vec<&QueueEntry> = self.entries.values().collect();
        all.sort_by(|a, b| admission_order(a, b));
        all.into_iter().map(|e| &e.task)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn admission_order(a: &QueueEntry, b: &QueueEntry) -> Ordering {
    let key = |e: &QueueEntry| (Reverse(e.task.schedule.priority), e.task.created_at, e.seq);
    key(a).cmp(&key(b))
}
