//! ConcurrencyLimiter - 同時実行数の上限
//!
//! # 設計
//! - スロットは tokio の Semaphore（permit 1 つ = running 1 件）
//! - running 中の task id → permit を保持し、`release` で permit を drop する
//! - running 集合の更新はスケジューラの state ロック内で行う
//!   （完了コールバックが並行しても集合と permit 数がずれない）
//! - 即時経路は `try_admit`（待たない）、バッチ経路は `slots()` から permit を await する

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::domain::SyncTaskId;

pub struct ConcurrencyLimiter {
    capacity: usize,
    slots: Arc<Semaphore>,
    running: HashMap<SyncTaskId, OwnedSemaphorePermit>,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Arc::new(Semaphore::new(capacity)),
            running: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots right now. Zero means the loop should back off.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Take a slot for `id` without waiting.
    pub fn try_admit(&mut self, id: SyncTaskId) -> bool {
        match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => {
                self.running.insert(id, permit);
                true
            }
            Err(_) => false,
        }
    }

    /// Register a permit that was acquired outside the lock.
    pub fn admit_with(&mut self, id: SyncTaskId, permit: OwnedSemaphorePermit) {
        self.running.insert(id, permit);
    }

    /// Shared slot pool, for callers that wait for capacity.
    pub fn slots(&self) -> Arc<Semaphore> {
        Arc::clone(&self.slots)
    }

    /// Free the slot held by `id`.
    pub fn release(&mut self, id: &SyncTaskId) -> bool {
        self.running.remove(id).is_some()
    }

    pub fn is_running(&self, id: &SyncTaskId) -> bool {
        self.running.contains_key(id)
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Stop handing out slots; pending waiters get an error.
    pub fn close(&self) {
        self.slots.close();
    }
}
