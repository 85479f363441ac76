//! RecordStore port - ページ / テンプレートを保持する外部ストア
//!
//! スケジューラはストアの実装を知らない。読むのは `query_by_owner`（発見）、
//! 書くのは `apply_sync_update`（target ごとの同期）だけ。
//!
//! # エラー分類
//! - 一時的な失敗（タイムアウトなど）: `ErrorKind::Transient`
//! - not found / permission denied: `ErrorKind::Permanent`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ContentChange, OwnerId, StoreError, TargetId, TargetKind};

/// A page or template as the store returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: TargetId,
    pub title: String,
    /// Serialized body; discovery searches it for content references.
    pub content: String,
    pub kind: TargetKind,
}

/// What the store did for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncApplied {
    Applied { description: String },
    /// Nothing to write (e.g. the target already reflects the change).
    Unchanged { reason: String },
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every record owned by `owner`. Empty vec when the owner has none.
    async fn query_by_owner(&self, owner: &OwnerId) -> Result<Vec<StoredRecord>, StoreError>;

    /// Write `change` into one target. `change` is interpreted here, never by the scheduler.
    async fn apply_sync_update(
        &self,
        target: &TargetId,
        owner: &OwnerId,
        change: &ContentChange,
    ) -> Result<SyncApplied, StoreError>;
}
