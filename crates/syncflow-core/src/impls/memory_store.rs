//! InMemoryRecordStore - 開発用のレコードストア
//!
//! # 学習ポイント
//! - std の Mutex で十分（ロックを保持したまま await しない）
//! - 失敗注入: クエリ失敗 / target ごとの失敗（回数指定 or 恒久）
//! - 適用された変更はログに残るので、テストや CLI から確認できる

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{ContentChange, OwnerId, StoreError, TargetId, TargetKind};
use crate::ports::{RecordStore, StoredRecord, SyncApplied};

struct InjectedFailure {
    error: StoreError,
    /// `None` = fail forever.
    remaining: Option<u32>,
}

#[derive(Default)]
struct StoreState {
    records: HashMap<OwnerId, Vec<StoredRecord>>,
    query_failure: Option<StoreError>,
    target_failures: HashMap<TargetId, InjectedFailure>,
    applied: Vec<(TargetId, ContentChange)>,
}

#[derive(Default)]
pub struct InMemoryRecordStore {
    state: Mutex<StoreState>,
    latency: Option<Duration>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `apply_sync_update` sleeps this long first.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(
        &self,
        owner: &OwnerId,
        id: &str,
        title: &str,
        content: &str,
        kind: TargetKind,
    ) {
        self.state()
            .records
            .entry(owner.clone())
            .or_default()
            .push(StoredRecord {
                id: TargetId::new(id),
                title: title.to_string(),
                content: content.to_string(),
                kind,
            });
    }

    /// Make every `query_by_owner` fail with `error`.
    pub fn fail_queries(&self, error: StoreError) {
        self.state().query_failure = Some(error);
    }

    pub fn heal_queries(&self) {
        self.state().query_failure = None;
    }

    /// Fail every sync of `target`.
    pub fn fail_target(&self, target: &str, error: StoreError) {
        self.state().target_failures.insert(
            TargetId::new(target),
            InjectedFailure {
                error,
                remaining: None,
            },
        );
    }

    /// Fail the next `times` syncs of `target`, then succeed.
    pub fn fail_target_times(&self, target: &str, error: StoreError, times: u32) {
        self.state().target_failures.insert(
            TargetId::new(target),
            InjectedFailure {
                error,
                remaining: Some(times),
            },
        );
    }

    /// Changes applied so far, in order.
    pub fn applied(&self) -> Vec<(TargetId, ContentChange)> {
        self.state().applied.clone()
    }

    pub fn applied_count(&self, target: &str) -> usize {
        self.state()
            .applied
            .iter()
            .filter(|(id, _)| id.as_str() == target)
            .count()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn query_by_owner(&self, owner: &OwnerId) -> Result<Vec<StoredRecord>, StoreError> {
        let state = self.state();
        if let Some(error) = &state.query_failure {
            return Err(error.clone());
        }
        Ok(state.records.get(owner).cloned().unwrap_or_default())
    }

    async fn apply_sync_update(
        &self,
        target: &TargetId,
        owner: &OwnerId,
        change: &ContentChange,
    ) -> Result<SyncApplied, StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        let mut healed = false;
        if let Some(failure) = state.target_failures.get_mut(target) {
            match &mut failure.remaining {
                None => return Err(failure.error.clone()),
                Some(0) => healed = true,
                Some(n) => {
                    *n -= 1;
                    return Err(failure.error.clone());
                }
            }
        }
        if healed {
            state.target_failures.remove(target);
        }

        let Some(record) = state
            .records
            .get(owner)
            .and_then(|records| records.iter().find(|r| &r.id == target))
        else {
            return Err(StoreError::permanent(format!(
                "record {target} not found for owner {owner}"
            )));
        };
        let title = record.title.clone();
        state.applied.push((target.clone(), change.clone()));

        Ok(SyncApplied::Applied {
            description: format!("{:?} {} applied to \"{title}\"", change.kind, change.content_kind),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeKind, ErrorKind};

    fn seeded() -> (InMemoryRecordStore, OwnerId) {
        let store = InMemoryRecordStore::new();
        let owner = OwnerId::new("alice");
        store.insert(&owner, "page-1", "Notes", "c-1", TargetKind::UserPage);
        (store, owner)
    }

    #[tokio::test]
    async fn applies_and_logs_changes() {
        let (store, owner) = seeded();
        let change = ContentChange::new(ChangeKind::Update, "note");

        let applied = store
            .apply_sync_update(&TargetId::new("page-1"), &owner, &change)
            .await
            .unwrap();

        assert!(matches!(applied, SyncApplied::Applied { .. }));
        assert_eq!(store.applied_count("page-1"), 1);
    }

    #[tokio::test]
    async fn missing_record_is_permanent() {
        let (store, owner) = seeded();
        let change = ContentChange::new(ChangeKind::Delete, "note");

        let err = store
            .apply_sync_update(&TargetId::new("ghost"), &owner, &change)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Permanent);
    }

    #[tokio::test]
    async fn counted_failures_heal() {
        let (store, owner) = seeded();
        store.fail_target_times("page-1", StoreError::transient("timeout"), 2);
        let change = ContentChange::new(ChangeKind::Update, "note");
        let target = TargetId::new("page-1");

        assert!(store.apply_sync_update(&target, &owner, &change).await.is_err());
        assert!(store.apply_sync_update(&target, &owner, &change).await.is_err());
        assert!(store.apply_sync_update(&target, &owner, &change).await.is_ok());
    }
}
