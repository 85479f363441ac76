//! TaskExecutor - 1 タスク分の target 同期を並列に実行する
//!
//! # フロー
//! 1. 全 target の同期 future を作って FuturesUnordered に積む（await する前に全部 dispatch）
//! 2. 完了順に TargetResult を流す（所要時間つき）
//! 3. 1 件失敗しても兄弟はキャンセルしない（settle all）
//! 4. ストア実装が panic しても Error 結果として扱う（attempt が宙に浮かない）

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use futures::stream::{FuturesUnordered, Stream, StreamExt};
use tracing::{debug, warn};

use crate::domain::{
    AffectedTarget, ContentChange, OwnerId, StoreError, SyncTask, SyncTaskId, TargetResult,
};
use crate::ports::{RecordStore, SyncApplied};

/// Everything one attempt needs, copied out of the task so no lock is held while syncing.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub task_id: SyncTaskId,
    pub attempt: u32,
    pub owner_id: OwnerId,
    pub targets: Vec<AffectedTarget>,
    pub change: ContentChange,
}

impl ExecutionPlan {
    pub fn for_task(task: &SyncTask) -> Self {
        Self {
            task_id: task.id,
            attempt: task.attempt_number(),
            owner_id: task.owner_id.clone(),
            targets: task.affected_targets.clone(),
            change: task.change.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TaskExecutor {
    store: Arc<dyn RecordStore>,
}

impl TaskExecutor {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Fan out every target sync; yields results in completion order.
    pub fn execute<'a>(&'a self, plan: &'a ExecutionPlan) -> impl Stream<Item = TargetResult> + Send + 'a {
        plan.targets
            .iter()
            .map(|target| self.sync_target(plan, target))
            .collect::<FuturesUnordered<_>>()
    }

    /// Run every target sync to completion and collect the results.
    pub async fn run(&self, plan: &ExecutionPlan) -> Vec<TargetResult> {
        self.execute(plan).collect().await
    }

    async fn sync_target(&self, plan: &ExecutionPlan, target: &AffectedTarget) -> TargetResult {
        let started = Instant::now();
        let outcome = AssertUnwindSafe(self.store.apply_sync_update(
            &target.id,
            &plan.owner_id,
            &plan.change,
        ))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            let message = panic_message(panic.as_ref());
            warn!(task_id = %plan.task_id, target_id = %target.id, %message, "record store panicked");
            Err(StoreError::transient(format!("record store panicked: {message}")))
        });
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let result = match outcome {
            Ok(SyncApplied::Applied { description }) => {
                TargetResult::success(target.id.clone(), description)
            }
            Ok(SyncApplied::Unchanged { reason }) => TargetResult::skipped(target.id.clone(), reason),
            Err(err) => TargetResult::error(target.id.clone(), &err),
        };
        debug!(
            task_id = %plan.task_id,
            attempt = plan.attempt,
            target_id = %target.id,
            status = ?result.status,
            elapsed_ms,
            "target sync settled"
        );
        result.with_duration_ms(elapsed_ms)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AttemptOutcome, ChangeKind, ErrorKind, StoreError, TargetId, TargetKind, TargetStatus,
    };
    use crate::ports::StoredRecord;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use ulid::Ulid;

    /// Fails targets whose id starts with "bad", skips "same", panics on "panic", and tracks peak concurrency.
    #[derive(Default)]
    struct ScriptedStore {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl RecordStore for ScriptedStore {
        async fn query_by_owner(&self, _owner: &OwnerId) -> Result<Vec<StoredRecord>, StoreError> {
            Ok(Vec::new())
        }

        async fn apply_sync_update(
            &self,
            target: &TargetId,
            _owner: &OwnerId,
            _change: &ContentChange,
        ) -> Result<SyncApplied, StoreError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if target.as_str().starts_with("panic") {
                panic!("driver bug on {target}");
            }
            if target.as_str().starts_with("bad") {
                Err(StoreError::permanent(format!("{target} not found")))
            } else if target.as_str().starts_with("same") {
                Ok(SyncApplied::Unchanged {
                    reason: "already current".to_string(),
                })
            } else {
                Ok(SyncApplied::Applied {
                    description: format!("updated {target}"),
                })
            }
        }
    }

    fn plan(ids: &[&str]) -> ExecutionPlan {
        ExecutionPlan {
            task_id: SyncTaskId::from_ulid(Ulid::new()),
            attempt: 1,
            owner_id: OwnerId::new("owner"),
            targets: ids
                .iter()
                .map(|id| AffectedTarget::new(*id, id.to_uppercase(), TargetKind::DerivedPage))
                .collect(),
            change: ContentChange::new(ChangeKind::Update, "note"),
        }
    }

    #[tokio::test]
    async fn all_targets_run_concurrently() {
        let store = Arc::new(ScriptedStore::default());
        let executor = TaskExecutor::new(store.clone());

        let results = executor.run(&plan(&["a", "b", "c"])).await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.status == TargetStatus::Success));
        assert!(results.iter().all(|r| r.duration_ms.is_some()));
        assert_eq!(store.peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failing_target_does_not_cancel_siblings() {
        let executor = TaskExecutor::new(Arc::new(ScriptedStore::default()));

        let results = executor.run(&plan(&["a", "bad-1", "same-1"])).await;

        assert_eq!(results.len(), 3);
        let bad = results.iter().find(|r| r.target_id.as_str() == "bad-1").unwrap();
        assert_eq!(bad.status, TargetStatus::Error);
        assert_eq!(bad.error_kind, Some(ErrorKind::Permanent));
        let same = results.iter().find(|r| r.target_id.as_str() == "same-1").unwrap();
        assert_eq!(same.status, TargetStatus::Skipped);

        assert_eq!(
            AttemptOutcome::from_results(3, &results),
            AttemptOutcome::Failed {
                errors: 1,
                permanent_only: true
            }
        );
    }

    #[tokio::test]
    async fn panicking_store_call_becomes_an_error_result() {
        let executor = TaskExecutor::new(Arc::new(ScriptedStore::default()));

        let results = executor.run(&plan(&["a", "panic-1", "b"])).await;

        assert_eq!(results.len(), 3);
        let crashed = results.iter().find(|r| r.target_id.as_str() == "panic-1").unwrap();
        assert_eq!(crashed.status, TargetStatus::Error);
        assert_eq!(crashed.error_kind, Some(ErrorKind::Transient));
        assert!(crashed.error.as_deref().unwrap().contains("driver bug on panic-1"));
        assert_eq!(
            results.iter().filter(|r| r.status == TargetStatus::Success).count(),
            2
        );
    }

    #[tokio::test]
    async fn empty_plan_yields_nothing() {
        let executor = TaskExecutor::new(Arc::new(ScriptedStore::default()));
        assert!(executor.run(&plan(&[])).await.is_empty());
    }
}
