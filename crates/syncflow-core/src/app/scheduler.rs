//! SyncScheduler - キュー / リミッター / 実行 / リトライ / イベントの結線
//!
//! # フロー（即時戦略）
//! 1. `create_sync_task`: resolver で target を発見 → SyncTask を作って enqueue
//! 2. `pump`: 空きスロット分だけ pending を priority 順に取り出して running に
//! 3. `run_attempt`: TaskExecutor で全 target を並列同期、結果を 1 件ずつ記録
//! 4. `finish_attempt`: RetryController の Decision を適用 → イベント → 再度 `pump`
//!
//! # ロック方針
//! - 状態（queue + limiter + manual 解放集合）は 1 つの std Mutex に入れる
//! - ロックを保持したまま await しない（pump は同期関数）
//! - イベントはロックを離してから publish する（リスナーが API を呼んでも詰まらない）

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::events::EventBus;
use super::executor::{ExecutionPlan, TaskExecutor};
use super::limiter::ConcurrencyLimiter;
use super::queue::TaskQueue;
use super::resolver::TargetResolver;
use super::retry::{Decision, RetryController};
use crate::config::SchedulerConfig;
use crate::domain::{
    AttemptOutcome, ContentChange, ContentId, OwnerId, Priority, QueueCounts, Schedule,
    SessionId, Strategy, SyncError, SyncEvent, SyncTask, SyncTaskId, TaskSnapshot, TaskStatus,
};
use crate::ports::{Clock, IdGenerator, Publisher};

/// Caller-supplied knobs for `create_sync_task`.
#[derive(Debug, Clone, Default)]
pub struct CreateTaskOptions {
    pub strategy: Strategy,
    pub priority: Priority,
    /// Falls back to `SchedulerConfig::default_max_retries`.
    pub max_retries: Option<u32>,
    pub session_id: Option<SessionId>,
}

impl CreateTaskOptions {
    pub fn immediate() -> Self {
        Self::default()
    }

    pub fn batch() -> Self {
        Self {
            strategy: Strategy::Batch,
            ..Self::default()
        }
    }

    pub fn manual() -> Self {
        Self {
            strategy: Strategy::Manual,
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

/// What one `batch_sync` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub owner_id: Option<OwnerId>,
    /// Task ids dispatched per chunk, in execution order.
    pub chunks: Vec<Vec<SyncTaskId>>,
    /// Selected but no longer pending when their turn came (e.g. cancelled).
    pub skipped: usize,
}

impl BatchReport {
    pub fn dispatched(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }
}

pub(crate) struct SchedulerState {
    pub(crate) queue: TaskQueue,
    pub(crate) limiter: ConcurrencyLimiter,
    /// Manual tasks the caller has released for admission.
    released: HashSet<SyncTaskId>,
    closed: bool,
}

pub(crate) struct SchedulerInner {
    pub(crate) config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    executor: TaskExecutor,
    resolver: Arc<dyn TargetResolver>,
    retry: RetryController,
    bus: EventBus<SyncEvent>,
    pub(crate) clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

/// Explicit scheduler object. Cheap to clone; clones share one queue.
#[derive(Clone)]
pub struct SyncScheduler {
    pub(crate) inner: Arc<SchedulerInner>,
}

impl SyncScheduler {
    pub(crate) fn from_parts(
        config: SchedulerConfig,
        executor: TaskExecutor,
        resolver: Arc<dyn TargetResolver>,
        retry: RetryController,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let limiter = ConcurrencyLimiter::new(config.max_concurrent_tasks);
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                state: Mutex::new(SchedulerState {
                    queue: TaskQueue::new(),
                    limiter,
                    released: HashSet::new(),
                    closed: false,
                }),
                executor,
                resolver,
                retry,
                bus: EventBus::new(),
                clock,
                ids,
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Lifecycle notifications. Subscribe with `on` / `subscribe`.
    pub fn events(&self) -> &EventBus<SyncEvent> {
        &self.inner.bus
    }

    /// Discover targets for `content_id` and queue a sync task.
    ///
    /// Never waits for execution. Discovery failures create no task.
    #[instrument(skip_all, fields(content_id = %content_id, owner_id = %owner_id))]
    pub async fn create_sync_task(
        &self,
        content_id: ContentId,
        owner_id: OwnerId,
        change: ContentChange,
        options: CreateTaskOptions,
    ) -> Result<TaskSnapshot, SyncError> {
        let inner = &self.inner;
        let targets = inner
            .resolver
            .resolve(&content_id, &owner_id, options.session_id.as_ref())
            .await
            .map_err(|err| {
                warn!(error = %err, "target discovery failed");
                SyncError::Discovery(err)
            })?;

        let now = inner.clock.now();
        let schedule = Schedule::new(
            options.strategy,
            options.priority,
            options
                .max_retries
                .unwrap_or(inner.config.default_max_retries),
        );
        let mut task = SyncTask::new(
            inner.ids.generate_task_id(),
            content_id,
            owner_id,
            options.session_id,
            targets,
            change,
            schedule,
            now,
        );

        let created = task.snapshot();
        let finished = if task.affected_targets.is_empty() {
            task.complete_without_targets(now);
            Some(task.snapshot())
        } else {
            None
        };

        {
            let mut state = inner.lock();
            if state.closed {
                return Err(SyncError::SchedulerClosed);
            }
            state.queue.enqueue(task)?;
        }

        info!(
            task_id = %created.id,
            targets = created.affected_targets.len(),
            strategy = ?created.schedule.strategy,
            priority = ?created.schedule.priority,
            "sync task created"
        );
        inner.bus.publish(&SyncEvent::TaskCreated(created.clone()));

        if let Some(done) = finished {
            debug!(task_id = %done.id, "no affected targets; completed immediately");
            inner.bus.publish(&SyncEvent::TaskCompleted(done.clone()));
            return Ok(done);
        }

        if created.schedule.strategy == Strategy::Immediate {
            inner.pump();
        }
        Ok(created)
    }

    pub fn get_task_status(&self, id: &SyncTaskId) -> Option<TaskSnapshot> {
        self.inner.lock().queue.find(id).map(SyncTask::snapshot)
    }

    /// Every task still held in memory, in admission order.
    pub fn list_tasks(&self, owner: Option<&OwnerId>) -> Vec<TaskSnapshot> {
        self.inner
            .lock()
            .queue
            .iter()
            .filter(|t| owner.is_none_or(|o| &t.owner_id == o))
            .map(SyncTask::snapshot)
            .collect()
    }

    pub fn counts(&self) -> QueueCounts {
        let state = self.inner.lock();
        let mut counts = QueueCounts::default();
        for task in state.queue.iter() {
            counts.add(task.status);
        }
        counts
    }

    pub fn running_count(&self) -> usize {
        self.inner.lock().limiter.running_count()
    }

    /// Cancel a pending task.
    ///
    /// `Ok(false)` once the task is running or terminal; `Err` for an unknown id.
    pub fn cancel_task(&self, id: &SyncTaskId) -> Result<bool, SyncError> {
        let inner = &self.inner;
        let now = inner.clock.now();
        let snapshot = {
            let mut state = inner.lock();
            let task = state
                .queue
                .find_mut(id)
                .ok_or(SyncError::TaskNotFound(*id))?;
            if !task.cancel(now) {
                debug!(task_id = %id, status = ?task.status, "cancel rejected");
                return Ok(false);
            }
            let snapshot = task.snapshot();
            state.released.remove(id);
            snapshot
        };
        info!(task_id = %id, "sync task cancelled");
        inner.bus.publish(&SyncEvent::TaskCancelled(snapshot));
        Ok(true)
    }

    /// Let a pending manual-strategy task through the scheduling loop.
    pub fn release_manual(&self, id: &SyncTaskId) -> Result<bool, SyncError> {
        {
            let mut state = self.inner.lock();
            let task = state.queue.find(id).ok_or(SyncError::TaskNotFound(*id))?;
            if task.schedule.strategy != Strategy::Manual || task.status != TaskStatus::Pending {
                return Ok(false);
            }
            state.released.insert(*id);
        }
        self.inner.pump();
        Ok(true)
    }

    /// Run every pending batch task of `owner`, `batch_size` at a time.
    ///
    /// Chunks run one after another. Tasks inside a chunk run concurrently,
    /// each still holding a limiter slot.
    #[instrument(skip_all, fields(owner_id = %owner))]
    pub async fn batch_sync(&self, owner: &OwnerId) -> Result<BatchReport, SyncError> {
        let inner = &self.inner;
        let (selected, slots) = {
            let state = inner.lock();
            if state.closed {
                return Err(SyncError::SchedulerClosed);
            }
            let now = Instant::now();
            let selected = state.queue.next_batch(usize::MAX, |t| {
                &t.owner_id == owner && t.schedule.strategy == Strategy::Batch && t.is_ready(now)
            });
            (selected, state.limiter.slots())
        };

        let mut report = BatchReport {
            owner_id: Some(owner.clone()),
            ..BatchReport::default()
        };
        if selected.is_empty() {
            return Ok(report);
        }
        info!(tasks = selected.len(), batch_size = inner.config.batch_size, "batch sync started");

        for chunk in selected.chunks(inner.config.batch_size) {
            let mut dispatched = Vec::with_capacity(chunk.len());
            let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(chunk.len());

            for id in chunk {
                let permit = Arc::clone(&slots)
                    .acquire_owned()
                    .await
                    .map_err(|_| SyncError::SchedulerClosed)?;

                let admitted = {
                    let mut state = inner.lock();
                    let now = Instant::now();
                    if state.queue.find(id).is_some_and(|t| t.is_ready(now)) {
                        state.limiter.admit_with(*id, permit);
                        inner.start(&mut state, id)
                    } else {
                        None
                    }
                };

                match admitted {
                    Some((snapshot, plan)) => {
                        dispatched.push(*id);
                        handles.push(inner.dispatch(snapshot, plan));
                    }
                    None => report.skipped += 1,
                }
            }

            for handle in handles {
                if let Err(err) = handle.await {
                    warn!(error = %err, "batch task join failed");
                }
            }
            debug!(chunk = report.chunks.len() + 1, tasks = dispatched.len(), "batch chunk settled");
            report.chunks.push(dispatched);
        }

        info!(
            chunks = report.chunks.len(),
            dispatched = report.dispatched(),
            skipped = report.skipped,
            "batch sync finished"
        );
        Ok(report)
    }

    /// `batch_sync` for every owner that has batch work ready.
    pub async fn batch_sync_all(&self) -> Result<Vec<BatchReport>, SyncError> {
        let owners: BTreeSet<OwnerId> = {
            let state = self.inner.lock();
            let now = Instant::now();
            state
                .queue
                .iter()
                .filter(|t| t.schedule.strategy == Strategy::Batch && t.is_ready(now))
                .map(|t| t.owner_id.clone())
                .collect()
        };

        let mut reports = Vec::with_capacity(owners.len());
        for owner in owners {
            reports.push(self.batch_sync(&owner).await?);
        }
        Ok(reports)
    }

    /// Drop terminal tasks that ended more than `retention_hours` ago.
    ///
    /// A window too large to represent keeps everything.
    pub fn cleanup(&self, retention_hours: u64) -> usize {
        let inner = &self.inner;
        let Some(cutoff) = i64::try_from(retention_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .and_then(|window| inner.clock.now().checked_sub_signed(window))
        else {
            debug!(retention_hours, "retention window out of range; nothing to reap");
            return 0;
        };
        let removed: Vec<SyncTask> = {
            let mut state = inner.lock();
            let expired: Vec<SyncTaskId> = state
                .queue
                .iter()
                .filter(|t| t.status.is_terminal() && t.ended_at.is_some_and(|ended| ended < cutoff))
                .map(|t| t.id)
                .collect();
            expired
                .iter()
                .filter_map(|id| state.queue.remove(id))
                .collect()
        };

        for task in &removed {
            inner.bus.publish(&SyncEvent::TaskCleaned(task.snapshot()));
        }
        if !removed.is_empty() {
            info!(removed = removed.len(), retention_hours, "reaped terminal tasks");
        }
        removed.len()
    }

    /// Stop admitting work. In-flight attempts still settle.
    pub fn shutdown(&self) {
        let running = {
            let mut state = self.inner.lock();
            state.closed = true;
            state.limiter.close();
            state.limiter.running_count()
        };
        info!(running, "scheduler closed");
    }
}

impl SchedulerInner {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Scheduling loop: fill free slots with ready pending tasks, priority first.
    ///
    /// Returns immediately when the limiter is saturated; completions call this again.
    pub(crate) fn pump(self: &Arc<Self>) {
        let admitted = {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            let available = state.limiter.available();
            if available == 0 {
                return;
            }

            let now = Instant::now();
            let candidates = {
                let released = &state.released;
                state.queue.next_batch(available, |t| {
                    t.is_ready(now)
                        && match t.schedule.strategy {
                            Strategy::Immediate => true,
                            Strategy::Manual => released.contains(&t.id),
                            Strategy::Batch => false,
                        }
                })
            };

            let mut admitted = Vec::with_capacity(candidates.len());
            for id in candidates {
                if !state.limiter.try_admit(id) {
                    break;
                }
                state.released.remove(&id);
                if let Some(started) = self.start(&mut state, &id) {
                    admitted.push(started);
                }
            }
            admitted
        };

        for (snapshot, plan) in admitted {
            self.dispatch(snapshot, plan);
        }
    }

    /// Pending -> Running for a task that already holds a slot.
    fn start(
        &self,
        state: &mut SchedulerState,
        id: &SyncTaskId,
    ) -> Option<(TaskSnapshot, ExecutionPlan)> {
        let attempt_id = self.ids.generate_attempt_id();
        let now = self.clock.now();
        let Some(task) = state.queue.find_mut(id) else {
            state.limiter.release(id);
            return None;
        };
        task.start_attempt(attempt_id, now);
        Some((task.snapshot(), ExecutionPlan::for_task(task)))
    }

    fn dispatch(self: &Arc<Self>, started: TaskSnapshot, plan: ExecutionPlan) -> JoinHandle<()> {
        info!(
            task_id = %plan.task_id,
            attempt = plan.attempt,
            targets = plan.targets.len(),
            "sync task started"
        );
        self.bus.publish(&SyncEvent::TaskStarted(started));
        let inner = Arc::clone(self);
        tokio::spawn(inner.run_attempt(plan))
    }

    async fn run_attempt(self: Arc<Self>, plan: ExecutionPlan) {
        {
            let mut results = self.executor.execute(&plan);
            while let Some(result) = results.next().await {
                let mut state = self.lock();
                if let Some(task) = state.queue.find_mut(&plan.task_id) {
                    task.record_result(result);
                }
            }
        }
        self.finish_attempt(&plan);
    }

    /// Apply the retry decision for a settled attempt, free the slot, refill.
    fn finish_attempt(self: &Arc<Self>, plan: &ExecutionPlan) {
        let now = self.clock.now();
        let (event, retry_at) = {
            let mut state = self.lock();
            state.limiter.release(&plan.task_id);
            let Some(task) = state.queue.find_mut(&plan.task_id) else {
                warn!(task_id = %plan.task_id, "settled task vanished from the queue");
                return;
            };

            task.settle_attempt();
            let outcome = AttemptOutcome::from_results(task.total_targets(), &task.results);
            match self.retry.decide(task, &outcome) {
                Decision::Complete => {
                    task.mark_completed(now);
                    info!(task_id = %task.id, attempt = plan.attempt, "sync task completed");
                    (Some(SyncEvent::TaskCompleted(task.snapshot())), None)
                }
                Decision::Retry { delay, reason } => {
                    let ready_at = Instant::now() + delay;
                    task.schedule_retry(now, ready_at);
                    info!(
                        task_id = %task.id,
                        attempt = plan.attempt,
                        retries_left = task.schedule.retries_left(),
                        progress = task.attempts.last().map(|a| a.progress),
                        %reason,
                        "sync task retry scheduled"
                    );
                    (None, Some(ready_at))
                }
                Decision::Fail { reason } => {
                    task.mark_failed(now);
                    warn!(
                        task_id = %task.id,
                        attempt = plan.attempt,
                        progress = task.progress,
                        %reason,
                        "sync task failed"
                    );
                    (Some(SyncEvent::TaskFailed(task.snapshot())), None)
                }
            }
        };

        if let Some(event) = event {
            self.bus.publish(&event);
        }
        if let Some(ready_at) = retry_at {
            let inner = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep_until(ready_at).await;
                inner.pump();
            });
        }
        self.pump();
    }
}
