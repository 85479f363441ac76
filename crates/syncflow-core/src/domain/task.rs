//! Sync task record: identity + targets + lifecycle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::ids::{AttemptId, ContentId, OwnerId, SessionId, SyncTaskId};
use super::outcome::{progress_of, AttemptRecord, TargetResult};
use super::schedule::Schedule;
use super::state::TaskStatus;
use super::target::{AffectedTarget, ContentChange};

/// The unit of scheduled propagation work.
///
/// Design:
/// - This is the single source of truth for a task's state.
/// - Queue and limiter structures hold `SyncTaskId` only.
/// - All state transitions happen through the methods below.
#[derive(Debug, Clone)]
pub struct SyncTask {
    pub id: SyncTaskId,
    pub content_id: ContentId,
    pub owner_id: OwnerId,
    pub session_id: Option<SessionId>,

    /// Fixed at creation; a task never re-resolves mid-flight.
    pub affected_targets: Vec<AffectedTarget>,
    pub change: ContentChange,

    pub status: TaskStatus,
    pub progress: u8,

    /// Results of the current attempt.
    pub results: Vec<TargetResult>,

    /// Settled attempts, oldest first.
    pub attempts: Vec<AttemptRecord>,

    pub schedule: Schedule,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,

    current_attempt: Option<AttemptId>,

    /// A retried task is pending but not admissible before this instant.
    ready_at: Option<Instant>,
}

impl SyncTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: SyncTaskId,
        content_id: ContentId,
        owner_id: OwnerId,
        session_id: Option<SessionId>,
        affected_targets: Vec<AffectedTarget>,
        change: ContentChange,
        schedule: Schedule,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            content_id,
            owner_id,
            session_id,
            affected_targets,
            change,
            status: TaskStatus::Pending,
            progress: 0,
            results: Vec::new(),
            attempts: Vec::new(),
            schedule,
            created_at,
            started_at: None,
            ended_at: None,
            current_attempt: None,
            ready_at: None,
        }
    }

    pub fn total_targets(&self) -> usize {
        self.affected_targets.len()
    }

    /// 1-indexed number of the current (or next) attempt.
    pub fn attempt_number(&self) -> u32 {
        self.schedule.retry_count + 1
    }

    /// Pending and past any retry delay.
    pub fn is_ready(&self, now: Instant) -> bool {
        self.status == TaskStatus::Pending && self.ready_at.is_none_or(|at| at <= now)
    }

    /// Pending -> Running. Resets per-attempt state.
    pub fn start_attempt(&mut self, attempt_id: AttemptId, now: DateTime<Utc>) {
        debug_assert_eq!(self.status, TaskStatus::Pending);
        self.status = TaskStatus::Running;
        self.progress = 0;
        self.results.clear();
        self.started_at = Some(now);
        self.ended_at = None;
        self.current_attempt = Some(attempt_id);
        self.ready_at = None;
    }

    /// Append one settled target sync. Ignored once every target is reported.
    pub fn record_result(&mut self, result: TargetResult) {
        if self.status != TaskStatus::Running || self.results.len() >= self.total_targets() {
            return;
        }
        self.results.push(result);
    }

    /// All target syncs for the attempt settled: fix `progress`.
    pub fn settle_attempt(&mut self) {
        self.progress = progress_of(self.total_targets(), &self.results);
    }

    /// Running -> Completed.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.archive_attempt(now);
        self.status = TaskStatus::Completed;
        self.ended_at = Some(now);
    }

    /// Running -> Failed. Last attempt's results stay visible.
    pub fn mark_failed(&mut self, now: DateTime<Utc>) {
        self.archive_attempt(now);
        self.status = TaskStatus::Failed;
        self.ended_at = Some(now);
    }

    /// Running -> Pending with backoff.
    ///
    /// The attempt's results move to `attempts`; `results` and `progress`
    /// start over so the next attempt does not double count.
    pub fn schedule_retry(&mut self, now: DateTime<Utc>, ready_at: Instant) {
        self.archive_attempt(now);
        self.schedule.retry_count += 1;
        self.status = TaskStatus::Pending;
        self.results.clear();
        self.progress = 0;
        self.ready_at = Some(ready_at);
    }

    /// Pending -> Cancelled. Returns false from any other state.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::Cancelled;
        self.ended_at = Some(now);
        self.ready_at = None;
        true
    }

    /// Zero discovered targets: nothing to run, done right away.
    pub fn complete_without_targets(&mut self, now: DateTime<Utc>) {
        debug_assert!(self.affected_targets.is_empty());
        self.status = TaskStatus::Completed;
        self.progress = 100;
        self.ended_at = Some(now);
    }

    fn archive_attempt(&mut self, now: DateTime<Utc>) {
        let Some(attempt_id) = self.current_attempt.take() else {
            return;
        };
        self.attempts.push(AttemptRecord {
            attempt_id,
            number: self.attempt_number(),
            started_at: self.started_at.unwrap_or(now),
            ended_at: now,
            progress: self.progress,
            results: self.results.clone(),
        });
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id,
            content_id: self.content_id.clone(),
            owner_id: self.owner_id.clone(),
            session_id: self.session_id.clone(),
            affected_targets: self.affected_targets.clone(),
            change: self.change.clone(),
            status: self.status,
            progress: self.progress,
            results: self.results.clone(),
            attempts: self.attempts.len(),
            schedule: self.schedule.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

/// Serializable view of a task for status queries and events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: SyncTaskId,
    pub content_id: ContentId,
    pub owner_id: OwnerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub affected_targets: Vec<AffectedTarget>,
    pub change: ContentChange,
    pub status: TaskStatus,
    pub progress: u8,
    pub results: Vec<TargetResult>,
    /// Number of settled attempts.
    pub attempts: usize,
    pub schedule: Schedule,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Task counts by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl QueueCounts {
    pub fn add(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Running => self.running += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
            TaskStatus::Cancelled => self.cancelled += 1,
        }
    }
}
