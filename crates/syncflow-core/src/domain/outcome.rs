//! Outcome model: per-target results and the aggregate of one attempt.
//!
//! This module does not know about queues or workers. It only defines the
//! "shape" of results the scheduler records and reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{ErrorKind, StoreError};
use super::ids::{AttemptId, TargetId};

/// Result classification for a single target sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Success,
    Error,
    /// The store decided nothing had to change for this target.
    Skipped,
}

/// Outcome of one per-target sync call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetResult {
    pub target_id: TargetId,
    pub status: TargetStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl TargetResult {
    pub fn success(target_id: TargetId, detail: impl Into<String>) -> Self {
        Self {
            target_id,
            status: TargetStatus::Success,
            detail: Some(detail.into()),
            error: None,
            error_kind: None,
            duration_ms: None,
        }
    }

    pub fn skipped(target_id: TargetId, reason: impl Into<String>) -> Self {
        Self {
            target_id,
            status: TargetStatus::Skipped,
            detail: Some(reason.into()),
            error: None,
            error_kind: None,
            duration_ms: None,
        }
    }

    pub fn error(target_id: TargetId, err: &StoreError) -> Self {
        Self {
            target_id,
            status: TargetStatus::Error,
            detail: None,
            error: Some(err.message.clone()),
            error_kind: Some(err.kind),
            duration_ms: None,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Success and skipped both leave the target in sync.
    pub fn is_satisfied(&self) -> bool {
        matches!(self.status, TargetStatus::Success | TargetStatus::Skipped)
    }
}

/// Aggregate outcome of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Every target is satisfied (also the `total == 0` case).
    Completed,

    /// At least one target failed. Candidate for retry.
    Failed {
        errors: usize,
        /// Every error in this attempt was classified permanent.
        permanent_only: bool,
    },
}

impl AttemptOutcome {
    pub fn from_results(total: usize, results: &[TargetResult]) -> Self {
        let satisfied = results.iter().filter(|r| r.is_satisfied()).count();
        if satisfied == total {
            return AttemptOutcome::Completed;
        }
        let errors: Vec<_> = results
            .iter()
            .filter(|r| r.status == TargetStatus::Error)
            .collect();
        let permanent_only = !errors.is_empty()
            && errors
                .iter()
                .all(|r| r.error_kind == Some(ErrorKind::Permanent));
        AttemptOutcome::Failed {
            errors: errors.len(),
            permanent_only,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, AttemptOutcome::Completed)
    }
}

/// `round(100 * satisfied / total)`, 100 for an empty target list.
pub fn progress_of(total: usize, results: &[TargetResult]) -> u8 {
    if total == 0 {
        return 100;
    }
    let satisfied = results.iter().filter(|r| r.is_satisfied()).count();
    let pct = (100.0 * satisfied as f64 / total as f64).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Archived trace of one settled attempt.
///
/// Retried tasks clear `results` for the next attempt; the previous attempt
/// lives on here for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt_id: AttemptId,
    /// 1-indexed attempt number.
    pub number: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub progress: u8,
    pub results: Vec<TargetResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ok(id: &str) -> TargetResult {
        TargetResult::success(TargetId::new(id), "updated")
    }

    fn err(id: &str, kind: ErrorKind) -> TargetResult {
        let e = StoreError {
            kind,
            message: "boom".to_string(),
        };
        TargetResult::error(TargetId::new(id), &e)
    }

    #[test]
    fn empty_attempt_is_completed_at_full_progress() {
        assert_eq!(AttemptOutcome::from_results(0, &[]), AttemptOutcome::Completed);
        assert_eq!(progress_of(0, &[]), 100);
    }

    #[rstest]
    #[case::all_ok(vec![ok("a"), ok("b"), ok("c")], 100)]
    #[case::one_of_two(vec![ok("a"), err("b", ErrorKind::Transient)], 50)]
    #[case::one_of_three(vec![ok("a"), err("b", ErrorKind::Transient), err("c", ErrorKind::Transient)], 33)]
    #[case::two_of_three(vec![ok("a"), ok("b"), err("c", ErrorKind::Transient)], 67)]
    fn progress_is_rounded_percentage(#[case] results: Vec<TargetResult>, #[case] expected: u8) {
        assert_eq!(progress_of(results.len(), &results), expected);
    }

    #[test]
    fn skipped_counts_as_satisfied() {
        let results = vec![ok("a"), TargetResult::skipped(TargetId::new("b"), "unchanged")];
        assert_eq!(AttemptOutcome::from_results(2, &results), AttemptOutcome::Completed);
    }

    #[test]
    fn permanent_only_is_detected() {
        let results = vec![ok("a"), err("b", ErrorKind::Permanent)];
        assert_eq!(
            AttemptOutcome::from_results(2, &results),
            AttemptOutcome::Failed {
                errors: 1,
                permanent_only: true
            }
        );

        let mixed = vec![err("a", ErrorKind::Transient), err("b", ErrorKind::Permanent)];
        assert_eq!(
            AttemptOutcome::from_results(2, &mixed),
            AttemptOutcome::Failed {
                errors: 2,
                permanent_only: false
            }
        );
    }

    #[test]
    fn target_result_serializes_without_empty_fields() {
        let v = serde_json::to_value(ok("page-1").with_duration_ms(12)).unwrap();
        assert_eq!(v["status"], "success");
        assert_eq!(v["duration_ms"], 12);
        assert!(v.get("error").is_none());
    }
}
