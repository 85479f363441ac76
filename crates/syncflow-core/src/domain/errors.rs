//! Errors - エラー型と分類
//!
//! 実行時に「想定内」の失敗（target の同期失敗、リトライ切れ）はデータ
//! （`status`, `results`）で表す。ここにあるのは呼び出し側に返すエラーだけ。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::SyncTaskId;

/// ErrorKind は外部ストアのエラー分類
///
/// - Transient: 一時的なエラー（リトライ推奨）
/// - Permanent: 恒久的なエラー（not found / permission denied など、リトライ無意味）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    Permanent,
}

/// Error raised by the record store collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("store error (kind: {kind:?}): {message}")]
pub struct StoreError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::Transient
    }
}

/// Errors surfaced by the scheduler API.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("duplicate task id={0}")]
    DuplicateTask(SyncTaskId),

    #[error("task not found: {0}")]
    TaskNotFound(SyncTaskId),

    #[error("target discovery failed: {0}")]
    Discovery(#[source] StoreError),

    #[error("scheduler is closed")]
    SchedulerClosed,
}
