//! syncflow-core
//!
//! Schedules propagation of content edits to the pages and templates that
//! embed them.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, schedule, target, task, outcome, state, errors, events）
//! - **ports**: 抽象化レイヤー（RecordStore, Clock, IdGenerator, Publisher）
//! - **app**: スケジューラ本体（builder, scheduler, queue, limiter, executor, retry, events, maintenance）
//! - **impls**: 実装（InMemoryRecordStore など開発用）
//! - **config**: TOML から読むスケジューラ設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use self::app::{BatchReport, CreateTaskOptions, SchedulerBuilder, SyncScheduler};
pub use self::config::SchedulerConfig;
