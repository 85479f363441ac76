//! App - アプリケーション層
//!
//! ports を組み合わせてスケジューラを組み立てる。
//!
//! # 主要コンポーネント
//! - **SchedulerBuilder**: 構築とワイヤリング（Fail-fast な設定検証）
//! - **SyncScheduler**: create / status / cancel / batch_sync / cleanup の表面
//! - **TaskQueue / ConcurrencyLimiter**: 優先度順の取り出しと同時実行数の上限
//! - **TaskExecutor**: target 同期の並列実行
//! - **RetryController**: 1 回の attempt の結果から次の遷移を決める
//! - **EventBus**: ライフサイクルイベントの配信
//! - **MaintenanceHandle**: 定期 reap と batch sweep

pub mod builder;
pub mod events;
pub mod executor;
pub mod limiter;
pub mod maintenance;
pub mod queue;
pub mod resolver;
pub mod retry;
pub mod scheduler;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, SchedulerBuilder};
pub use self::events::EventBus;
pub use self::executor::{ExecutionPlan, TaskExecutor};
pub use self::limiter::ConcurrencyLimiter;
pub use self::maintenance::MaintenanceHandle;
pub use self::queue::TaskQueue;
pub use self::resolver::{StoreTargetResolver, TargetResolver};
pub use self::retry::{Decision, RetryController, RetryPolicy};
pub use self::scheduler::{BatchReport, CreateTaskOptions, SyncScheduler};
