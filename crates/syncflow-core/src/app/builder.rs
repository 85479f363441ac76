//! SchedulerBuilder - スケジューラの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）: 不正な設定は build() で弾く
//! - Clock / IdGenerator / TargetResolver はテストで差し替えられる

use std::sync::Arc;

use super::executor::TaskExecutor;
use super::resolver::{StoreTargetResolver, TargetResolver};
use super::retry::{RetryController, RetryPolicy};
use super::scheduler::SyncScheduler;
use crate::config::{ConfigError, SchedulerConfig};
use crate::ports::{Clock, IdGenerator, RecordStore, SystemClock, UlidGenerator};

/// SchedulerBuilder は SyncScheduler を構築
///
/// # 使用例
/// ```ignore
/// let scheduler = SchedulerBuilder::new(store)
///     .config(SchedulerConfig::default().with_max_concurrent_tasks(5))
///     .build()?;
/// ```
pub struct SchedulerBuilder {
    store: Arc<dyn RecordStore>,
    config: SchedulerConfig,
    resolver: Option<Arc<dyn TargetResolver>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

/// BuildError はスケジューラ構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid scheduler config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl SchedulerBuilder {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            config: SchedulerConfig::default(),
            resolver: None,
            clock: None,
            ids: None,
        }
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default store-scanning discovery.
    pub fn resolver(mut self, resolver: Arc<dyn TargetResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// 設定を検証して SyncScheduler を生成
    ///
    /// Id generator を指定しなかった場合は、選ばれた clock を使う ULID 生成器になる。
    pub fn build(self) -> Result<SyncScheduler, BuildError> {
        self.config.validate()?;

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let ids: Arc<dyn IdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(Arc::clone(&clock))),
        };
        let resolver: Arc<dyn TargetResolver> = match self.resolver {
            Some(resolver) => resolver,
            None => Arc::new(StoreTargetResolver::new(Arc::clone(&self.store))),
        };
        let retry = RetryController::new(
            RetryPolicy::new(self.config.retry_delay())
                .with_retry_permanent_errors(self.config.retry_permanent_errors),
        );

        Ok(SyncScheduler::from_parts(
            self.config,
            TaskExecutor::new(self.store),
            resolver,
            retry,
            clock,
            ids,
        ))
    }
}

impl SyncScheduler {
    /// Shorthand for `SchedulerBuilder::new(store).config(config).build()`.
    pub fn new(config: SchedulerConfig, store: Arc<dyn RecordStore>) -> Result<Self, BuildError> {
        SchedulerBuilder::new(store).config(config).build()
    }

    pub fn builder(store: Arc<dyn RecordStore>) -> SchedulerBuilder {
        SchedulerBuilder::new(store)
    }
}
