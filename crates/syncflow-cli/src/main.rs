//! syncflow - run one content propagation against an in-memory store
//!
//! Seeds `--pages` records that embed the content, optionally makes some of
//! them fail, then prints the settled task as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde_json::json;
use syncflow_core::domain::{
    ChangeKind, ContentChange, ContentId, EventKind, OwnerId, Priority, StoreError, SyncEvent,
    TargetKind,
};
use syncflow_core::impls::InMemoryRecordStore;
use syncflow_core::ports::{ListenerError, Publisher};
use syncflow_core::{CreateTaskOptions, SchedulerConfig, SyncScheduler};
use tokio::time::{Duration, sleep};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Immediate,
    Batch,
    Manual,
}

#[derive(Debug, Parser)]
#[command(name = "syncflow", about = "Propagate one content edit to every page that embeds it")]
struct Cli {
    /// TOML scheduler config; defaults apply when omitted.
    #[arg(long, env = "SYNCFLOW_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, default_value = "demo-user")]
    owner: String,

    #[arg(long, default_value = "content-1")]
    content: String,

    /// Number of pages embedding the content.
    #[arg(long, default_value_t = 4)]
    pages: usize,

    /// How many of those pages fail with a transient error.
    #[arg(long, default_value_t = 0)]
    fail: usize,

    /// Failing pages recover after this many failures (0 = never).
    #[arg(long, default_value_t = 1)]
    fail_times: u32,

    #[arg(long, value_enum, default_value_t = StrategyArg::Immediate)]
    strategy: StrategyArg,

    #[arg(long)]
    max_retries: Option<u32>,

    /// Overrides `retry_delay_ms` from the config.
    #[arg(long)]
    retry_delay_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG で上書きできる。既定は info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // (A) 設定を読む
    let mut config = match &cli.config {
        Some(path) => SchedulerConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SchedulerConfig::default(),
    };
    if let Some(ms) = cli.retry_delay_ms {
        config = config.with_retry_delay(Duration::from_millis(ms));
    }

    // (B) ストアに content を参照するページを用意
    let owner = OwnerId::new(cli.owner.as_str());
    let store = Arc::new(InMemoryRecordStore::new().with_latency(Duration::from_millis(50)));
    for i in 0..cli.pages {
        let id = format!("page-{i}");
        store.insert(
            &owner,
            &id,
            &format!("Page {i}"),
            &format!("embeds {{{{{}}}}}", cli.content),
            TargetKind::DerivedPage,
        );
        if i < cli.fail {
            let error = StoreError::transient(format!("{id} is temporarily locked"));
            if cli.fail_times == 0 {
                store.fail_target(&id, error);
            } else {
                store.fail_target_times(&id, error, cli.fail_times);
            }
        }
    }

    // (C) スケジューラとイベントの購読
    let scheduler = SyncScheduler::new(config, store.clone()).context("building scheduler")?;
    scheduler
        .events()
        .subscribe(Arc::new(|event: &SyncEvent| -> Result<(), ListenerError> {
            let task = event.task();
            info!(
                event = ?event.kind(),
                task_id = %task.id,
                status = ?task.status,
                progress = task.progress,
                "lifecycle"
            );
            Ok(())
        }));
    scheduler.events().on(EventKind::TaskFailed, |event| {
        eprintln!("task {} failed after {} attempt(s)", event.task().id, event.task().attempts);
        Ok(())
    });

    // (D) タスクを作る
    let options = match cli.strategy {
        StrategyArg::Immediate => CreateTaskOptions::immediate(),
        StrategyArg::Batch => CreateTaskOptions::batch(),
        StrategyArg::Manual => CreateTaskOptions::manual(),
    }
    .with_priority(Priority::High);
    let options = match cli.max_retries {
        Some(n) => options.with_max_retries(n),
        None => options,
    };
    let change = ContentChange::new(ChangeKind::Update, "note")
        .with_after(json!({ "title": "edited", "source": cli.content }));

    let task = scheduler
        .create_sync_task(ContentId::new(cli.content.as_str()), owner.clone(), change, options)
        .await
        .context("creating sync task")?;
    info!(task_id = %task.id, targets = task.affected_targets.len(), "task queued");

    // (E) 戦略ごとに実行を進める
    match cli.strategy {
        StrategyArg::Immediate => {}
        StrategyArg::Manual => {
            scheduler.release_manual(&task.id)?;
        }
        StrategyArg::Batch => {
            let report = scheduler.batch_sync(&owner).await?;
            info!(chunks = report.chunks.len(), dispatched = report.dispatched(), "batch flushed");
        }
    }

    // (F) 終端状態までポーリング。batch のリトライは次の batch_sync で拾う
    let settled = loop {
        let Some(snapshot) = scheduler.get_task_status(&task.id) else {
            anyhow::bail!("task {} disappeared", task.id);
        };
        if snapshot.status.is_terminal() {
            break snapshot;
        }
        if matches!(cli.strategy, StrategyArg::Batch) {
            sleep(scheduler.config().retry_delay()).await;
            scheduler.batch_sync(&owner).await?;
        } else {
            sleep(Duration::from_millis(50)).await;
        }
    };

    println!("{}", serde_json::to_string_pretty(&settled)?);
    println!("{}", serde_json::to_string(&scheduler.counts())?);
    scheduler.shutdown();
    Ok(())
}
