//! Maintenance loops - 定期的な reap と batch_sync
//!
//! # 学習ポイント
//! - watch channel で停止を通知（`shutdown_tx` を送るとループが抜ける）
//! - tokio::time::interval を select! で shutdown と競合させる
//! - 実行中の batch_sync は中断しない（次の tick を取らないだけ）

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::scheduler::SyncScheduler;

/// Handle for the reaper and batch loops.
/// - `request_shutdown()` で両ループが止まる
/// - `shutdown_and_join()` で終了まで待てる
pub struct MaintenanceHandle {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl MaintenanceHandle {
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(err) = join.await {
                warn!(error = %err, "maintenance loop join failed");
            }
        }
    }
}

impl SyncScheduler {
    /// Start the periodic reaper (`cleanup_interval`) and batch sweep (`batch_interval`).
    ///
    /// Both loops wait one full period before their first run.
    pub fn spawn_maintenance(&self) -> MaintenanceHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = self.config().clone();

        let reaper = {
            let scheduler = self.clone();
            let rx = shutdown_rx.clone();
            let retention_hours = config.retention_hours;
            tokio::spawn(run_every("reaper", config.cleanup_interval(), rx, move || {
                let scheduler = scheduler.clone();
                async move {
                    scheduler.cleanup(retention_hours);
                }
            }))
        };

        let batcher = {
            let scheduler = self.clone();
            tokio::spawn(run_every("batch", config.batch_interval(), shutdown_rx, move || {
                let scheduler = scheduler.clone();
                async move {
                    match scheduler.batch_sync_all().await {
                        Ok(reports) => {
                            let dispatched: usize = reports.iter().map(|r| r.dispatched()).sum();
                            debug!(owners = reports.len(), dispatched, "batch sweep done");
                        }
                        Err(err) => warn!(error = %err, "batch sweep failed"),
                    }
                }
            }))
        };

        info!(
            cleanup_interval_secs = config.cleanup_interval_secs,
            batch_interval_secs = config.batch_interval_secs,
            "maintenance loops started"
        );
        MaintenanceHandle {
            shutdown_tx,
            joins: vec![reaper, batcher],
        }
    }
}

async fn run_every<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    mut tick: F,
) where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = interval.tick() => {}
        }
        tick().await;
    }
    debug!(loop_name = name, "maintenance loop stopped");
}
