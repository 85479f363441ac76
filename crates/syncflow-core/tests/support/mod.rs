#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use syncflow_core::domain::{
    ChangeKind, ContentChange, EventKind, OwnerId, StoreError, SyncEvent, SyncTaskId, TargetId,
    TargetKind, TaskSnapshot,
};
use syncflow_core::impls::InMemoryRecordStore;
use syncflow_core::ports::{ListenerError, Publisher, RecordStore, StoredRecord, SyncApplied};
use syncflow_core::SyncScheduler;

pub fn update() -> ContentChange {
    ContentChange::new(ChangeKind::Update, "note")
}

/// Store whose every sync takes `latency` and which remembers peak parallelism.
pub struct LatencyStore {
    pub inner: InMemoryRecordStore,
    latency: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    crashing: Mutex<Vec<TargetId>>,
}

impl LatencyStore {
    pub fn new(latency: Duration) -> Self {
        Self {
            inner: InMemoryRecordStore::new(),
            latency,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            crashing: Mutex::new(Vec::new()),
        }
    }

    /// One record per content id, named `page-<content>`, referencing it.
    pub fn seed(&self, owner: &OwnerId, contents: &[&str]) {
        for content in contents {
            self.inner.insert(
                owner,
                &format!("page-{content}"),
                &format!("Page {content}"),
                &format!("embeds {{{{{content}}}}}"),
                TargetKind::DerivedPage,
            );
        }
    }

    /// Syncing `target` panics inside the store call.
    pub fn crash_on(&self, target: &str) {
        self.crashing.lock().unwrap().push(TargetId::new(target));
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for LatencyStore {
    async fn query_by_owner(&self, owner: &OwnerId) -> Result<Vec<StoredRecord>, StoreError> {
        self.inner.query_by_owner(owner).await
    }

    async fn apply_sync_update(
        &self,
        target: &TargetId,
        owner: &OwnerId,
        change: &ContentChange,
    ) -> Result<SyncApplied, StoreError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        if self.crashing.lock().unwrap().contains(target) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            panic!("store driver crashed on {target}");
        }
        let result = self.inner.apply_sync_update(target, owner, change).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Records every event the scheduler publishes.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<SyncEvent>>>,
}

impl EventLog {
    pub fn attach(scheduler: &SyncScheduler) -> Self {
        let log = Self::default();
        let sink = Arc::clone(&log.events);
        scheduler
            .events()
            .subscribe(Arc::new(move |event: &SyncEvent| -> Result<(), ListenerError> {
                sink.lock().unwrap().push(event.clone());
                Ok(())
            }));
        log
    }

    pub fn all(&self) -> Vec<SyncEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds_for(&self, id: &SyncTaskId) -> Vec<EventKind> {
        self.all()
            .iter()
            .filter(|e| &e.task().id == id)
            .map(SyncEvent::kind)
            .collect()
    }

    /// Content ids of started tasks, in start order.
    pub fn started_contents(&self) -> Vec<String> {
        self.all()
            .iter()
            .filter(|e| e.kind() == EventKind::TaskStarted)
            .map(|e| e.task().content_id.to_string())
            .collect()
    }
}

/// Poll until the task reaches a terminal status. Intended for paused-time tests.
pub async fn wait_terminal(scheduler: &SyncScheduler, id: &SyncTaskId) -> TaskSnapshot {
    for _ in 0..100_000 {
        if let Some(snapshot) = scheduler.get_task_status(id) {
            if snapshot.status.is_terminal() {
                return snapshot;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {id} never settled");
}
