//! EventBus - 同期 publish / subscribe
//!
//! # リスナー隔離
//! - publish はリスナーを登録順に同期で呼ぶ
//! - `Err` を返したリスナー、panic したリスナーはログに残して次へ進む
//! - リスナー一覧は呼び出し前に複製するので、リスナー内で subscribe しても詰まらない

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::warn;

use crate::domain::{EventKind, SyncEvent};
use crate::ports::{BusEvent, Listener, ListenerError, Publisher, SubscriptionId};

impl BusEvent for SyncEvent {
    type Kind = EventKind;

    fn kind(&self) -> EventKind {
        SyncEvent::kind(self)
    }
}

/// Wraps a listener so it only sees one kind of event.
struct KindFilter<E: BusEvent> {
    kind: E::Kind,
    inner: Arc<dyn Listener<E>>,
}

impl<E: BusEvent> Listener<E> for KindFilter<E> {
    fn on_event(&self, event: &E) -> Result<(), ListenerError> {
        if event.kind() == self.kind {
            self.inner.on_event(event)
        } else {
            Ok(())
        }
    }
}

pub struct EventBus<E: BusEvent> {
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn Listener<E>>)>>,
    next_id: AtomicU64,
}

impl<E: BusEvent> EventBus<E> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `listener` for events of `kind` only.
    pub fn on<F>(&self, kind: E::Kind, listener: F) -> SubscriptionId
    where
        F: Fn(&E) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(KindFilter {
            kind,
            inner: Arc::new(listener),
        }))
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: BusEvent> Publisher<E> for EventBus<E> {
    fn subscribe(&self, listener: Arc<dyn Listener<E>>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    fn publish(&self, event: &E) -> usize {
        let listeners: Vec<_> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut delivered = 0;
        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    warn!(subscription = id.0, kind = ?event.kind(), error = %err, "event listener failed");
                }
                Err(_) => {
                    warn!(subscription = id.0, kind = ?event.kind(), "event listener panicked");
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ChangeKind, ContentChange, ContentId, OwnerId, Priority, Schedule, Strategy, SyncTask,
        SyncTaskId,
    };
    use chrono::Utc;
    use std::sync::Mutex;
    use ulid::Ulid;

    fn snapshot() -> crate::domain::TaskSnapshot {
        SyncTask::new(
            SyncTaskId::from_ulid(Ulid::new()),
            ContentId::new("c"),
            OwnerId::new("o"),
            None,
            Vec::new(),
            ContentChange::new(ChangeKind::Update, "note"),
            Schedule::new(Strategy::Immediate, Priority::Medium, 0),
            Utc::now(),
        )
        .snapshot()
    }

    #[test]
    fn on_filters_by_kind() {
        let bus = EventBus::<SyncEvent>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.on(EventKind::TaskCompleted, move |e: &SyncEvent| {
            sink.lock().unwrap().push(e.kind());
            Ok(())
        });

        bus.publish(&SyncEvent::TaskCreated(snapshot()));
        bus.publish(&SyncEvent::TaskCompleted(snapshot()));

        assert_eq!(*seen.lock().unwrap(), vec![EventKind::TaskCompleted]);
    }

    #[test]
    fn failing_and_panicking_listeners_are_isolated() {
        let bus = EventBus::<SyncEvent>::new();
        let hits = Arc::new(AtomicU64::new(0));

        bus.subscribe(Arc::new(|_: &SyncEvent| -> Result<(), ListenerError> {
            Err("listener exploded".into())
        }));
        bus.subscribe(Arc::new(|_: &SyncEvent| -> Result<(), ListenerError> {
            panic!("listener panicked")
        }));
        let counter = Arc::clone(&hits);
        bus.subscribe(Arc::new(move |_: &SyncEvent| -> Result<(), ListenerError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        let delivered = bus.publish(&SyncEvent::TaskFailed(snapshot()));

        assert_eq!(delivered, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::<SyncEvent>::new();
        let id = bus.subscribe(Arc::new(|_: &SyncEvent| -> Result<(), ListenerError> { Ok(()) }));
        assert_eq!(bus.listener_count(), 1);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.publish(&SyncEvent::TaskCleaned(snapshot())), 0);
    }
}
