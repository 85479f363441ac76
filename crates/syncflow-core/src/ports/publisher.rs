//! Publisher port - 型付き publish / subscribe
//!
//! リスナーの失敗を隔離するのは実装側（`app::events::EventBus`）の責務。
//! publish する側はリスナーのエラーを受け取らない。

use std::error::Error as StdError;
use std::sync::Arc;

/// Error type listeners may return. The bus logs it and moves on.
pub type ListenerError = Box<dyn StdError + Send + Sync>;

/// Events carried by a publisher expose a kind for filtered subscriptions.
pub trait BusEvent: Send + Sync + 'static {
    type Kind: Copy + Eq + std::fmt::Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

/// A subscriber. Called synchronously during `publish`.
pub trait Listener<E>: Send + Sync {
    fn on_event(&self, event: &E) -> Result<(), ListenerError>;
}

impl<E, F> Listener<E> for F
where
    F: Fn(&E) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_event(&self, event: &E) -> Result<(), ListenerError> {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

pub trait Publisher<E: BusEvent>: Send + Sync {
    fn subscribe(&self, listener: Arc<dyn Listener<E>>) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Deliver `event` to every listener. Returns how many returned `Ok`.
    fn publish(&self, event: &E) -> usize;
}
