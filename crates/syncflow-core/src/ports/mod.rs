//! Ports - 抽象化レイヤー
//!
//! スケジューラが外部に依存する箇所はすべて trait にしてある。
//! - RecordStore: ページ / テンプレートの正本（発見と書き込み）
//! - Clock / IdGenerator: 時刻と ID（テストで差し替える）
//! - Publisher: ライフサイクルイベントの配信

pub mod clock;
pub mod id_generator;
pub mod publisher;
pub mod record_store;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::publisher::{BusEvent, Listener, ListenerError, Publisher, SubscriptionId};
pub use self::record_store::{RecordStore, StoredRecord, SyncApplied};
