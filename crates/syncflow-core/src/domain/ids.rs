//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID + Phantom type
//! - **時刻でソート可能**: 生成順で並ぶので、ログやスナップショットを追いやすい
//! - **型安全**: `SyncTaskId` と `AttemptId` は混同できない
//!
//! 外部ストアのレコード ID やコンテンツ ID は ULID とは限らないので、
//! そちらは文字列 newtype（`ContentId`, `OwnerId`, ...）で表現する。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"sync-", "attempt-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData なので実行時のサイズは Ulid と同じ（16 bytes）。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// SyncTask のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SyncTaskMarker {}

impl IdMarker for SyncTaskMarker {
    fn prefix() -> &'static str {
        "sync-"
    }
}

/// Attempt のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttemptMarker {}

impl IdMarker for AttemptMarker {
    fn prefix() -> &'static str {
        "attempt-"
    }
}

/// Identifier of a sync task (the unit of scheduled propagation work).
pub type SyncTaskId = Id<SyncTaskMarker>;

/// Identifier of one execution attempt of a sync task.
pub type AttemptId = Id<AttemptMarker>;

macro_rules! string_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

string_key!(
    /// Identifier of the edited content item.
    ContentId
);
string_key!(
    /// Identity of the user that owns the content and every derived target.
    OwnerId
);
string_key!(
    /// Editing session that produced session-scoped content.
    SessionId
);
string_key!(
    /// Identifier of a record in the external store (page or template).
    TargetId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types_with_prefixes() {
        let task = SyncTaskId::from_ulid(Ulid::new());
        let attempt = AttemptId::from_ulid(Ulid::new());

        assert!(task.to_string().starts_with("sync-"));
        assert!(attempt.to_string().starts_with("attempt-"));
        // let _: SyncTaskId = attempt; // <- does not compile
    }

    #[test]
    fn ulid_ids_are_sortable() {
        let id1 = SyncTaskId::from_ulid(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = SyncTaskId::from_ulid(Ulid::new());

        assert!(id1 < id2);
    }

    #[test]
    fn string_keys_serialize_transparently() {
        let owner = OwnerId::new("user-42");
        let s = serde_json::to_string(&owner).unwrap();
        assert_eq!(s, "\"user-42\"");
        assert_eq!(owner.as_str(), "user-42");
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<SyncTaskId>(), size_of::<Ulid>());
    }
}
