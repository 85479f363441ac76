//! AffectedTargetResolver - 変更されたコンテンツを参照する target を探す
//!
//! 照合ルールは暫定（本文への部分一致）。本物のインデックスに差し替えられるよう
//! trait にしてある。

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{AffectedTarget, ContentId, OwnerId, SessionId, StoreError};
use crate::ports::RecordStore;

/// Side-effect free discovery. Safe to call concurrently.
#[async_trait]
pub trait TargetResolver: Send + Sync {
    async fn resolve(
        &self,
        content_id: &ContentId,
        owner_id: &OwnerId,
        session_id: Option<&SessionId>,
    ) -> Result<Vec<AffectedTarget>, StoreError>;
}

/// Scans every record of the owner for a reference to the content.
///
/// A record matches when its serialized content mentions the content id, or
/// (for session-scoped content) the owning session id.
pub struct StoreTargetResolver {
    store: Arc<dyn RecordStore>,
}

impl StoreTargetResolver {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TargetResolver for StoreTargetResolver {
    async fn resolve(
        &self,
        content_id: &ContentId,
        owner_id: &OwnerId,
        session_id: Option<&SessionId>,
    ) -> Result<Vec<AffectedTarget>, StoreError> {
        let records = self.store.query_by_owner(owner_id).await?;

        let targets = records
            .into_iter()
            .filter(|record| {
                record.content.contains(content_id.as_str())
                    || session_id
                        .is_some_and(|s| !s.as_str().is_empty() && record.content.contains(s.as_str()))
            })
            .map(|record| AffectedTarget {
                id: record.id,
                display_name: record.title,
                kind: record.kind,
            })
            .collect();
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TargetKind;
    use crate::impls::InMemoryRecordStore;

    fn store() -> Arc<InMemoryRecordStore> {
        let store = InMemoryRecordStore::new();
        let owner = OwnerId::new("alice");
        store.insert(&owner, "page-1", "Weekly notes", "embeds {{content:c-1}}", TargetKind::UserPage);
        store.insert(&owner, "page-2", "Unrelated", "nothing here", TargetKind::UserPage);
        store.insert(&owner, "tpl-1", "Template", "from session s-9", TargetKind::Template);
        store.insert(&OwnerId::new("bob"), "page-3", "Bob's", "embeds c-1", TargetKind::DerivedPage);
        Arc::new(store)
    }

    #[tokio::test]
    async fn matches_content_references_of_the_owner_only() {
        let resolver = StoreTargetResolver::new(store());
        let targets = resolver
            .resolve(&ContentId::new("c-1"), &OwnerId::new("alice"), None)
            .await
            .unwrap();

        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].id.as_str(), "page-1");
        assert_eq!(targets[0].display_name, "Weekly notes");
    }

    #[tokio::test]
    async fn falls_back_to_session_reference() {
        let resolver = StoreTargetResolver::new(store());
        let session = SessionId::new("s-9");
        let targets = resolver
            .resolve(&ContentId::new("c-1"), &OwnerId::new("alice"), Some(&session))
            .await
            .unwrap();

        let ids: Vec<_> = targets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["page-1", "tpl-1"]);
        assert_eq!(targets[1].kind, TargetKind::Template);
    }

    #[tokio::test]
    async fn unknown_owner_resolves_to_nothing() {
        let resolver = StoreTargetResolver::new(store());
        let targets = resolver
            .resolve(&ContentId::new("c-1"), &OwnerId::new("carol"), None)
            .await
            .unwrap();
        assert!(targets.is_empty());
    }

    #[tokio::test]
    async fn store_errors_propagate() {
        let store = store();
        store.fail_queries(StoreError::transient("index offline"));
        let resolver = StoreTargetResolver::new(store);

        let err = resolver
            .resolve(&ContentId::new("c-1"), &OwnerId::new("alice"), None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
