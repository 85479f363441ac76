//! Affected targets and the opaque change payload.

use serde::{Deserialize, Serialize};

use super::ids::TargetId;

/// What sort of derived artifact embeds the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    DerivedPage,
    UserPage,
    Template,
}

/// A derived artifact that references the edited content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedTarget {
    pub id: TargetId,
    pub display_name: String,
    pub kind: TargetKind,
}

impl AffectedTarget {
    pub fn new(id: impl Into<TargetId>, display_name: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

/// The edit being propagated.
///
/// `before` / `after` are opaque to the scheduler: it never inspects their
/// shape, only the record store interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentChange {
    pub kind: ChangeKind,
    pub content_kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<serde_json::Value>,
}

impl ContentChange {
    pub fn new(kind: ChangeKind, content_kind: impl Into<String>) -> Self {
        Self {
            kind,
            content_kind: content_kind.into(),
            before: None,
            after: None,
        }
    }

    pub fn with_before(mut self, before: serde_json::Value) -> Self {
        self.before = Some(before);
        self
    }

    pub fn with_after(mut self, after: serde_json::Value) -> Self {
        self.after = Some(after);
        self
    }
}
