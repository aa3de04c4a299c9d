use std::sync::Arc;

use super::document::{Document, DocumentId};
use crate::text::{Edit, OffsetRange};

/// One applied edit as seen by observers.
#[derive(Debug, Clone)]
pub struct DocumentChange {
    pub id: DocumentId,
    /// Version after the edit.
    pub version: u64,
    pub language_id: String,
    pub old_text: Arc<str>,
    pub new_text: Arc<str>,
    pub edit: Edit,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone)]
pub enum WorkspaceEvent {
    Opened(Document),
    /// The whole text was replaced without an edit describing the change.
    ContentSet(Document),
    Changed(DocumentChange),
    SelectionChanged {
        id: DocumentId,
        version: u64,
        selection: Vec<OffsetRange>,
    },
    Closed(DocumentId),
}

impl WorkspaceEvent {
    pub fn document_id(&self) -> &DocumentId {
        match self {
            WorkspaceEvent::Opened(doc) | WorkspaceEvent::ContentSet(doc) => doc.id(),
            WorkspaceEvent::Changed(change) => &change.id,
            WorkspaceEvent::SelectionChanged { id, .. } | WorkspaceEvent::Closed(id) => id,
        }
    }
}

/// Receives workspace events synchronously, in application order.
///
/// Called while the workspace lock is held: implementations must not call
/// back into workspace mutators.
pub trait WorkspaceObserver: Send + Sync {
    fn on_event(&self, event: &WorkspaceEvent);
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);
