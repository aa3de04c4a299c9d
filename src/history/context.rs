//! Immutable per-request snapshot of recent edits across documents.

use std::sync::Arc;

use super::tracker::HistoryTracker;
use crate::text::{Edit, Fnv1a, RootedEdit};
use crate::workspace::DocumentId;

/// One document's retained change, rolled up from base to current text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHistory {
    pub doc_id: DocumentId,
    pub language_id: String,
    /// Text before the oldest retained edit.
    pub base: Arc<str>,
    /// All retained edits composed into one edit over `base`.
    pub composed_edit: Edit,
    /// Text after `composed_edit`.
    pub current: Arc<str>,
    pub edit_count: usize,
    /// Monotonic activity stamp; larger is more recent.
    pub last_activity: u64,
}

impl DocumentHistory {
    pub fn has_edits(&self) -> bool {
        !self.composed_edit.is_empty()
    }

    pub fn as_rooted(&self) -> RootedEdit {
        RootedEdit::from_parts(
            Arc::clone(&self.base),
            self.composed_edit.clone(),
            Arc::clone(&self.current),
        )
    }
}

/// Recent document histories, most recent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryContext {
    documents: Vec<DocumentHistory>,
    checksum: u64,
}

impl HistoryContext {
    fn new(documents: Vec<DocumentHistory>) -> Self {
        let mut hasher = Fnv1a::new();
        for doc in &documents {
            hasher.write_str(doc.doc_id.as_str());
            hasher.write_str(&doc.language_id);
            hasher.write_str(&doc.base);
            hasher.write_str(&doc.composed_edit.to_json());
        }
        Self {
            checksum: hasher.finish(),
            documents,
        }
    }

    pub fn documents(&self) -> &[DocumentHistory] {
        &self.documents
    }

    pub fn most_recent_document(&self) -> Option<&DocumentHistory> {
        self.documents.first()
    }

    pub fn get(&self, id: &DocumentId) -> Option<&DocumentHistory> {
        self.documents.iter().find(|doc| &doc.doc_id == id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Stable digest of every included document's base and edit.
    pub fn checksum(&self) -> u64 {
        self.checksum
    }
}

pub struct HistoryContextBuilder<'a> {
    tracker: &'a HistoryTracker,
    max_documents: usize,
    active: Option<DocumentId>,
}

impl<'a> HistoryContextBuilder<'a> {
    pub fn new(tracker: &'a HistoryTracker) -> Self {
        Self {
            tracker,
            max_documents: usize::MAX,
            active: None,
        }
    }

    pub fn max_documents(mut self, max_documents: usize) -> Self {
        self.max_documents = max_documents.max(1);
        self
    }

    /// Include this document even when it has no retained edits.
    pub fn active_document(mut self, id: DocumentId) -> Self {
        self.active = Some(id);
        self
    }

    pub fn build(self) -> HistoryContext {
        let mut histories = self.tracker.document_histories();
        histories.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));

        let is_active = |doc: &DocumentHistory| self.active.as_ref() == Some(&doc.doc_id);
        let active_position = histories.iter().position(is_active);
        let mut selected: Vec<DocumentHistory> = Vec::new();
        let others_budget = self.max_documents - usize::from(active_position.is_some());
        let mut others = 0;
        for (index, doc) in histories.into_iter().enumerate() {
            if Some(index) == active_position {
                selected.push(doc);
            } else if doc.has_edits() && others < others_budget {
                selected.push(doc);
                others += 1;
            }
        }
        HistoryContext::new(selected)
    }
}
