//! Last completed next-edit outcome per document, keyed by fingerprint.

use dashmap::DashMap;
use std::sync::Arc;

use super::NextEditOutcome;
use super::fingerprint::Fingerprint;
use crate::log_context::NextEditLogContext;
use crate::workspace::DocumentId;

#[derive(Debug, Clone)]
pub struct CachedNextEdit {
    pub fingerprint: Fingerprint,
    pub outcome: NextEditOutcome,
    pub log_context: Arc<NextEditLogContext>,
}

/// Thread-safe next-edit cache; one entry per document.
#[derive(Debug, Clone, Default)]
pub struct NextEditCache {
    entries: Arc<DashMap<DocumentId, CachedNextEdit>>,
}

impl NextEditCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an outcome, replacing the document's previous entry.
    pub fn store(&self, entry: CachedNextEdit) {
        log::trace!(
            target: "tsugi::cache",
            "Caching outcome for {} at version {}",
            entry.fingerprint.document_id,
            entry.fingerprint.version
        );
        self.entries
            .insert(entry.fingerprint.document_id.clone(), entry);
    }

    pub fn get(&self, document: &DocumentId) -> Option<CachedNextEdit> {
        self.entries.get(document).map(|entry| entry.clone())
    }

    /// Cached entry if it was computed for exactly this fingerprint.
    pub fn get_if_valid(&self, fingerprint: &Fingerprint) -> Option<CachedNextEdit> {
        self.entries
            .get(&fingerprint.document_id)
            .filter(|entry| entry.fingerprint == *fingerprint)
            .map(|entry| entry.clone())
    }

    /// Drop the document's entry if it predates `version`.
    pub fn invalidate_older_than(&self, document: &DocumentId, version: u64) -> bool {
        let removed = self
            .entries
            .remove_if(document, |_, entry| entry.fingerprint.version < version)
            .is_some();
        if removed {
            log::trace!(
                target: "tsugi::cache",
                "Invalidated cached outcome for {} before version {}",
                document,
                version
            );
        }
        removed
    }

    /// Remove a document's entry (e.g., on document close).
    pub fn remove(&self, document: &DocumentId) {
        self.entries.remove(document);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
