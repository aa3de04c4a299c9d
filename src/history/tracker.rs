//! Per-document rolling history of recent edits.
//!
//! Each document keeps a FIFO of rooted edits forming a gapless chain: the
//! base of every entry is the result of the entry before it. Evicting the
//! oldest entry therefore re-anchors the retained base to the next entry's
//! base, which is exactly the text the evicted edit produced.
//!
//! Edits that leave the text unchanged are never recorded.

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::context::DocumentHistory;
use crate::config::HistorySettings;
use crate::text::{Edit, RootedEdit, render_history};
use crate::workspace::{
    Document, DocumentChange, DocumentId, ObservableWorkspace, WorkspaceEvent, WorkspaceObserver,
};

#[derive(Debug, Clone)]
struct HistoryEntry {
    rooted: RootedEdit,
    timestamp_ms: u64,
}

#[derive(Debug)]
struct DocumentEditQueue {
    language_id: String,
    entries: VecDeque<HistoryEntry>,
    /// Text after the newest entry, or the text the queue was reset to.
    current: Arc<str>,
    last_activity: u64,
}

impl DocumentEditQueue {
    fn new(document: &Document, activity: u64) -> Self {
        Self {
            language_id: document.language_id().to_string(),
            entries: VecDeque::new(),
            current: Arc::clone(document.text()),
            last_activity: activity,
        }
    }

    fn base(&self) -> &Arc<str> {
        self.entries
            .front()
            .map_or(&self.current, |entry| entry.rooted.base())
    }

    fn push(&mut self, entry: HistoryEntry, settings: &HistorySettings) {
        if let Some(window) = settings.merge_window_ms
            && let Some(last) = self.entries.back_mut()
            && entry.timestamp_ms.saturating_sub(last.timestamp_ms) <= window
            && touches_output(last.rooted.edit(), entry.rooted.edit())
            && let Ok(merged) = last.rooted.compose(&entry.rooted)
        {
            self.current = Arc::clone(merged.result());
            if merged.is_empty() {
                self.entries.pop_back();
            } else {
                last.rooted = merged;
                last.timestamp_ms = entry.timestamp_ms;
            }
            return;
        }
        self.current = Arc::clone(entry.rooted.result());
        self.entries.push_back(entry);
    }

    /// Drop the oldest entries until at most `max` remain.
    fn enforce_bound(&mut self, max: usize) -> usize {
        let mut evicted = 0;
        while self.entries.len() > max {
            self.entries.pop_front();
            evicted += 1;
        }
        debug_assert!(
            self.entries
                .iter()
                .zip(self.entries.iter().skip(1))
                .all(|(a, b)| a.rooted.result() == b.rooted.base())
        );
        evicted
    }

    fn reset(&mut self, document: &Document, activity: u64) {
        self.language_id = document.language_id().to_string();
        self.entries.clear();
        self.current = Arc::clone(document.text());
        self.last_activity = activity;
    }
}

/// Whether `next` touches text produced by `previous`.
fn touches_output(previous: &Edit, next: &Edit) -> bool {
    let produced = previous.new_ranges();
    next.replacements().iter().any(|r| {
        produced
            .iter()
            .any(|range| range.intersects_or_touches(&r.range))
    })
}

/// Tracks recent edits of every open document.
pub struct HistoryTracker {
    documents: DashMap<DocumentId, DocumentEditQueue>,
    settings: ArcSwap<HistorySettings>,
    activity: AtomicU64,
}

impl std::fmt::Debug for HistoryTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryTracker")
            .field("documents", &self.documents.len())
            .field("settings", &self.settings.load())
            .finish()
    }
}

impl HistoryTracker {
    pub fn new(settings: HistorySettings) -> Self {
        Self {
            documents: DashMap::new(),
            settings: ArcSwap::new(Arc::new(settings)),
            activity: AtomicU64::new(0),
        }
    }

    /// Create a tracker subscribed to `workspace`, seeded with documents
    /// already open.
    pub fn attach(workspace: &ObservableWorkspace, settings: HistorySettings) -> Arc<Self> {
        let tracker = Arc::new(Self::new(settings));
        workspace.subscribe(tracker.clone());
        for id in workspace.document_ids() {
            if let Some(document) = workspace.get(&id) {
                let activity = tracker.next_activity();
                tracker
                    .documents
                    .entry(id)
                    .or_insert_with(|| DocumentEditQueue::new(&document, activity));
            }
        }
        tracker
    }

    pub fn settings(&self) -> Arc<HistorySettings> {
        self.settings.load_full()
    }

    /// Replace the settings. A lower bound applies on the next recorded edit.
    pub fn update_settings(&self, settings: HistorySettings) {
        self.settings.store(Arc::new(settings));
    }

    fn next_activity(&self) -> u64 {
        self.activity.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_tracked(&self, id: &DocumentId) -> bool {
        self.documents.contains_key(id)
    }

    pub fn tracked_documents(&self) -> Vec<DocumentId> {
        let mut ids: Vec<_> = self.documents.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Retained edits of a document, oldest first.
    pub fn get_history(&self, id: &DocumentId) -> Vec<RootedEdit> {
        self.documents
            .get(id)
            .map(|queue| queue.entries.iter().map(|e| e.rooted.clone()).collect())
            .unwrap_or_default()
    }

    /// Line diffs of the retained edits, oldest first.
    pub fn render_history(&self, id: &DocumentId) -> String {
        render_history(&self.get_history(id))
    }

    /// Fold a document's retained edits into one edit from the retained base.
    pub fn document_history(&self, id: &DocumentId) -> Option<DocumentHistory> {
        let queue = self.documents.get(id)?;
        let composed_edit = queue
            .entries
            .iter()
            .fold(Edit::empty(), |acc, entry| acc.compose(entry.rooted.edit()));
        Some(DocumentHistory {
            doc_id: id.clone(),
            language_id: queue.language_id.clone(),
            base: Arc::clone(queue.base()),
            composed_edit,
            current: Arc::clone(&queue.current),
            edit_count: queue.entries.len(),
            last_activity: queue.last_activity,
        })
    }

    pub fn document_histories(&self) -> Vec<DocumentHistory> {
        self.tracked_documents()
            .iter()
            .filter_map(|id| self.document_history(id))
            .collect()
    }

    fn on_opened(&self, document: &Document) {
        let activity = self.next_activity();
        self.documents
            .insert(document.id().clone(), DocumentEditQueue::new(document, activity));
    }

    fn on_content_set(&self, document: &Document) {
        let activity = self.next_activity();
        self.documents
            .entry(document.id().clone())
            .and_modify(|queue| queue.reset(document, activity))
            .or_insert_with(|| DocumentEditQueue::new(document, activity));
        log::debug!(
            target: "tsugi::history",
            "Reset history of {} at version {}",
            document.id(),
            document.version()
        );
    }

    fn on_changed(&self, change: &DocumentChange) {
        if change.old_text == change.new_text {
            log::trace!(
                target: "tsugi::history",
                "Ignoring no-op edit of {} at version {}",
                change.id,
                change.version
            );
            return;
        }
        let settings = self.settings.load();
        let activity = self.next_activity();
        let mut queue = self.documents.entry(change.id.clone()).or_insert_with(|| {
            DocumentEditQueue {
                language_id: change.language_id.clone(),
                entries: VecDeque::new(),
                current: Arc::clone(&change.old_text),
                last_activity: activity,
            }
        });
        if queue.current != change.old_text {
            log::warn!(
                target: "tsugi::history",
                "History of {} is out of sync at version {}; restarting from the edited text",
                change.id,
                change.version
            );
            queue.entries.clear();
        }
        let rooted = RootedEdit::from_parts(
            Arc::clone(&change.old_text),
            change.edit.clone(),
            Arc::clone(&change.new_text),
        );
        queue.push(
            HistoryEntry {
                rooted,
                timestamp_ms: change.timestamp_ms,
            },
            &settings,
        );
        queue.last_activity = activity;
        let evicted = queue.enforce_bound(settings.max_history_size);
        if evicted > 0 {
            log::trace!(
                target: "tsugi::history",
                "Evicted {} entries of {}; base re-anchored",
                evicted,
                change.id
            );
        }
    }

    fn on_closed(&self, id: &DocumentId) {
        if self.documents.remove(id).is_some() {
            log::debug!(target: "tsugi::history", "Dropped history of {}", id);
        }
    }
}

impl WorkspaceObserver for HistoryTracker {
    fn on_event(&self, event: &WorkspaceEvent) {
        match event {
            WorkspaceEvent::Opened(document) => self.on_opened(document),
            WorkspaceEvent::ContentSet(document) => self.on_content_set(document),
            WorkspaceEvent::Changed(change) => self.on_changed(change),
            WorkspaceEvent::Closed(id) => self.on_closed(id),
            WorkspaceEvent::SelectionChanged { .. } => {}
        }
    }
}
