//! Observable workspace model.
//!
//! The workspace owns the live text of every open document. Every mutation
//! bumps the document version by one and is delivered to observers before the
//! mutating call returns. Mutation and notification happen under one lock, so
//! observers see each edit exactly once and in application order.

mod document;
mod events;

pub use document::{Document, DocumentId};
pub use events::{DocumentChange, SubscriptionId, WorkspaceEvent, WorkspaceObserver};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{LockResultExt, NesError, NesResult};
use crate::text::{Bias, Edit, OffsetRange};

/// Milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Default)]
struct WorkspaceState {
    documents: HashMap<DocumentId, Document>,
    observers: Vec<(SubscriptionId, Arc<dyn WorkspaceObserver>)>,
    next_subscription: u64,
}

impl WorkspaceState {
    fn document_mut(&mut self, id: &DocumentId) -> NesResult<&mut Document> {
        self.documents
            .get_mut(id)
            .ok_or_else(|| NesError::document_not_found(id))
    }

    fn notify(&self, event: &WorkspaceEvent) {
        for (_, observer) in &self.observers {
            observer.on_event(event);
        }
    }
}

#[derive(Default)]
pub struct ObservableWorkspace {
    state: Mutex<WorkspaceState>,
}

impl std::fmt::Debug for ObservableWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableWorkspace")
            .field("documents", &self.document_ids())
            .finish()
    }
}

impl ObservableWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn WorkspaceObserver>) -> SubscriptionId {
        let mut state = self.state.lock().recover_poison("workspace.subscribe");
        let id = SubscriptionId(state.next_subscription);
        state.next_subscription += 1;
        state.observers.push((id, observer));
        id
    }

    pub fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        let mut state = self.state.lock().recover_poison("workspace.unsubscribe");
        let before = state.observers.len();
        state.observers.retain(|(id, _)| *id != subscription);
        state.observers.len() != before
    }

    pub fn add_document(
        &self,
        id: impl Into<DocumentId>,
        text: impl Into<Arc<str>>,
        language_id: impl Into<String>,
    ) -> NesResult<Document> {
        let id = id.into();
        let mut state = self.state.lock().recover_poison("workspace.add_document");
        if state.documents.contains_key(&id) {
            return Err(NesError::document_already_open(&id));
        }
        let document = Document::new(id.clone(), text.into(), language_id.into());
        state.documents.insert(id.clone(), document.clone());
        log::debug!(target: "tsugi::workspace", "Opened {}", id);
        state.notify(&WorkspaceEvent::Opened(document.clone()));
        Ok(document)
    }

    pub fn remove_document(&self, id: &DocumentId) -> NesResult<Document> {
        let mut state = self.state.lock().recover_poison("workspace.remove_document");
        let document = state
            .documents
            .remove(id)
            .ok_or_else(|| NesError::document_not_found(id))?;
        log::debug!(target: "tsugi::workspace", "Closed {}", id);
        state.notify(&WorkspaceEvent::Closed(id.clone()));
        Ok(document)
    }

    /// Replace the whole text. Observers treat this as a new starting point.
    pub fn set_content(&self, id: &DocumentId, text: impl Into<Arc<str>>) -> NesResult<u64> {
        let text = text.into();
        let mut state = self.state.lock().recover_poison("workspace.set_content");
        let document = state.document_mut(id)?;
        let selection = document
            .selection()
            .iter()
            .copied()
            .filter(|range| fits(&text, *range))
            .collect();
        document.replace_text(text);
        document.set_selection(selection);
        let snapshot = document.clone();
        log::debug!(
            target: "tsugi::workspace",
            "Set content of {} at version {}",
            id,
            snapshot.version()
        );
        state.notify(&WorkspaceEvent::ContentSet(snapshot.clone()));
        Ok(snapshot.version())
    }

    /// Apply `edit` to the document's current text and return the new version.
    pub fn apply_edit(&self, id: &DocumentId, edit: &Edit) -> NesResult<u64> {
        self.apply_edit_at(id, edit, now_ms())
    }

    /// Like [`apply_edit`](Self::apply_edit) with an explicit timestamp.
    pub fn apply_edit_at(&self, id: &DocumentId, edit: &Edit, timestamp_ms: u64) -> NesResult<u64> {
        let mut state = self.state.lock().recover_poison("workspace.apply_edit");
        let document = state.document_mut(id)?;
        let old_text = Arc::clone(document.text());
        let new_text: Arc<str> = edit.apply(&old_text)?.into();
        let selection = document
            .selection()
            .iter()
            .map(|range| map_range(edit, *range))
            .collect();
        document.replace_text(Arc::clone(&new_text));
        document.set_selection(selection);
        let change = DocumentChange {
            id: id.clone(),
            version: document.version(),
            language_id: document.language_id().to_string(),
            old_text,
            new_text,
            edit: edit.clone(),
            timestamp_ms,
        };
        log::trace!(
            target: "tsugi::workspace",
            "Applied {} to {} -> version {}",
            edit,
            id,
            change.version
        );
        let version = change.version;
        state.notify(&WorkspaceEvent::Changed(change));
        Ok(version)
    }

    pub fn set_selection(&self, id: &DocumentId, selection: Vec<OffsetRange>) -> NesResult<()> {
        let mut state = self.state.lock().recover_poison("workspace.set_selection");
        let document = state.document_mut(id)?;
        if let Some(bad) = selection.iter().find(|range| !fits(document.text(), **range)) {
            return Err(NesError::invalid_selection(
                id,
                format!("{} does not fit text of length {}", bad, document.text().len()),
            ));
        }
        document.set_selection(selection.clone());
        let version = document.version();
        state.notify(&WorkspaceEvent::SelectionChanged {
            id: id.clone(),
            version,
            selection,
        });
        Ok(())
    }

    pub fn get(&self, id: &DocumentId) -> Option<Document> {
        let state = self.state.lock().recover_poison("workspace.get");
        state.documents.get(id).cloned()
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        let state = self.state.lock().recover_poison("workspace.contains");
        state.documents.contains_key(id)
    }

    /// Open document ids in sorted order.
    pub fn document_ids(&self) -> Vec<DocumentId> {
        let state = self.state.lock().recover_poison("workspace.document_ids");
        let mut ids: Vec<_> = state.documents.keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn fits(text: &str, range: OffsetRange) -> bool {
    range.end <= text.len() && text.is_char_boundary(range.start) && text.is_char_boundary(range.end)
}

/// Carry a selection range across an edit. Offsets inside a replaced range
/// land at the end of the replacement.
fn map_range(edit: &Edit, range: OffsetRange) -> OffsetRange {
    let map = |offset: usize| {
        edit.map_offset(offset, Bias::Right).unwrap_or_else(|| {
            edit.replacements()
                .iter()
                .zip(edit.new_ranges())
                .find(|(r, _)| r.range.start < offset && offset < r.range.end)
                .map_or(offset, |(_, new_range)| new_range.end)
        })
    };
    OffsetRange::new(map(range.start), map(range.end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::Replacement;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Recorder {
        events: StdMutex<Vec<String>>,
    }

    impl WorkspaceObserver for Recorder {
        fn on_event(&self, event: &WorkspaceEvent) {
            let line = match event {
                WorkspaceEvent::Opened(doc) => format!("opened {}", doc.id()),
                WorkspaceEvent::ContentSet(doc) => format!("set {} v{}", doc.id(), doc.version()),
                WorkspaceEvent::Changed(change) => {
                    format!("changed {} v{} {}", change.id, change.version, change.new_text)
                }
                WorkspaceEvent::SelectionChanged { id, .. } => format!("selection {}", id),
                WorkspaceEvent::Closed(id) => format!("closed {}", id),
            };
            self.events.lock().unwrap().push(line);
        }
    }

    fn workspace_with_recorder() -> (ObservableWorkspace, Arc<Recorder>, DocumentId) {
        let workspace = ObservableWorkspace::new();
        let recorder = Arc::new(Recorder::default());
        workspace.subscribe(recorder.clone());
        let id = DocumentId::new("a.txt");
        workspace.add_document(id.clone(), "hemmo", "plaintext").unwrap();
        (workspace, recorder, id)
    }

    #[test]
    fn test_apply_edit_bumps_version_and_notifies_in_order() {
        let (workspace, recorder, id) = workspace_with_recorder();
        let v1 = workspace
            .apply_edit(&id, &Edit::single(Replacement::new(2, 4, "ll")))
            .unwrap();
        let v2 = workspace
            .apply_edit(&id, &Edit::single(Replacement::insert(5, "!")))
            .unwrap();
        assert_eq!((v1, v2), (1, 2));
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec!["opened a.txt", "changed a.txt v1 hello", "changed a.txt v2 hello!"]
        );
    }

    #[test]
    fn test_apply_edit_on_unknown_document_fails() {
        let workspace = ObservableWorkspace::new();
        let err = workspace
            .apply_edit(&DocumentId::new("missing.rs"), &Edit::empty())
            .unwrap_err();
        assert!(matches!(err, NesError::DocumentNotFound { .. }));
    }

    #[test]
    fn test_invalid_edit_leaves_document_untouched() {
        let (workspace, recorder, id) = workspace_with_recorder();
        assert!(workspace
            .apply_edit(&id, &Edit::single(Replacement::new(3, 10, "")))
            .is_err());
        let doc = workspace.get(&id).unwrap();
        assert_eq!(doc.version(), 0);
        assert_eq!(recorder.events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_add_document_twice_fails() {
        let (workspace, _, id) = workspace_with_recorder();
        assert!(matches!(
            workspace.add_document(id, "x", "plaintext"),
            Err(NesError::DocumentAlreadyOpen { .. })
        ));
    }

    #[test]
    fn test_selection_follows_typing() {
        let (workspace, _, id) = workspace_with_recorder();
        workspace
            .set_selection(&id, vec![OffsetRange::empty(5)])
            .unwrap();
        workspace
            .apply_edit(&id, &Edit::single(Replacement::insert(5, " world")))
            .unwrap();
        assert_eq!(
            workspace.get(&id).unwrap().selection(),
            &[OffsetRange::empty(11)]
        );
    }

    #[test]
    fn test_selection_must_fit_text() {
        let (workspace, _, id) = workspace_with_recorder();
        let err = workspace
            .set_selection(&id, vec![OffsetRange::new(2, 9)])
            .unwrap_err();
        assert!(matches!(err, NesError::InvalidSelection { .. }));
    }

    #[test]
    fn test_unsubscribed_observer_stops_receiving() {
        let workspace = ObservableWorkspace::new();
        let recorder = Arc::new(Recorder::default());
        let subscription = workspace.subscribe(recorder.clone());
        assert!(workspace.unsubscribe(subscription));
        workspace.add_document("b.txt", "", "plaintext").unwrap();
        assert!(recorder.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_remove_document_notifies_close() {
        let (workspace, recorder, id) = workspace_with_recorder();
        workspace.remove_document(&id).unwrap();
        assert!(!workspace.contains(&id));
        assert_eq!(recorder.events.lock().unwrap().last().unwrap(), "closed a.txt");
    }
}
