//! Workspace setup shared by integration tests.

use std::sync::Arc;
use tsugi::config::{HistorySettings, NesSettings};
use tsugi::history::HistoryTracker;
use tsugi::orchestrator::NextEditOrchestrator;
use tsugi::text::OffsetRange;
use tsugi::workspace::{DocumentId, ObservableWorkspace};
use tsugi::StatelessNextEditProvider;

pub struct Fixture {
    pub workspace: Arc<ObservableWorkspace>,
    pub history: Arc<HistoryTracker>,
    pub orchestrator: Arc<NextEditOrchestrator>,
}

impl Fixture {
    pub fn new(provider: Arc<dyn StatelessNextEditProvider>) -> Self {
        Self::with_settings(provider, NesSettings::default())
    }

    pub fn with_settings(provider: Arc<dyn StatelessNextEditProvider>, settings: NesSettings) -> Self {
        let workspace = Arc::new(ObservableWorkspace::new());
        let history = HistoryTracker::attach(&workspace, settings.history.clone());
        let orchestrator = Arc::new(NextEditOrchestrator::new(
            Arc::clone(&workspace),
            Arc::clone(&history),
            provider,
            settings,
        ));
        Self {
            workspace,
            history,
            orchestrator,
        }
    }

    /// Open a document with the caret at `caret`.
    pub fn open(&self, path: &str, text: &str, language_id: &str, caret: usize) -> DocumentId {
        let id = DocumentId::new(path);
        self.workspace
            .add_document(id.clone(), text, language_id)
            .expect("document opens");
        self.workspace
            .set_selection(&id, vec![OffsetRange::empty(caret)])
            .expect("caret fits");
        id
    }
}

pub fn unbounded_history() -> HistorySettings {
    HistorySettings::unbounded()
}
