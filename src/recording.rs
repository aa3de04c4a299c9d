//! Replay of JSON editing recordings.
//!
//! A recording is `{ "log": [entry, ...] }` where each entry carries a `kind`:
//!
//! - `documentEncountered { id, time, relativePath }` names a document.
//! - `setContent { id, time, v, content }` opens it or replaces its text.
//! - `changed { id, time, v, edit }` applies an edit given as
//!   `[[start, end, text], ...]`.
//!
//! Entries of other kinds are skipped. The recorded `v` is informational;
//! the workspace assigns its own versions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::HistorySettings;
use crate::error::{NesError, NesResult};
use crate::history::HistoryTracker;
use crate::text::Edit;
use crate::workspace::{DocumentId, ObservableWorkspace};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    pub log: Vec<RecordingEntry>,
}

impl Recording {
    pub fn from_json(json: &str) -> NesResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> NesResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RecordingEntry {
    DocumentEncountered {
        id: u64,
        time: u64,
        #[serde(rename = "relativePath")]
        relative_path: String,
    },
    SetContent {
        id: u64,
        time: u64,
        #[serde(default)]
        v: Option<u64>,
        content: String,
    },
    Changed {
        id: u64,
        time: u64,
        #[serde(default)]
        v: Option<u64>,
        edit: Edit,
    },
    #[serde(other)]
    Other,
}

/// Language id for a file path, derived from its extension.
pub fn language_id_for_path(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match extension.as_str() {
        "rs" => "rust",
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "typescriptreact",
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "javascriptreact",
        "py" => "python",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "lua" => "lua",
        "md" | "markdown" => "markdown",
        "json" => "json",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "html" | "htm" => "html",
        "css" => "css",
        "sh" | "bash" => "shellscript",
        _ => "plaintext",
    }
}

/// Drives a workspace, and the history tracker attached to it, through a
/// recording.
pub struct RecordingReplayer {
    workspace: Arc<ObservableWorkspace>,
    history: Arc<HistoryTracker>,
    documents: HashMap<u64, DocumentId>,
}

impl RecordingReplayer {
    /// Replay into a fresh workspace with a tracker using `settings`.
    pub fn new(settings: HistorySettings) -> Self {
        let workspace = Arc::new(ObservableWorkspace::new());
        let history = HistoryTracker::attach(&workspace, settings);
        Self::with_workspace(workspace, history)
    }

    pub fn with_workspace(workspace: Arc<ObservableWorkspace>, history: Arc<HistoryTracker>) -> Self {
        Self {
            workspace,
            history,
            documents: HashMap::new(),
        }
    }

    pub fn workspace(&self) -> &Arc<ObservableWorkspace> {
        &self.workspace
    }

    pub fn history(&self) -> &Arc<HistoryTracker> {
        &self.history
    }

    /// Workspace id of a recording document id.
    pub fn document_id(&self, recording_id: u64) -> Option<&DocumentId> {
        self.documents.get(&recording_id)
    }

    pub fn replay(&mut self, recording: &Recording) -> NesResult<()> {
        for (index, entry) in recording.log.iter().enumerate() {
            self.step(entry).map_err(|err| match err {
                NesError::Recording { message } => {
                    NesError::recording(format!("entry {index}: {message}"))
                }
                other => other,
            })?;
        }
        log::debug!(
            target: "tsugi::recording",
            "Replayed {} entries over {} documents",
            recording.log.len(),
            self.documents.len()
        );
        Ok(())
    }

    pub fn step(&mut self, entry: &RecordingEntry) -> NesResult<()> {
        match entry {
            RecordingEntry::DocumentEncountered {
                id, relative_path, ..
            } => {
                self.documents
                    .insert(*id, DocumentId::from_path(relative_path));
            }
            RecordingEntry::SetContent { id, content, .. } => {
                let doc_id = self.resolve(*id)?.clone();
                if self.workspace.contains(&doc_id) {
                    self.workspace.set_content(&doc_id, content.as_str())?;
                } else {
                    let language_id = language_id_for_path(doc_id.as_str());
                    self.workspace
                        .add_document(doc_id, content.as_str(), language_id)?;
                }
            }
            RecordingEntry::Changed { id, time, edit, .. } => {
                let doc_id = self.resolve(*id)?;
                if !self.workspace.contains(doc_id) {
                    return Err(NesError::recording(format!(
                        "change to {doc_id} before its content was set"
                    )));
                }
                self.workspace.apply_edit_at(doc_id, edit, *time)?;
            }
            RecordingEntry::Other => {
                log::trace!(target: "tsugi::recording", "Skipping unknown entry");
            }
        }
        Ok(())
    }

    fn resolve(&self, recording_id: u64) -> NesResult<&DocumentId> {
        self.documents.get(&recording_id).ok_or_else(|| {
            NesError::recording(format!("document {recording_id} was never encountered"))
        })
    }
}
