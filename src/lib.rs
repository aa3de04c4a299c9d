//! Next-edit suggestions from recent editing history.
//!
//! An [`ObservableWorkspace`] holds live document text. A [`HistoryTracker`]
//! observes it and keeps a bounded chain of recent edits per document. The
//! [`NextEditOrchestrator`] snapshots that history into a [`HistoryContext`],
//! asks a stateless backend for the next edit, and validates, caches and
//! returns the result.

pub mod backend;
pub mod config;
pub mod error;
pub mod history;
pub mod log_context;
pub mod orchestrator;
pub mod recording;
pub mod text;
pub mod workspace;

pub use backend::{
    EditSink, NoNextEditReason, SeededLineEditProvider, StatelessNextEditProvider,
    StatelessNextEditRequest, StatelessNextEditResult,
};
pub use config::NesSettings;
pub use error::{NesError, NesResult};
pub use history::{HistoryContext, HistoryContextBuilder, HistoryTracker};
pub use log_context::{NextEditLogContext, PickedNesType};
pub use orchestrator::{
    NextEditOrchestrator, NextEditOutcome, NextEditResponse, NextEditResult, NoSuggestionCause,
    ShowPreference,
};
pub use recording::{Recording, RecordingReplayer};
pub use text::{Edit, LineEdit, LineReplacement, OffsetRange, Replacement, RootedEdit};
pub use workspace::{Document, DocumentId, ObservableWorkspace, WorkspaceEvent, WorkspaceObserver};
