//! Stateless next-edit backend protocol.
//!
//! A backend receives the full request context on every call and keeps no
//! session state. It streams zero or more candidates through an [`EditSink`]
//! before its future resolves. Cancellation is cooperative: backends watch the
//! token and the orchestrator discards anything that arrives too late. The
//! returned future owns its state; the orchestrator spawns it onto the tokio
//! runtime and lets it finish after taking its answer.

pub mod seeded;

pub use seeded::SeededLineEditProvider;

use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::history::HistoryContext;
use crate::log_context::NextEditLogContext;
use crate::text::{Edit, OffsetRange};
use crate::workspace::DocumentId;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Everything a backend may look at for one request. Immutable once built.
#[derive(Debug, Clone)]
pub struct StatelessNextEditRequest {
    pub request_id: u64,
    pub documents: Arc<HistoryContext>,
    pub active_document_id: DocumentId,
    pub language_id: String,
    /// Text of the active document at `version`; pushed edits are offsets into it.
    pub active_text: Arc<str>,
    pub version: u64,
    pub selection: Vec<OffsetRange>,
}

impl StatelessNextEditRequest {
    /// Compact description for logs.
    pub fn summary(&self) -> serde_json::Value {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Summary<'a> {
            request_id: u64,
            active_document_id: &'a DocumentId,
            version: u64,
            selection: &'a [OffsetRange],
            documents: Vec<&'a str>,
            history_checksum: u64,
        }
        serde_json::to_value(Summary {
            request_id: self.request_id,
            active_document_id: &self.active_document_id,
            version: self.version,
            selection: &self.selection,
            documents: self
                .documents
                .documents()
                .iter()
                .map(|d| d.doc_id.as_str())
                .collect(),
            history_checksum: self.documents.checksum(),
        })
        .unwrap_or(serde_json::Value::Null)
    }
}

/// One candidate edit over the request's `active_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushedEdit {
    pub edit: Edit,
}

/// Why a backend stopped without (further) candidates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NoNextEditReason {
    #[error("no suggestions")]
    NoSuggestions,
    #[error("cancelled")]
    Cancelled,
    #[error("backend error: {0}")]
    Error(String),
}

pub type PushResult = Result<PushedEdit, NoNextEditReason>;

/// Sending half of a backend's candidate stream.
#[derive(Debug, Clone)]
pub struct EditSink {
    sender: mpsc::UnboundedSender<PushResult>,
}

impl EditSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PushResult>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Returns false once nobody listens anymore.
    pub fn push(&self, result: PushResult) -> bool {
        self.sender.send(result).is_ok()
    }

    pub fn push_edit(&self, edit: Edit) -> bool {
        self.push(Ok(PushedEdit { edit }))
    }

    pub fn push_reason(&self, reason: NoNextEditReason) -> bool {
        self.push(Err(reason))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Telemetry attached to a streamed response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamingTelemetry {
    pub model: Option<String>,
    pub prompt: Option<String>,
    pub response: Option<String>,
}

impl StreamingTelemetry {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatelessNextEditResult {
    /// Candidates were (or may have been) streamed.
    Streaming(StreamingTelemetry),
    /// Nothing to act on; resolved without streaming.
    Empty,
}

pub trait StatelessNextEditProvider: Send + Sync {
    fn id(&self) -> &str;

    /// Start one request. The future may outlive the call that started it,
    /// so it must not borrow the provider.
    fn provide_next_edit(
        &self,
        request: Arc<StatelessNextEditRequest>,
        sink: EditSink,
        log_context: Arc<NextEditLogContext>,
        cancellation: CancellationToken,
    ) -> BoxFuture<'static, StatelessNextEditResult>;
}
