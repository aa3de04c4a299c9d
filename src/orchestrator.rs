//! Next-edit orchestration.
//!
//! ## Request lifecycle
//!
//! ```text
//! Created -> HistoryBuilt -> Dispatched -> first push -> Resolved   -> Cached
//!                                       \-> Cancelled | Errored    -> Discarded
//! ```
//!
//! - At most one request per document is in flight; a new request cancels
//!   the one it supersedes. So does a cache hit.
//! - A request whose fingerprint matches the last completed request for the
//!   document is answered from cache without calling the backend.
//! - The backend runs as a spawned task until it resolves on its own, even
//!   after its first push was taken. Must be called within a tokio runtime.
//! - A candidate is validated against the live text before it is returned.
//!   If the user typed meanwhile it is rebased or dropped as stale.
//! - Only the active request of a document writes to the cache, and only
//!   while the document is still at the request's version.

pub mod cache;
pub mod diagnostics;
pub mod fingerprint;
pub mod request_tracker;
pub mod staleness;

pub use cache::{CachedNextEdit, NextEditCache};
pub use diagnostics::{DiagnosticsEdit, DiagnosticsEditSource, pick_edit};
pub use fingerprint::Fingerprint;
pub use request_tracker::{RequestId, RequestTracker};
pub use staleness::{RebaseOutcome, rebase};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

use crate::backend::{
    EditSink, NoNextEditReason, PushResult, StatelessNextEditProvider, StatelessNextEditRequest,
    StatelessNextEditResult,
};
use crate::config::NesSettings;
use crate::error::{NesError, NesResult};
use crate::history::{HistoryContextBuilder, HistoryTracker};
use crate::log_context::{NextEditLogContext, PickedNesType};
use crate::text::{Edit, LineIndex, Replacement};
use crate::workspace::{
    Document, DocumentId, ObservableWorkspace, SubscriptionId, WorkspaceEvent, WorkspaceObserver,
};

/// Where the editor should present a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowPreference {
    /// The edit is on or next to the caret line.
    AtCursor,
    /// The edit is elsewhere in the document; the editor should offer a jump.
    Elsewhere,
}

/// A suggestion ready to be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextEditResult {
    pub request_id: RequestId,
    /// Offsets into `document_before_edits`.
    pub edit: Replacement,
    /// Live text the edit was validated against.
    pub document_before_edits: Arc<str>,
    pub show_preference: ShowPreference,
    pub picked: PickedNesType,
}

impl NextEditResult {
    /// Text after accepting the suggestion.
    pub fn apply(&self) -> NesResult<String> {
        self.edit.apply(&self.document_before_edits)
    }
}

/// Why a request produced no suggestion. None of these is an error to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoSuggestionCause {
    NoSuggestions,
    Cancelled,
    BackendError(String),
    StaleEdit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextEditOutcome {
    Suggestion(NextEditResult),
    NoSuggestion(NoSuggestionCause),
}

impl NextEditOutcome {
    fn is_cacheable(&self) -> bool {
        matches!(
            self,
            NextEditOutcome::Suggestion(_)
                | NextEditOutcome::NoSuggestion(NoSuggestionCause::NoSuggestions)
        )
    }
}

#[derive(Debug, Clone)]
pub struct NextEditResponse {
    pub request_id: RequestId,
    pub outcome: NextEditOutcome,
    pub log_context: Arc<NextEditLogContext>,
}

impl NextEditResponse {
    pub fn suggestion(&self) -> Option<&NextEditResult> {
        match &self.outcome {
            NextEditOutcome::Suggestion(result) => Some(result),
            NextEditOutcome::NoSuggestion(_) => None,
        }
    }

    pub fn is_cached_result(&self) -> bool {
        self.log_context.is_cached_result()
    }
}

/// What the backend's first push amounted to.
enum Dispatched {
    Edit(Edit),
    NoSuggestions,
    Cancelled,
    Error(String),
}

enum FirstPush {
    Cancelled,
    Push(PushResult),
    Exhausted,
}

/// Keeps the cache and in-flight requests in step with the workspace.
struct CacheInvalidator {
    cache: NextEditCache,
    requests: RequestTracker,
}

impl WorkspaceObserver for CacheInvalidator {
    fn on_event(&self, event: &WorkspaceEvent) {
        match event {
            WorkspaceEvent::Changed(change) => {
                self.cache.invalidate_older_than(&change.id, change.version);
            }
            WorkspaceEvent::ContentSet(document) => {
                self.cache
                    .invalidate_older_than(document.id(), document.version());
            }
            WorkspaceEvent::Closed(id) => {
                self.cache.remove(id);
                self.requests.cancel_all_for_document(id);
            }
            WorkspaceEvent::Opened(_) | WorkspaceEvent::SelectionChanged { .. } => {}
        }
    }
}

pub struct NextEditOrchestrator {
    workspace: Arc<ObservableWorkspace>,
    history: Arc<HistoryTracker>,
    provider: Arc<dyn StatelessNextEditProvider>,
    diagnostics: Option<Arc<dyn DiagnosticsEditSource>>,
    settings: NesSettings,
    cache: NextEditCache,
    requests: RequestTracker,
    next_request_id: AtomicU64,
    subscription: SubscriptionId,
}

impl std::fmt::Debug for NextEditOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NextEditOrchestrator")
            .field("provider", &self.provider.id())
            .field("cache", &self.cache.len())
            .field("settings", &self.settings)
            .finish()
    }
}

impl NextEditOrchestrator {
    pub fn new(
        workspace: Arc<ObservableWorkspace>,
        history: Arc<HistoryTracker>,
        provider: Arc<dyn StatelessNextEditProvider>,
        settings: NesSettings,
    ) -> Self {
        let cache = NextEditCache::new();
        let requests = RequestTracker::new();
        let subscription = workspace.subscribe(Arc::new(CacheInvalidator {
            cache: cache.clone(),
            requests: requests.clone(),
        }));
        Self {
            workspace,
            history,
            provider,
            diagnostics: None,
            settings,
            cache,
            requests,
            next_request_id: AtomicU64::new(0),
            subscription,
        }
    }

    pub fn with_diagnostics_source(mut self, source: Arc<dyn DiagnosticsEditSource>) -> Self {
        self.diagnostics = Some(source);
        self
    }

    pub fn cache(&self) -> &NextEditCache {
        &self.cache
    }

    /// The request currently in flight for a document.
    pub fn in_flight_request(&self, id: &DocumentId) -> Option<RequestId> {
        self.requests.active_request(id)
    }

    fn next_request_id(&self) -> RequestId {
        self.next_request_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Ask for the next edit of a document.
    ///
    /// Fails only on contract violations: an unknown document or one without
    /// a selection. Cancellation, declined and failed backend calls and stale
    /// candidates are reported through [`NextEditOutcome::NoSuggestion`].
    pub async fn get_next_edit(
        &self,
        id: &DocumentId,
        cancellation: &CancellationToken,
    ) -> NesResult<NextEditResponse> {
        let document = self
            .workspace
            .get(id)
            .ok_or_else(|| NesError::document_not_found(id))?;
        if document.selection().is_empty() {
            return Err(NesError::no_selection(id));
        }

        let context = Arc::new(
            HistoryContextBuilder::new(&self.history)
                .max_documents(self.settings.context.max_documents)
                .active_document(id.clone())
                .build(),
        );
        let fingerprint = Fingerprint::new(
            id.clone(),
            document.version(),
            document.selection().to_vec(),
            context.checksum(),
        );
        let request_id = self.next_request_id();

        if self.settings.orchestrator.cache_enabled
            && let Some(cached) = self.cache.get_if_valid(&fingerprint)
        {
            log::debug!(
                target: "tsugi::cache",
                "Request {} for {} answered from cache ({:016x})",
                request_id,
                id,
                fingerprint.digest()
            );
            if let Some(superseded) = self.requests.active_request(id) {
                log::debug!(
                    target: "tsugi::orchestrator",
                    "Cache hit for {} supersedes request {}",
                    id,
                    superseded
                );
                self.requests.cancel_all_for_document(id);
            }
            return Ok(NextEditResponse {
                request_id,
                outcome: cached.outcome,
                log_context: Arc::new(cached.log_context.for_cache_hit(request_id)),
            });
        }

        let token = self
            .requests
            .start_request(id, request_id, cancellation.child_token());
        let log_context = Arc::new(NextEditLogContext::new(request_id, self.provider.id()));
        let request = Arc::new(StatelessNextEditRequest {
            request_id,
            documents: context,
            active_document_id: id.clone(),
            language_id: document.language_id().to_string(),
            active_text: Arc::clone(document.text()),
            version: document.version(),
            selection: document.selection().to_vec(),
        });
        log_context.set_request_input(id.as_str(), document.version(), request.summary());
        log::debug!(
            target: "tsugi::orchestrator",
            "Dispatching request {} for {} at version {}",
            request_id,
            id,
            document.version()
        );

        let outcome = self
            .resolve(&document, fingerprint, request, &log_context, &token)
            .await;
        self.requests.finish_request(id, request_id);
        log_context.record_timing("total");
        Ok(NextEditResponse {
            request_id,
            outcome,
            log_context,
        })
    }

    async fn resolve(
        &self,
        document: &Document,
        fingerprint: Fingerprint,
        request: Arc<StatelessNextEditRequest>,
        log_context: &Arc<NextEditLogContext>,
        token: &CancellationToken,
    ) -> NextEditOutcome {
        let request_id = request.request_id;
        let diagnostics = self
            .diagnostics
            .as_ref()
            .and_then(|source| source.edit_for(document));
        if let Some(fix) = &diagnostics {
            log_context.set_diagnostics_result(Some(&fix.edit));
            log_context.set_diagnostics(vec![fix.message.clone()]);
        }

        let (llm_edit, failure) = match self.dispatch(request, log_context, token).await {
            Dispatched::Edit(edit) => (Some(edit), None),
            Dispatched::NoSuggestions => (None, None),
            Dispatched::Cancelled => return self.cancelled(document.id(), request_id, log_context),
            Dispatched::Error(detail) => {
                log::warn!(
                    target: "tsugi::orchestrator",
                    "Backend {} failed for request {}: {}",
                    self.provider.id(),
                    request_id,
                    detail
                );
                log_context.set_error(detail.clone());
                (None, Some(NoSuggestionCause::BackendError(detail)))
            }
        };
        log_context.record_timing("backend");

        if token.is_cancelled() || !self.requests.is_active(document.id(), request_id) {
            return self.cancelled(document.id(), request_id, log_context);
        }

        let Some((edit, picked)) = pick_edit(
            llm_edit,
            diagnostics.as_ref(),
            self.settings.orchestrator.prefer_sufficient_diagnostics,
        ) else {
            log_context.set_result(None, None);
            let outcome =
                NextEditOutcome::NoSuggestion(failure.unwrap_or(NoSuggestionCause::NoSuggestions));
            self.store_if_current(fingerprint, &outcome, log_context, request_id);
            return outcome;
        };

        let Some(live) = self.workspace.get(document.id()) else {
            log_context.trace("document closed before the suggestion was ready");
            return NextEditOutcome::NoSuggestion(NoSuggestionCause::StaleEdit);
        };
        let edit = match rebase(&edit, document.text(), live.text()) {
            RebaseOutcome::Unchanged(edit) => edit,
            RebaseOutcome::Rebased(edit) => {
                log_context.trace(format!(
                    "rebased from version {} onto version {}",
                    document.version(),
                    live.version()
                ));
                edit
            }
            RebaseOutcome::Stale => return self.stale(&live, request_id, log_context),
        };
        let replacement = match edit.to_single_replacement(live.text()) {
            Ok(Some(replacement)) => replacement,
            Ok(None) => {
                log_context.trace("suggestion already applied by the user");
                log_context.set_result(None, Some(picked));
                return NextEditOutcome::NoSuggestion(NoSuggestionCause::NoSuggestions);
            }
            Err(_) => return self.stale(&live, request_id, log_context),
        };

        log_context.set_document_before_edits(Arc::clone(live.text()));
        log_context.set_result(Some(&replacement), Some(picked));
        let outcome = NextEditOutcome::Suggestion(NextEditResult {
            request_id,
            show_preference: show_preference(&live, &replacement),
            edit: replacement,
            document_before_edits: Arc::clone(live.text()),
            picked,
        });
        self.store_if_current(fingerprint, &outcome, log_context, request_id);
        outcome
    }

    /// Wait for the backend's first push, its end, or cancellation.
    ///
    /// The backend runs as its own task and is never aborted. Pushes after
    /// the first go nowhere. Its telemetry lands in the log context whenever
    /// it resolves.
    async fn dispatch(
        &self,
        request: Arc<StatelessNextEditRequest>,
        log_context: &Arc<NextEditLogContext>,
        token: &CancellationToken,
    ) -> Dispatched {
        let active_text = Arc::clone(&request.active_text);
        let (sink, mut receiver) = EditSink::channel();
        let provider =
            self.provider
                .provide_next_edit(request, sink, Arc::clone(log_context), token.clone());
        let telemetry_context = Arc::clone(log_context);
        let mut backend = tokio::spawn(async move {
            let result = provider.await;
            record_backend_result(&telemetry_context, &result);
        });

        let first = tokio::select! {
            biased;
            _ = token.cancelled() => FirstPush::Cancelled,
            push = receiver.recv() => match push {
                Some(push) => FirstPush::Push(push),
                None => FirstPush::Exhausted,
            },
        };

        match first {
            FirstPush::Cancelled => Dispatched::Cancelled,
            // The sink is gone; wait for the backend to resolve so its
            // telemetry is in place before answering.
            FirstPush::Exhausted => tokio::select! {
                biased;
                _ = token.cancelled() => Dispatched::Cancelled,
                joined = &mut backend => match joined {
                    Ok(()) => Dispatched::NoSuggestions,
                    Err(err) => Dispatched::Error(format!("backend task failed: {err}")),
                },
            },
            FirstPush::Push(Ok(pushed)) => {
                log_context.add_response_result(pushed.edit.to_json());
                match pushed.edit.validate(&active_text) {
                    Ok(()) => Dispatched::Edit(pushed.edit),
                    Err(err) => Dispatched::Error(format!("pushed edit does not fit: {err}")),
                }
            }
            FirstPush::Push(Err(reason)) => {
                log_context.add_response_result(reason.to_string());
                match reason {
                    NoNextEditReason::NoSuggestions => Dispatched::NoSuggestions,
                    NoNextEditReason::Cancelled => Dispatched::Cancelled,
                    NoNextEditReason::Error(detail) => Dispatched::Error(detail),
                }
            }
        }
    }

    fn cancelled(
        &self,
        id: &DocumentId,
        request_id: RequestId,
        log_context: &NextEditLogContext,
    ) -> NextEditOutcome {
        log::debug!(
            target: "tsugi::orchestrator",
            "Request {} for {} was cancelled",
            request_id,
            id
        );
        log_context.trace("cancelled");
        NextEditOutcome::NoSuggestion(NoSuggestionCause::Cancelled)
    }

    fn stale(
        &self,
        live: &Document,
        request_id: RequestId,
        log_context: &NextEditLogContext,
    ) -> NextEditOutcome {
        log::debug!(
            target: "tsugi::orchestrator",
            "Dropping stale suggestion of request {} for {} at version {}",
            request_id,
            live.id(),
            live.version()
        );
        log_context.trace("suggestion is stale");
        log_context.set_result(None, None);
        NextEditOutcome::NoSuggestion(NoSuggestionCause::StaleEdit)
    }

    fn store_if_current(
        &self,
        fingerprint: Fingerprint,
        outcome: &NextEditOutcome,
        log_context: &Arc<NextEditLogContext>,
        request_id: RequestId,
    ) {
        if !self.settings.orchestrator.cache_enabled || !outcome.is_cacheable() {
            return;
        }
        if !self.requests.is_active(&fingerprint.document_id, request_id) {
            return;
        }
        let current_version = self
            .workspace
            .get(&fingerprint.document_id)
            .map(|doc| doc.version());
        if current_version != Some(fingerprint.version) {
            return;
        }
        self.cache.store(CachedNextEdit {
            fingerprint,
            outcome: outcome.clone(),
            log_context: Arc::clone(log_context),
        });
    }
}

impl Drop for NextEditOrchestrator {
    fn drop(&mut self) {
        self.workspace.unsubscribe(self.subscription);
    }
}

fn record_backend_result(log_context: &NextEditLogContext, result: &StatelessNextEditResult) {
    match result {
        StatelessNextEditResult::Streaming(telemetry) => {
            if let Some(prompt) = &telemetry.prompt {
                log_context.set_prompt(prompt.clone());
            }
            if let Some(response) = &telemetry.response {
                log_context.set_response(response.clone());
            }
        }
        StatelessNextEditResult::Empty => {
            log_context.trace("backend resolved with an empty result");
        }
    }
}

fn show_preference(document: &Document, edit: &Replacement) -> ShowPreference {
    let index = LineIndex::new(document.text());
    let first_line = index.line_of_offset(edit.range.start);
    let last_line = index.line_of_offset(edit.range.end);
    let near_caret = document.selection().first().is_some_and(|caret| {
        let line = index.line_of_offset(caret.start);
        first_line.saturating_sub(1) <= line && line <= last_line + 1
    });
    if near_caret {
        ShowPreference::AtCursor
    } else {
        ShowPreference::Elsewhere
    }
}
