//! Tracking of in-flight next-edit requests for supersession.
//!
//! At most one request per document is in flight. Starting a new request for
//! a document cancels the token of the request it supersedes. Request ids are
//! issued by the orchestrator that owns the tracker.

use dashmap::DashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::workspace::DocumentId;

pub type RequestId = u64;

#[derive(Debug)]
struct ActiveRequest {
    id: RequestId,
    token: CancellationToken,
}

/// Tracks the active request of every document.
#[derive(Debug, Clone, Default)]
pub struct RequestTracker {
    /// Maps a document to its most recent active request
    active_requests: Arc<DashMap<DocumentId, ActiveRequest>>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `request_id` for `document`, cancelling whatever it
    /// supersedes. Returns the token the new request should honor.
    pub fn start_request(
        &self,
        document: &DocumentId,
        request_id: RequestId,
        token: CancellationToken,
    ) -> CancellationToken {
        let previous = self.active_requests.insert(
            document.clone(),
            ActiveRequest {
                id: request_id,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            log::debug!(
                target: "tsugi::orchestrator",
                "Request {} for {} supersedes request {}",
                request_id,
                document,
                previous.id
            );
            previous.token.cancel();
        }
        token
    }

    /// Whether `request_id` is still the document's active request.
    pub fn is_active(&self, document: &DocumentId, request_id: RequestId) -> bool {
        self.active_requests
            .get(document)
            .map(|entry| entry.id == request_id && !entry.token.is_cancelled())
            .unwrap_or(false)
    }

    /// Stop tracking a request if it is still the active one.
    pub fn finish_request(&self, document: &DocumentId, request_id: RequestId) {
        self.active_requests
            .remove_if(document, |_, active| active.id == request_id);
    }

    /// Cancel and forget the document's active request, e.g. on close.
    pub fn cancel_all_for_document(&self, document: &DocumentId) {
        if let Some((_, active)) = self.active_requests.remove(document) {
            active.token.cancel();
        }
    }

    pub fn active_request(&self, document: &DocumentId) -> Option<RequestId> {
        self.active_requests.get(document).map(|entry| entry.id)
    }
}
