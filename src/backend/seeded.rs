//! A deterministic backend replaying pre-seeded line edits.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{
    BoxFuture, EditSink, NoNextEditReason, StatelessNextEditProvider, StatelessNextEditRequest,
    StatelessNextEditResult, StreamingTelemetry,
};
use crate::log_context::NextEditLogContext;
use crate::text::LineEdit;

/// Pushes its seeded line edits, converted against the request's active
/// text, in seed order.
///
/// Multi-caret requests resolve immediately with an empty result.
#[derive(Debug, Clone, Default)]
pub struct SeededLineEditProvider {
    seeds: Vec<LineEdit>,
    delay: Option<Duration>,
}

impl SeededLineEditProvider {
    pub const ID: &'static str = "seeded-line-edits";

    pub fn new(seeds: Vec<LineEdit>) -> Self {
        Self { seeds, delay: None }
    }

    /// Wait this long before each push.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn run(
        self,
        request: Arc<StatelessNextEditRequest>,
        sink: EditSink,
        log_context: Arc<NextEditLogContext>,
        cancellation: CancellationToken,
    ) -> StatelessNextEditResult {
        if request.selection.len() > 1 {
            log_context.trace("multiple selections; nothing to suggest");
            return StatelessNextEditResult::Empty;
        }
        let telemetry = StreamingTelemetry::default()
            .with_model(Self::ID)
            .with_prompt(format!(
                "{} seeded line edits for {}",
                self.seeds.len(),
                request.active_document_id
            ));
        if self.seeds.is_empty() {
            sink.push_reason(NoNextEditReason::NoSuggestions);
            return StatelessNextEditResult::Streaming(telemetry);
        }

        let mut pushed = 0;
        for seed in &self.seeds {
            if let Some(delay) = self.delay {
                tokio::select! {
                    _ = cancellation.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if cancellation.is_cancelled() {
                sink.push_reason(NoNextEditReason::Cancelled);
                break;
            }
            match seed.to_edit(&request.active_text) {
                Ok(edit) => {
                    if !sink.push_edit(edit) {
                        break;
                    }
                    pushed += 1;
                }
                Err(err) => {
                    sink.push_reason(NoNextEditReason::Error(err.to_string()));
                    break;
                }
            }
        }
        StatelessNextEditResult::Streaming(telemetry.with_response(format!("{pushed} edits pushed")))
    }
}

impl StatelessNextEditProvider for SeededLineEditProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn provide_next_edit(
        &self,
        request: Arc<StatelessNextEditRequest>,
        sink: EditSink,
        log_context: Arc<NextEditLogContext>,
        cancellation: CancellationToken,
    ) -> BoxFuture<'static, StatelessNextEditResult> {
        Box::pin(self.clone().run(request, sink, log_context, cancellation))
    }
}
