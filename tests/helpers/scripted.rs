//! A backend driven by per-call scripts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tsugi::backend::{
    BoxFuture, EditSink, NoNextEditReason, StatelessNextEditProvider, StatelessNextEditRequest,
    StatelessNextEditResult, StreamingTelemetry,
};
use tsugi::log_context::NextEditLogContext;
use tsugi::text::Edit;

#[derive(Debug, Clone)]
pub enum Step {
    Push(Edit),
    Reason(NoNextEditReason),
    /// Block until [`ScriptedProvider::release`] or cancellation.
    WaitForRelease,
    /// Keep working for a while, ignoring cancellation.
    Sleep(Duration),
}

#[derive(Default)]
struct Shared {
    calls: AtomicUsize,
    finished: AtomicUsize,
    entered: Notify,
    release: Notify,
    requests: Mutex<Vec<Arc<StatelessNextEditRequest>>>,
}

/// Call `n` runs script `n`; calls past the last script rerun the last one.
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Vec<Vec<Step>>,
    shared: Arc<Shared>,
}

impl ScriptedProvider {
    pub const ID: &'static str = "scripted";
    pub const PROMPT: &'static str = "scripted prompt";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, script: Vec<Step>) -> Self {
        self.scripts.push(script);
        self
    }

    pub fn calls(&self) -> usize {
        self.shared.calls.load(Ordering::SeqCst)
    }

    /// Calls whose future has resolved.
    pub fn finished(&self) -> usize {
        self.shared.finished.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Arc<StatelessNextEditRequest>> {
        self.shared.requests.lock().unwrap().clone()
    }

    /// Let one waiting call continue.
    pub fn release(&self) {
        self.shared.release.notify_one();
    }

    /// Resolve once at least `count` calls have started.
    pub async fn wait_for_calls(&self, count: usize) {
        loop {
            let entered = self.shared.entered.notified();
            if self.calls() >= count {
                return;
            }
            entered.await;
        }
    }

    async fn run(
        shared: Arc<Shared>,
        scripts: Vec<Vec<Step>>,
        request: Arc<StatelessNextEditRequest>,
        sink: EditSink,
        cancellation: CancellationToken,
    ) -> StatelessNextEditResult {
        let result = Self::run_script(&shared, scripts, request, sink, cancellation).await;
        shared.finished.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn run_script(
        shared: &Shared,
        scripts: Vec<Vec<Step>>,
        request: Arc<StatelessNextEditRequest>,
        sink: EditSink,
        cancellation: CancellationToken,
    ) -> StatelessNextEditResult {
        shared.requests.lock().unwrap().push(Arc::clone(&request));
        let call = shared.calls.fetch_add(1, Ordering::SeqCst);
        shared.entered.notify_waiters();

        let telemetry = StreamingTelemetry::default()
            .with_model(Self::ID)
            .with_prompt(Self::PROMPT);
        let script = scripts
            .get(call)
            .or_else(|| scripts.last())
            .cloned()
            .unwrap_or_default();
        if script.is_empty() {
            sink.push_reason(NoNextEditReason::NoSuggestions);
        }
        for step in script {
            match step {
                Step::Push(edit) => {
                    sink.push_edit(edit);
                }
                Step::Reason(reason) => {
                    sink.push_reason(reason);
                }
                Step::WaitForRelease => {
                    tokio::select! {
                        _ = cancellation.cancelled() => {
                            sink.push_reason(NoNextEditReason::Cancelled);
                            return StatelessNextEditResult::Streaming(telemetry);
                        }
                        _ = shared.release.notified() => {}
                    }
                }
                Step::Sleep(duration) => tokio::time::sleep(duration).await,
            }
        }
        StatelessNextEditResult::Streaming(telemetry.with_response("scripted response"))
    }
}

impl StatelessNextEditProvider for ScriptedProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn provide_next_edit(
        &self,
        request: Arc<StatelessNextEditRequest>,
        sink: EditSink,
        _log_context: Arc<NextEditLogContext>,
        cancellation: CancellationToken,
    ) -> BoxFuture<'static, StatelessNextEditResult> {
        Box::pin(Self::run(
            Arc::clone(&self.shared),
            self.scripts.clone(),
            request,
            sink,
            cancellation,
        ))
    }
}
