//! Behavior of `NextEditOrchestrator` against scripted and seeded backends.

mod helpers;

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use helpers::fixtures::Fixture;
use helpers::scripted::{ScriptedProvider, Step};
use tsugi::backend::{NoNextEditReason, SeededLineEditProvider};
use tsugi::config::NesSettings;
use tsugi::log_context::PickedNesType;
use tsugi::orchestrator::{
    DiagnosticsEdit, DiagnosticsEditSource, NextEditOrchestrator, NextEditOutcome,
    NoSuggestionCause, ShowPreference,
};
use tsugi::text::{Edit, LineEdit, LineReplacement, Replacement};
use tsugi::workspace::{Document, DocumentId};
use tsugi::NesError;

fn insert(offset: usize, text: &str) -> Edit {
    Edit::single(Replacement::insert(offset, text))
}

#[tokio::test]
async fn test_second_request_is_answered_from_cache() {
    let provider = Arc::new(ScriptedProvider::new().then(vec![Step::Push(insert(4, "!"))]));
    let fixture = Fixture::new(provider.clone());
    let id = fixture.open("a.txt", "text", "plaintext", 4);
    let token = CancellationToken::new();

    let first = fixture.orchestrator.get_next_edit(&id, &token).await.unwrap();
    let second = fixture.orchestrator.get_next_edit(&id, &token).await.unwrap();

    assert_eq!(provider.calls(), 1);
    assert!(!first.is_cached_result());
    assert!(second.is_cached_result());
    assert_ne!(first.request_id, second.request_id);
    assert_eq!(first.outcome, second.outcome);
    let record = second.log_context.record();
    assert_eq!(record.request_id, second.request_id);
    assert_eq!(record.prompt.as_deref(), Some(ScriptedProvider::PROMPT));
}

#[tokio::test]
async fn test_document_change_invalidates_cache() {
    let provider = Arc::new(ScriptedProvider::new().then(vec![Step::Push(insert(0, "#"))]));
    let fixture = Fixture::new(provider.clone());
    let id = fixture.open("a.txt", "text", "plaintext", 0);
    let token = CancellationToken::new();

    fixture.orchestrator.get_next_edit(&id, &token).await.unwrap();
    assert!(fixture.orchestrator.cache().get(&id).is_some());

    fixture.workspace.apply_edit(&id, &insert(4, "s")).unwrap();
    assert!(fixture.orchestrator.cache().get(&id).is_none());

    let response = fixture.orchestrator.get_next_edit(&id, &token).await.unwrap();
    assert!(!response.is_cached_result());
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_selection_change_misses_cache() {
    let provider = Arc::new(ScriptedProvider::new().then(vec![Step::Push(insert(0, "#"))]));
    let fixture = Fixture::new(provider.clone());
    let id = fixture.open("a.txt", "one\ntwo", "plaintext", 0);
    let token = CancellationToken::new();

    fixture.orchestrator.get_next_edit(&id, &token).await.unwrap();
    fixture
        .workspace
        .set_selection(&id, vec![tsugi::OffsetRange::empty(5)])
        .unwrap();
    let response = fixture.orchestrator.get_next_edit(&id, &token).await.unwrap();
    assert!(!response.is_cached_result());
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_superseded_request_is_cancelled_and_never_cached() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .then(vec![Step::WaitForRelease, Step::Push(insert(0, "first "))])
            .then(vec![Step::Push(insert(0, "second "))]),
    );
    let fixture = Fixture::new(provider.clone());
    let id = fixture.open("a.txt", "text", "plaintext", 0);

    let first = {
        let orchestrator = Arc::clone(&fixture.orchestrator);
        let id = id.clone();
        tokio::spawn(async move {
            orchestrator
                .get_next_edit(&id, &CancellationToken::new())
                .await
        })
    };
    provider.wait_for_calls(1).await;
    assert!(fixture.orchestrator.in_flight_request(&id).is_some());

    let second = fixture
        .orchestrator
        .get_next_edit(&id, &CancellationToken::new())
        .await
        .unwrap();
    let first = first.await.unwrap().unwrap();

    assert_eq!(
        first.outcome,
        NextEditOutcome::NoSuggestion(NoSuggestionCause::Cancelled)
    );
    let suggestion = second.suggestion().unwrap();
    assert_eq!(suggestion.apply().unwrap(), "second text");

    let cached = fixture.orchestrator.cache().get(&id).unwrap();
    assert_eq!(cached.log_context.request_id(), second.request_id);
    assert_eq!(fixture.orchestrator.in_flight_request(&id), None);
}

#[tokio::test]
async fn test_caller_cancellation_reaches_waiting_backend() {
    let provider = Arc::new(
        ScriptedProvider::new().then(vec![Step::WaitForRelease, Step::Push(insert(0, "x"))]),
    );
    let fixture = Fixture::new(provider.clone());
    let id = fixture.open("a.txt", "text", "plaintext", 0);
    let token = CancellationToken::new();

    let pending = {
        let orchestrator = Arc::clone(&fixture.orchestrator);
        let id = id.clone();
        let token = token.clone();
        tokio::spawn(async move { orchestrator.get_next_edit(&id, &token).await })
    };
    provider.wait_for_calls(1).await;
    token.cancel();

    let response = pending.await.unwrap().unwrap();
    assert_eq!(
        response.outcome,
        NextEditOutcome::NoSuggestion(NoSuggestionCause::Cancelled)
    );
    assert!(fixture.orchestrator.cache().is_empty());
}

#[tokio::test]
async fn test_backend_finishing_after_first_push_still_reports_telemetry() {
    let provider = Arc::new(ScriptedProvider::new().then(vec![
        Step::Push(insert(0, "x")),
        Step::Sleep(Duration::from_millis(5)),
    ]));
    let fixture = Fixture::new(provider.clone());
    let id = fixture.open("a.txt", "text", "plaintext", 0);
    let token = CancellationToken::new();

    let response = fixture.orchestrator.get_next_edit(&id, &token).await.unwrap();
    assert_eq!(response.suggestion().unwrap().apply().unwrap(), "xtext");

    let record = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let record = response.log_context.record();
            if record.response.is_some() {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("backend resolves");
    assert_eq!(provider.finished(), 1);
    assert_eq!(record.prompt.as_deref(), Some(ScriptedProvider::PROMPT));
    assert_eq!(record.response.as_deref(), Some("scripted response"));

    let cached = fixture.orchestrator.get_next_edit(&id, &token).await.unwrap();
    assert!(cached.is_cached_result());
    assert_eq!(
        cached.log_context.record().response.as_deref(),
        Some("scripted response")
    );
}

#[tokio::test]
async fn test_cache_hit_cancels_request_in_flight() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .then(vec![Step::Push(insert(0, "#"))])
            .then(vec![Step::WaitForRelease, Step::Push(insert(4, "#"))]),
    );
    let fixture = Fixture::new(provider.clone());
    let id = fixture.open("a.txt", "one\ntwo", "plaintext", 0);
    fixture
        .orchestrator
        .get_next_edit(&id, &CancellationToken::new())
        .await
        .unwrap();

    fixture
        .workspace
        .set_selection(&id, vec![tsugi::OffsetRange::empty(5)])
        .unwrap();
    let pending = {
        let orchestrator = Arc::clone(&fixture.orchestrator);
        let id = id.clone();
        tokio::spawn(async move {
            orchestrator
                .get_next_edit(&id, &CancellationToken::new())
                .await
        })
    };
    provider.wait_for_calls(2).await;
    assert!(fixture.orchestrator.in_flight_request(&id).is_some());

    fixture
        .workspace
        .set_selection(&id, vec![tsugi::OffsetRange::empty(0)])
        .unwrap();
    let cached = fixture
        .orchestrator
        .get_next_edit(&id, &CancellationToken::new())
        .await
        .unwrap();
    assert!(cached.is_cached_result());

    let superseded = pending.await.unwrap().unwrap();
    assert_eq!(
        superseded.outcome,
        NextEditOutcome::NoSuggestion(NoSuggestionCause::Cancelled)
    );
    assert_eq!(fixture.orchestrator.in_flight_request(&id), None);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_seeded_line_edit_lands_at_absolute_offset() {
    let text = concat!(
        "class Point {\n",
        "    constructor(\n",
        "        private readonly x: number,\n",
        "        private readonly y: number,\n",
        "    ) { }\n",
        "\n",
        "    getDistance() {\n",
        "        return Math.sqrt(this.x ** 2 + this.y ** 2);\n",
        "    }\n",
        "}\n",
    );
    let provider = SeededLineEditProvider::new(vec![
        LineEdit::single(LineReplacement::new(
            4..4,
            ["        private readonly z: number,"],
        )),
        LineEdit::single(LineReplacement::new(
            7..8,
            ["        return Math.sqrt(this.x ** 2 + this.y ** 2 + this.z ** 2);"],
        )),
    ]);
    let fixture = Fixture::new(Arc::new(provider));
    let caret = text.find("y: number,").unwrap() + "y: number,".len();
    let id = fixture.open("src/point.ts", text, "typescript", caret);

    let response = fixture
        .orchestrator
        .get_next_edit(&id, &CancellationToken::new())
        .await
        .unwrap();
    let result = response.suggestion().unwrap();

    let offset = text.find("    ) { }").unwrap();
    assert_eq!(
        result.edit,
        Replacement::new(offset, offset, "        private readonly z: number,\n")
    );
    assert_eq!(result.show_preference, ShowPreference::AtCursor);
    assert_eq!(result.picked, PickedNesType::Llm);
    assert!(
        result
            .apply()
            .unwrap()
            .contains("y: number,\n        private readonly z: number,\n    ) { }")
    );
    assert_eq!(
        response.log_context.record().stateless_next_edit_provider_id.as_deref(),
        Some(SeededLineEditProvider::ID)
    );
}

#[tokio::test]
async fn test_suggestion_follows_user_typing_it() {
    let provider = Arc::new(ScriptedProvider::new().then(vec![
        Step::WaitForRelease,
        Step::Push(insert(12, "price * quantity;")),
    ]));
    let fixture = Fixture::new(provider.clone());
    let id = fixture.open("cart.js", "let total = ", "javascript", 12);

    let pending = {
        let orchestrator = Arc::clone(&fixture.orchestrator);
        let id = id.clone();
        tokio::spawn(async move {
            orchestrator
                .get_next_edit(&id, &CancellationToken::new())
                .await
        })
    };
    provider.wait_for_calls(1).await;
    fixture.workspace.apply_edit(&id, &insert(12, "pri")).unwrap();
    provider.release();

    let response = pending.await.unwrap().unwrap();
    let result = response.suggestion().unwrap();
    assert_eq!(&*result.document_before_edits, "let total = pri");
    assert_eq!(result.edit, Replacement::new(12, 15, "price * quantity;"));
    assert_eq!(result.apply().unwrap(), "let total = price * quantity;");
    // Computed for an older version, so it must not be served from cache.
    assert!(fixture.orchestrator.cache().is_empty());
}

#[tokio::test]
async fn test_diverging_typing_makes_suggestion_stale() {
    let provider = Arc::new(ScriptedProvider::new().then(vec![
        Step::WaitForRelease,
        Step::Push(insert(12, "price * quantity;")),
    ]));
    let fixture = Fixture::new(provider.clone());
    let id = fixture.open("cart.js", "let total = ", "javascript", 12);

    let pending = {
        let orchestrator = Arc::clone(&fixture.orchestrator);
        let id = id.clone();
        tokio::spawn(async move {
            orchestrator
                .get_next_edit(&id, &CancellationToken::new())
                .await
        })
    };
    provider.wait_for_calls(1).await;
    fixture.workspace.apply_edit(&id, &insert(12, "7")).unwrap();
    provider.release();

    let response = pending.await.unwrap().unwrap();
    assert_eq!(
        response.outcome,
        NextEditOutcome::NoSuggestion(NoSuggestionCause::StaleEdit)
    );
    assert!(fixture.orchestrator.cache().is_empty());
}

#[tokio::test]
async fn test_no_suggestions_is_cached_but_errors_are_not() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .then(vec![Step::Reason(NoNextEditReason::Error("model down".into()))])
            .then(vec![Step::Reason(NoNextEditReason::NoSuggestions)]),
    );
    let fixture = Fixture::new(provider.clone());
    let id = fixture.open("a.txt", "text", "plaintext", 0);
    let token = CancellationToken::new();

    let failed = fixture.orchestrator.get_next_edit(&id, &token).await.unwrap();
    assert_eq!(
        failed.outcome,
        NextEditOutcome::NoSuggestion(NoSuggestionCause::BackendError("model down".into()))
    );
    assert_eq!(failed.log_context.record().error.as_deref(), Some("model down"));
    assert!(fixture.orchestrator.cache().is_empty());

    let declined = fixture.orchestrator.get_next_edit(&id, &token).await.unwrap();
    assert_eq!(
        declined.outcome,
        NextEditOutcome::NoSuggestion(NoSuggestionCause::NoSuggestions)
    );
    let again = fixture.orchestrator.get_next_edit(&id, &token).await.unwrap();
    assert!(again.is_cached_result());
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_edit_not_fitting_request_text_is_a_backend_error() {
    let provider = Arc::new(ScriptedProvider::new().then(vec![Step::Push(insert(99, "x"))]));
    let fixture = Fixture::new(provider);
    let id = fixture.open("a.txt", "text", "plaintext", 0);

    let response = fixture
        .orchestrator
        .get_next_edit(&id, &CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(
        response.outcome,
        NextEditOutcome::NoSuggestion(NoSuggestionCause::BackendError(_))
    ));
}

struct FixedDiagnostics {
    sufficient: bool,
}

impl DiagnosticsEditSource for FixedDiagnostics {
    fn id(&self) -> &str {
        "fixed"
    }

    fn edit_for(&self, document: &Document) -> Option<DiagnosticsEdit> {
        let offset = document.text().find("lenght")?;
        Some(DiagnosticsEdit {
            edit: Replacement::new(offset, offset + "lenght".len(), "length"),
            sufficient: self.sufficient,
            message: "unknown property 'lenght'".into(),
        })
    }
}

fn diagnostics_fixture(provider: Arc<ScriptedProvider>, sufficient: bool) -> Fixture {
    let fixture = Fixture::new(provider.clone());
    let orchestrator = NextEditOrchestrator::new(
        Arc::clone(&fixture.workspace),
        Arc::clone(&fixture.history),
        provider,
        NesSettings::default(),
    )
    .with_diagnostics_source(Arc::new(FixedDiagnostics { sufficient }));
    Fixture {
        orchestrator: Arc::new(orchestrator),
        ..fixture
    }
}

#[tokio::test]
async fn test_sufficient_diagnostics_fix_is_preferred() {
    let provider = Arc::new(ScriptedProvider::new().then(vec![Step::Push(insert(0, "// "))]));
    let fixture = diagnostics_fixture(provider.clone(), true);
    let id = fixture.open("a.js", "items.lenght", "javascript", 0);

    let response = fixture
        .orchestrator
        .get_next_edit(&id, &CancellationToken::new())
        .await
        .unwrap();
    let result = response.suggestion().unwrap();
    assert_eq!(result.picked, PickedNesType::Diagnostics);
    assert_eq!(result.apply().unwrap(), "items.length");
    assert_eq!(provider.calls(), 1);

    let record = response.log_context.record();
    assert_eq!(record.picked_nes_type, Some(PickedNesType::Diagnostics));
    assert_eq!(record.diagnostics_result_edit, Some(Replacement::new(6, 12, "length")));
}

#[tokio::test]
async fn test_insufficient_diagnostics_fix_is_a_fallback() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .then(vec![Step::Push(insert(0, "// "))])
            .then(vec![Step::Reason(NoNextEditReason::NoSuggestions)]),
    );
    let fixture = diagnostics_fixture(provider, false);
    let id = fixture.open("a.js", "items.lenght", "javascript", 0);
    let token = CancellationToken::new();

    let llm = fixture.orchestrator.get_next_edit(&id, &token).await.unwrap();
    assert_eq!(llm.suggestion().unwrap().picked, PickedNesType::Llm);

    fixture.workspace.apply_edit(&id, &insert(12, ";")).unwrap();
    let fallback = fixture.orchestrator.get_next_edit(&id, &token).await.unwrap();
    let result = fallback.suggestion().unwrap();
    assert_eq!(result.picked, PickedNesType::Diagnostics);
    assert_eq!(result.apply().unwrap(), "items.length;");
}

#[tokio::test]
async fn test_request_context_includes_recent_documents() {
    let provider = Arc::new(ScriptedProvider::new());
    let fixture = Fixture::new(provider.clone());
    let other = fixture.open("lib.rs", "fn a() {}", "rust", 0);
    fixture.workspace.apply_edit(&other, &insert(9, "\n")).unwrap();
    let active = fixture.open("main.rs", "fn main() {}", "rust", 0);

    fixture
        .orchestrator
        .get_next_edit(&active, &CancellationToken::new())
        .await
        .unwrap();

    let requests = provider.requests();
    let request = requests.first().unwrap();
    assert_eq!(request.active_document_id, active);
    assert_eq!(&*request.active_text, "fn main() {}");
    assert!(request.documents.get(&active).is_some());
    assert!(request.documents.get(&other).unwrap().has_edits());
}

#[tokio::test]
async fn test_contract_violations_are_errors() {
    let fixture = Fixture::new(Arc::new(ScriptedProvider::new()));
    let token = CancellationToken::new();

    let missing = fixture
        .orchestrator
        .get_next_edit(&DocumentId::new("missing.rs"), &token)
        .await
        .unwrap_err();
    assert!(matches!(missing, NesError::DocumentNotFound { .. }));

    let id = DocumentId::new("no_caret.rs");
    fixture.workspace.add_document(id.clone(), "", "rust").unwrap();
    let no_selection = fixture
        .orchestrator
        .get_next_edit(&id, &token)
        .await
        .unwrap_err();
    assert!(matches!(no_selection, NesError::NoSelection { .. }));
}

#[tokio::test]
async fn test_closing_document_drops_cache_entry() {
    let provider = Arc::new(ScriptedProvider::new().then(vec![Step::Push(insert(0, "x"))]));
    let fixture = Fixture::new(provider);
    let id = fixture.open("a.txt", "text", "plaintext", 0);

    fixture
        .orchestrator
        .get_next_edit(&id, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(fixture.orchestrator.cache().len(), 1);

    fixture.workspace.remove_document(&id).unwrap();
    assert!(fixture.orchestrator.cache().is_empty());
}
