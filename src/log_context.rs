//! Per-request log context shared between the orchestrator and a backend.
//!
//! The context collects structured facts about one next-edit request and
//! renders them as a JSON record or a Markdown document. Persisting either is
//! left to the caller.

use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::error::{LockResultExt, NesResult};
use crate::text::{DEFAULT_CONTEXT_LINES, Replacement, render_line_diff};
use crate::workspace::now_ms;

/// Which source produced the returned edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickedNesType {
    Llm,
    Diagnostics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    pub name: String,
    pub elapsed_ms: u64,
}

/// The persisted JSON shape of a request log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextEditLogRecord {
    pub request_id: u64,
    pub time: u64,
    pub file_path: Option<String>,
    pub version: Option<u64>,
    pub stateless_next_edit_provider_id: Option<String>,
    pub next_edit_request: Option<serde_json::Value>,
    pub diagnostics_result_edit: Option<Replacement>,
    pub result_edit: Option<Replacement>,
    #[serde(rename = "pickedNESType")]
    pub picked_nes_type: Option<PickedNesType>,
    pub is_cached_result: bool,
    pub prompt: Option<String>,
    pub error: Option<String>,
    pub response: Option<String>,
    pub response_results: Vec<String>,
    pub timings: Vec<Timing>,
    pub logs: Vec<String>,
    pub is_accepted: Option<bool>,
    pub language_context: Option<serde_json::Value>,
    pub diagnostics: Vec<String>,
    /// Text `result_edit` applies to; only used for rendering diffs.
    #[serde(skip)]
    pub document_before_edits: Option<Arc<str>>,
}

pub struct NextEditLogContext {
    started: Instant,
    record: Mutex<NextEditLogRecord>,
}

impl std::fmt::Debug for NextEditLogContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NextEditLogContext")
            .field("request_id", &self.record().request_id)
            .finish()
    }
}

impl NextEditLogContext {
    pub fn new(request_id: u64, provider_id: impl Into<String>) -> Self {
        Self::from_record(NextEditLogRecord {
            request_id,
            time: now_ms(),
            stateless_next_edit_provider_id: Some(provider_id.into()),
            ..NextEditLogRecord::default()
        })
    }

    fn from_record(record: NextEditLogRecord) -> Self {
        Self {
            started: Instant::now(),
            record: Mutex::new(record),
        }
    }

    fn update(&self, f: impl FnOnce(&mut NextEditLogRecord)) {
        let mut record = self.record.lock().recover_poison("log_context.update");
        f(&mut record);
    }

    /// Copy of the record as collected so far.
    pub fn record(&self) -> NextEditLogRecord {
        self.record.lock().recover_poison("log_context.record").clone()
    }

    pub fn request_id(&self) -> u64 {
        self.record().request_id
    }

    pub fn is_cached_result(&self) -> bool {
        self.record().is_cached_result
    }

    /// Context for a request answered from cache: inherits everything the
    /// original request collected.
    pub fn for_cache_hit(&self, request_id: u64) -> Self {
        let mut record = self.record();
        let original = record.request_id;
        record.request_id = request_id;
        record.time = now_ms();
        record.is_cached_result = true;
        record.is_accepted = None;
        record.timings.clear();
        record.logs.push(format!("cached result of request {original}"));
        Self::from_record(record)
    }

    pub fn set_request_input(&self, file_path: &str, version: u64, request: serde_json::Value) {
        self.update(|r| {
            r.file_path = Some(file_path.to_string());
            r.version = Some(version);
            r.next_edit_request = Some(request);
        });
    }

    pub fn set_result(&self, edit: Option<&Replacement>, picked: Option<PickedNesType>) {
        self.update(|r| {
            r.result_edit = edit.cloned();
            r.picked_nes_type = picked;
        });
    }

    pub fn set_document_before_edits(&self, text: Arc<str>) {
        self.update(|r| r.document_before_edits = Some(text));
    }

    pub fn set_diagnostics_result(&self, edit: Option<&Replacement>) {
        self.update(|r| r.diagnostics_result_edit = edit.cloned());
    }

    pub fn set_error(&self, error: impl Into<String>) {
        let error = error.into();
        self.update(|r| r.error = Some(error));
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        self.update(|r| r.prompt = Some(prompt));
    }

    pub fn set_response(&self, response: impl Into<String>) {
        let response = response.into();
        self.update(|r| r.response = Some(response));
    }

    pub fn set_response_results(&self, results: Vec<String>) {
        self.update(|r| r.response_results = results);
    }

    pub fn add_response_result(&self, result: impl Into<String>) {
        let result = result.into();
        self.update(|r| r.response_results.push(result));
    }

    pub fn set_accepted(&self, accepted: bool) {
        self.update(|r| r.is_accepted = Some(accepted));
    }

    pub fn set_language_context(&self, context: serde_json::Value) {
        self.update(|r| r.language_context = Some(context));
    }

    pub fn set_diagnostics(&self, diagnostics: Vec<String>) {
        self.update(|r| r.diagnostics = diagnostics);
    }

    /// Record the time elapsed since the context was created.
    pub fn record_timing(&self, name: &str) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        self.update(|r| {
            r.timings.push(Timing {
                name: name.to_string(),
                elapsed_ms,
            })
        });
    }

    pub fn trace(&self, message: impl Into<String>) {
        let message = message.into();
        log::trace!(target: "tsugi::orchestrator", "{}", message);
        self.update(|r| r.logs.push(message));
    }

    pub fn to_json(&self) -> NesResult<String> {
        Ok(serde_json::to_string_pretty(&self.record())?)
    }

    pub fn to_markdown(&self) -> String {
        let r = self.record();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "# Next edit request {} ({})\n",
            r.request_id,
            r.file_path.as_deref().unwrap_or("unknown file")
        );
        if let Some(version) = r.version {
            let _ = writeln!(out, "- version: {version}");
        }
        if let Some(provider) = &r.stateless_next_edit_provider_id {
            let _ = writeln!(out, "- provider: {provider}");
        }
        if let Some(picked) = r.picked_nes_type {
            let _ = writeln!(out, "- picked: {picked:?}");
        }
        let _ = writeln!(out, "- cached: {}", r.is_cached_result);
        if let Some(accepted) = r.is_accepted {
            let _ = writeln!(out, "- accepted: {accepted}");
        }

        push_section(&mut out, "Result edit", r.result_edit.as_ref().map(describe_replacement));
        if let (Some(edit), Some(before)) = (&r.result_edit, &r.document_before_edits)
            && let Ok(after) = edit.apply(before)
        {
            let diff = render_line_diff(before, &after, DEFAULT_CONTEXT_LINES);
            if !diff.is_empty() {
                let _ = write!(out, "\n## Result diff\n\n```diff\n{diff}```\n");
            }
        }
        push_section(
            &mut out,
            "Diagnostics edit",
            r.diagnostics_result_edit.as_ref().map(describe_replacement),
        );
        push_section(&mut out, "Error", r.error);
        push_section(&mut out, "Prompt", r.prompt);
        push_section(&mut out, "Response", r.response);
        if !r.response_results.is_empty() {
            push_section(&mut out, "Response results", Some(r.response_results.join("\n")));
        }
        if !r.logs.is_empty() {
            push_section(&mut out, "Logs", Some(r.logs.join("\n")));
        }
        out
    }
}

fn describe_replacement(replacement: &Replacement) -> String {
    format!("{} -> {:?}", replacement.range, replacement.new_text)
}

fn push_section(out: &mut String, title: &str, body: Option<String>) {
    if let Some(body) = body {
        let _ = write!(out, "\n## {title}\n\n```\n{body}\n```\n");
    }
}
