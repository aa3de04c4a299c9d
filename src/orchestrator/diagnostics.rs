//! Edits proposed by static analysis, and the choice between them and a
//! backend suggestion.

use crate::log_context::PickedNesType;
use crate::text::{Edit, Replacement};
use crate::workspace::Document;

/// A fix derived from diagnostics of the active document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticsEdit {
    /// Offsets into the document text the source was given.
    pub edit: Replacement,
    /// The fix fully addresses the diagnostic and beats a speculative suggestion.
    pub sufficient: bool,
    pub message: String,
}

pub trait DiagnosticsEditSource: Send + Sync {
    fn id(&self) -> &str;

    /// Best fix for `document`, if any.
    fn edit_for(&self, document: &Document) -> Option<DiagnosticsEdit>;
}

/// Choose between a backend edit and a diagnostics fix.
///
/// A sufficient fix wins when preferred; otherwise the backend edit wins and
/// the fix is only a fallback.
pub fn pick_edit(
    llm: Option<Edit>,
    diagnostics: Option<&DiagnosticsEdit>,
    prefer_sufficient_diagnostics: bool,
) -> Option<(Edit, PickedNesType)> {
    let diagnostics_edit = diagnostics.map(|d| (Edit::single(d.edit.clone()), d.sufficient));
    match (llm, diagnostics_edit) {
        (_, Some((edit, true))) if prefer_sufficient_diagnostics && !edit.is_empty() => {
            Some((edit, PickedNesType::Diagnostics))
        }
        (Some(edit), _) if !edit.is_empty() => Some((edit, PickedNesType::Llm)),
        (_, Some((edit, _))) if !edit.is_empty() => Some((edit, PickedNesType::Diagnostics)),
        _ => None,
    }
}
