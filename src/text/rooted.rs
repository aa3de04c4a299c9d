use std::sync::Arc;

use super::diff::{DEFAULT_CONTEXT_LINES, render_line_diff};
use super::edit::Edit;
use crate::error::{NesError, NesResult};

/// An edit paired with the exact text it was computed against.
///
/// The resulting text is computed once at construction, so a `RootedEdit`
/// always holds an edit that fits its base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootedEdit {
    base: Arc<str>,
    edit: Edit,
    result: Arc<str>,
}

impl RootedEdit {
    pub fn new(base: impl Into<Arc<str>>, edit: Edit) -> NesResult<Self> {
        let base = base.into();
        let result: Arc<str> = edit.apply(&base)?.into();
        Ok(Self { base, edit, result })
    }

    /// Build from texts already known on both sides of the edit.
    pub(crate) fn from_parts(base: Arc<str>, edit: Edit, result: Arc<str>) -> Self {
        debug_assert_eq!(edit.apply(&base).ok().as_deref(), Some(&*result));
        Self { base, edit, result }
    }

    /// Root the minimal edit between two texts.
    pub fn from_texts(base: impl Into<Arc<str>>, result: impl Into<Arc<str>>) -> Self {
        let base = base.into();
        let result = result.into();
        let edit = Edit::diff(&base, &result);
        Self { base, edit, result }
    }

    pub fn base(&self) -> &Arc<str> {
        &self.base
    }

    pub fn edit(&self) -> &Edit {
        &self.edit
    }

    pub fn result(&self) -> &Arc<str> {
        &self.result
    }

    pub fn is_empty(&self) -> bool {
        self.edit.is_empty()
    }

    /// Append `next`, which must be rooted at this edit's result.
    pub fn compose(&self, next: &RootedEdit) -> NesResult<RootedEdit> {
        if next.base != self.result {
            return Err(NesError::invalid_edit(
                "cannot compose edits whose texts do not chain",
            ));
        }
        Ok(Self {
            base: Arc::clone(&self.base),
            edit: self.edit.compose(&next.edit),
            result: Arc::clone(&next.result),
        })
    }

    pub fn render_diff(&self) -> String {
        render_line_diff(&self.base, &self.result, DEFAULT_CONTEXT_LINES)
    }
}

/// Render a chain of rooted edits oldest first, one diff per entry.
pub fn render_history(entries: &[RootedEdit]) -> String {
    entries
        .iter()
        .map(RootedEdit::render_diff)
        .collect::<Vec<_>>()
        .join("\n")
}
