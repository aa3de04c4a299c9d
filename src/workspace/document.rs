use path_clean::PathClean;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::text::OffsetRange;

/// Stable identity of an open document, derived from its path.
///
/// Paths are normalized so that `src/./a.rs` and `src/a.rs` name the same
/// document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Arc<str>);

impl DocumentId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self::from_path(Path::new(id.as_ref()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let cleaned = path.as_ref().to_path_buf().clean();
        let normalized = cleaned.to_string_lossy().replace('\\', "/");
        Self(normalized.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// Immutable view of a document at one version.
///
/// Cloning is cheap: the text is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    id: DocumentId,
    version: u64,
    text: Arc<str>,
    language_id: String,
    selection: Vec<OffsetRange>,
}

impl Document {
    pub(crate) fn new(id: DocumentId, text: Arc<str>, language_id: String) -> Self {
        Self {
            id,
            version: 0,
            text,
            language_id,
            selection: Vec::new(),
        }
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn text(&self) -> &Arc<str> {
        &self.text
    }

    pub fn language_id(&self) -> &str {
        &self.language_id
    }

    /// Selection ranges, one per caret.
    pub fn selection(&self) -> &[OffsetRange] {
        &self.selection
    }

    pub(crate) fn replace_text(&mut self, text: Arc<str>) {
        self.text = text;
        self.version += 1;
    }

    pub(crate) fn set_selection(&mut self, selection: Vec<OffsetRange>) {
        self.selection = selection;
    }
}
