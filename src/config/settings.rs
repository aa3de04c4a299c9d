use serde::{Deserialize, Serialize};

use crate::error::{NesError, NesResult};

/// Settings for the whole next-edit pipeline.
///
/// Every section and field is optional in TOML; missing values take their
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NesSettings {
    pub history: HistorySettings,
    pub context: ContextSettings,
    pub orchestrator: OrchestratorSettings,
}

impl NesSettings {
    pub fn validate(&self) -> NesResult<()> {
        if self.history.max_history_size == 0 {
            return Err(NesError::config("history.max_history_size must be at least 1"));
        }
        if self.context.max_documents == 0 {
            return Err(NesError::config("context.max_documents must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Edits retained per document.
    pub max_history_size: usize,
    /// Merge an edit into the previous entry when it touches the previous
    /// entry's output within this many milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_window_ms: Option<u64>,
}

impl HistorySettings {
    pub const DEFAULT_MAX_HISTORY_SIZE: usize = 5;

    pub fn with_max_history_size(max_history_size: usize) -> Self {
        Self {
            max_history_size,
            ..Self::default()
        }
    }

    pub fn unbounded() -> Self {
        Self::with_max_history_size(usize::MAX)
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_history_size: Self::DEFAULT_MAX_HISTORY_SIZE,
            merge_window_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    /// Documents included in one request context, active document included.
    pub max_documents: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self { max_documents: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    pub cache_enabled: bool,
    /// Use a diagnostics fix instead of the backend suggestion when the fix
    /// is marked sufficient.
    pub prefer_sufficient_diagnostics: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            prefer_sufficient_diagnostics: true,
        }
    }
}
