pub mod settings;
pub mod user;

pub use settings::{ContextSettings, HistorySettings, NesSettings, OrchestratorSettings};
pub use user::{load_user_settings, user_config_path};

use std::fs;
use std::path::Path;

use crate::error::NesResult;

/// Default configuration written by `tsugi config init`.
pub const DEFAULT_SETTINGS_TOML: &str = r#"# tsugi configuration

[history]
# Edits retained per document. Older edits are folded into the retained base.
max_history_size = 5
# Merge edits that touch the previous edit within this many milliseconds.
# merge_window_ms = 1000

[context]
# Documents sent with one request, the active document included.
max_documents = 10

[orchestrator]
cache_enabled = true
prefer_sufficient_diagnostics = true
"#;

pub fn default_settings_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

/// Parse and validate settings from TOML text.
pub fn parse_settings(contents: &str) -> NesResult<NesSettings> {
    let settings: NesSettings = toml::from_str(contents)?;
    settings.validate()?;
    Ok(settings)
}

pub(crate) fn load_settings_file(path: &Path) -> NesResult<NesSettings> {
    let contents = fs::read_to_string(path)?;
    parse_settings(&contents)
}

/// Resolve the effective settings.
///
/// An explicit path must load. Without one, the user config is used when it
/// exists and parses; otherwise defaults apply.
pub fn load_settings(explicit: Option<&Path>) -> NesResult<NesSettings> {
    if let Some(path) = explicit {
        log::info!(target: "tsugi::config", "Loading settings from {}", path.display());
        return load_settings_file(path);
    }
    match load_user_settings() {
        Ok(Some(settings)) => {
            log::info!(target: "tsugi::config", "Loaded user config from XDG_CONFIG_HOME");
            Ok(settings)
        }
        Ok(None) => Ok(NesSettings::default()),
        Err(err) => {
            log::warn!(target: "tsugi::config", "Failed to load user config: {}", err);
            Ok(NesSettings::default())
        }
    }
}
