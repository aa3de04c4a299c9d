//! User configuration loading.
//!
//! User config location: $XDG_CONFIG_HOME/tsugi/tsugi.toml, falling back to the
//! platform config directory (`~/.config/tsugi/tsugi.toml` on Linux).

use std::path::PathBuf;

use super::{NesSettings, load_settings_file};
use crate::error::NesResult;

const APP_DIR: &str = "tsugi";
const CONFIG_FILE: &str = "tsugi.toml";

/// Returns the path to the user configuration file.
///
/// Returns None if no config directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    if let Some(xdg_config) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(xdg_config).join(APP_DIR).join(CONFIG_FILE));
    }
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Load the user configuration file.
///
/// Returns `Ok(None)` when no user config exists.
pub fn load_user_settings() -> NesResult<Option<NesSettings>> {
    let Some(path) = user_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    load_settings_file(&path).map(Some)
}
