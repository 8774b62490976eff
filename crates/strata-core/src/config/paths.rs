//! Standard locations for strata files

use std::path::PathBuf;

/// `~/.config/strata`
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("strata")
}

/// `~/.config/strata/{filename}`
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

/// `~/.config/strata/workspaces/{name}.json`
pub fn workspace_path(name: &str) -> PathBuf {
    default_config_dir()
        .join("workspaces")
        .join(format!("{name}.json"))
}
