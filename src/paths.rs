//! Centralized path utilities for the application.

use std::path::{Path, PathBuf};

use crate::config::Settings;

/// Name of the per-project settings file.
pub const PROJECT_SETTINGS_FILE: &str = "dashctl.toml";

/// Get the per-project settings file path.
pub fn project_settings_path(project_dir: &Path) -> PathBuf {
    project_dir.join(PROJECT_SETTINGS_FILE)
}

/// Get the per-user settings file path (e.g. ~/.config/dashctl/config.toml).
pub fn user_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dashctl").join("config.toml"))
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Files the controller works with, resolved against the project directory.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub env_file: PathBuf,
    pub build_context: PathBuf,
    pub dockerfile: PathBuf,
}

impl ProjectLayout {
    pub fn new(project_dir: &Path, settings: &Settings) -> Self {
        let build_context = resolve(project_dir, &settings.build_context);
        Self {
            root: project_dir.to_path_buf(),
            env_file: resolve(project_dir, &settings.env_file),
            dockerfile: resolve(&build_context, &settings.dockerfile),
            build_context,
        }
    }
}
