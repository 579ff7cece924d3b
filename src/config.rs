use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::paths::{project_settings_path, user_settings_path};

/// Port published when neither the command line nor the environment picks one.
pub const FALLBACK_PORT: u16 = 8501;

/// Process environment variable consulted for the default host port.
pub const PORT_ENV_VAR: &str = "DASHBOARD_PORT";

/// Manager settings. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub container_name: String,
    pub image: String,
    pub internal_port: u16,
    pub default_port: u16,
    pub env_file: PathBuf,
    pub build_context: PathBuf,
    pub dockerfile: PathBuf,
    pub health_path: String,
    #[serde(with = "humantime_serde")]
    pub grace_period: Duration,
    #[serde(with = "humantime_serde")]
    pub startup_timeout: Duration,
    pub log_tail: Option<u32>,
    pub probe_endpoint: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            container_name: "crypto-dashboard".to_string(),
            image: "crypto-dashboard:latest".to_string(),
            internal_port: 8501,
            default_port: FALLBACK_PORT,
            env_file: PathBuf::from(".env"),
            build_context: PathBuf::from("."),
            dockerfile: PathBuf::from("Dockerfile"),
            health_path: "/_stcore/health".to_string(),
            grace_period: Duration::from_secs(5),
            startup_timeout: Duration::from_secs(120),
            log_tail: None,
            probe_endpoint: true,
        }
    }
}

fn load_settings_from(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path).map_err(|e| AppError::config_path(path, e.to_string()))?;
    toml::from_str(&content).map_err(|e| AppError::config_path(path, e.to_string()))
}

/// Load settings.
///
/// An explicit path must exist. Otherwise the project file wins over the
/// per-user file, and built-in defaults apply when neither exists.
pub fn load_settings(project_dir: &Path, explicit: Option<&Path>) -> Result<Settings> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(AppError::config_path(path, "settings file does not exist"));
        }
        log::debug!("Loading settings from {}", path.display());
        return load_settings_from(path);
    }

    let candidates = std::iter::once(project_settings_path(project_dir)).chain(user_settings_path());
    for path in candidates {
        if path.exists() {
            log::debug!("Loading settings from {}", path.display());
            return load_settings_from(&path);
        }
    }

    log::debug!("No settings file found, using defaults");
    Ok(Settings::default())
}

/// Pick the host port: explicit argument, then the environment, then the
/// configured default.
pub fn resolve_port(explicit: Option<u16>, env_value: Option<&str>, configured: u16) -> u16 {
    if let Some(port) = explicit {
        return port;
    }

    if let Some(raw) = env_value {
        match raw.trim().parse::<u16>() {
            Ok(port) if port > 0 => return port,
            _ => log::warn!(
                "Ignoring {}={:?}: not a valid port, using {}",
                PORT_ENV_VAR,
                raw,
                configured
            ),
        }
    }

    configured
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_port_wins() {
        assert_eq!(resolve_port(Some(9000), Some("7000"), 8501), 9000);
    }

    #[test]
    fn environment_port_beats_configured_default() {
        assert_eq!(resolve_port(None, Some("7000"), 8501), 7000);
    }

    #[test]
    fn falls_back_to_configured_default() {
        assert_eq!(resolve_port(None, None, FALLBACK_PORT), FALLBACK_PORT);
    }

    #[test]
    fn invalid_environment_port_is_ignored() {
        assert_eq!(resolve_port(None, Some("eighty"), 8501), 8501);
        assert_eq!(resolve_port(None, Some("0"), 8501), 8501);
    }

    #[test]
    fn partial_settings_file_keeps_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(
            dir.path().join("dashctl.toml"),
            "container_name = \"dash-test\"\ngrace_period = \"250ms\"\n",
        )
        .unwrap();

        let settings = load_settings(dir.path(), None).unwrap();
        assert_eq!(settings.container_name, "dash-test");
        assert_eq!(settings.grace_period, Duration::from_millis(250));
        assert_eq!(settings.internal_port, 8501);
        assert_eq!(settings.image, "crypto-dashboard:latest");
    }

    #[test]
    fn missing_explicit_settings_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load_settings(dir.path(), Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn malformed_settings_is_a_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "internal_port = \"not a number\"").unwrap();
        let err = load_settings(dir.path(), Some(&path)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }
}
