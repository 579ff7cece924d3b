//! Environment file provisioning.
//!
//! The environment file is created once from a template and never touched
//! again: existing files are neither read nor rewritten.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write as _};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{AppError, Result};

/// Result of [`ensure_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionOutcome {
    AlreadyPresent,
    Created,
}

/// Value written for a template key.
#[derive(Debug, Clone, Copy)]
enum TemplateValue {
    /// Credential the user has to supply.
    Placeholder,
    /// Operational default that works as-is.
    Default(&'static str),
    /// The image's internal service port.
    ServicePort,
}

struct TemplateSection {
    title: &'static str,
    entries: &'static [(&'static str, TemplateValue)],
}

const TEMPLATE: &[TemplateSection] = &[
    TemplateSection {
        title: "Data providers",
        entries: &[
            ("COVALENT_API_KEY", TemplateValue::Placeholder),
            ("CRYPTOPANIC_API_KEY", TemplateValue::Placeholder),
        ],
    },
    TemplateSection {
        title: "Exchanges (optional)",
        entries: &[
            ("BINANCE_API_KEY", TemplateValue::Placeholder),
            ("BINANCE_SECRET", TemplateValue::Placeholder),
            ("BYBIT_API_KEY", TemplateValue::Placeholder),
            ("BYBIT_SECRET", TemplateValue::Placeholder),
            ("OKX_API_KEY", TemplateValue::Placeholder),
            ("OKX_SECRET", TemplateValue::Placeholder),
            ("OKX_PASSPHRASE", TemplateValue::Placeholder),
        ],
    },
    TemplateSection {
        title: "Social (optional)",
        entries: &[
            ("TWITTER_BEARER_TOKEN", TemplateValue::Placeholder),
            ("REDDIT_CLIENT_ID", TemplateValue::Placeholder),
            ("REDDIT_CLIENT_SECRET", TemplateValue::Placeholder),
        ],
    },
    TemplateSection {
        title: "Notifications (optional)",
        entries: &[
            ("TELEGRAM_TOKEN", TemplateValue::Placeholder),
            ("TELEGRAM_CHAT_ID", TemplateValue::Placeholder),
            ("SMTP_SERVER", TemplateValue::Default("smtp.gmail.com")),
            ("SMTP_PORT", TemplateValue::Default("587")),
            ("EMAIL_USER", TemplateValue::Placeholder),
            ("EMAIL_PASSWORD", TemplateValue::Placeholder),
            ("RECIPIENT_EMAIL", TemplateValue::Placeholder),
        ],
    },
    TemplateSection {
        title: "Dashboard",
        entries: &[
            ("DEFAULT_COINS", TemplateValue::Default("BTC,ETH,SOL")),
            ("AUTO_REFRESH_INTERVAL", TemplateValue::Default("60")),
            ("DATA_DIR", TemplateValue::Default("/app/data")),
            (
                "DATABASE_URL",
                TemplateValue::Default("sqlite:////app/data/dashboard.db"),
            ),
            ("PORT", TemplateValue::ServicePort),
        ],
    },
];

/// Every key the template writes, in file order.
#[cfg(test)]
pub fn template_keys() -> impl Iterator<Item = &'static str> {
    TEMPLATE
        .iter()
        .flat_map(|section| section.entries.iter().map(|(key, _)| *key))
}

/// Render the environment template.
pub fn render_template(service_port: u16) -> String {
    let mut out = String::from(
        "# Crypto dashboard environment\n\
         # Replace the your_..._here placeholders with real credentials.\n",
    );

    for section in TEMPLATE {
        out.push_str(&format!("\n# {}\n", section.title));
        for (key, value) in section.entries {
            let value = match value {
                TemplateValue::Placeholder => format!("your_{}_here", key.to_ascii_lowercase()),
                TemplateValue::Default(v) => (*v).to_string(),
                TemplateValue::ServicePort => service_port.to_string(),
            };
            out.push_str(&format!("{}={}\n", key, value));
        }
    }
    out
}

fn staging_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "env".to_string());
    path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()))
}

fn write_staged(staged: &Path, content: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(staged)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()
}

/// Move the staged file into place without replacing an existing file.
fn publish_staged(staged: &Path, path: &Path) -> std::io::Result<ProvisionOutcome> {
    match fs::hard_link(staged, path) {
        Ok(()) => Ok(ProvisionOutcome::Created),
        Err(e) if e.kind() == IoErrorKind::AlreadyExists => Ok(ProvisionOutcome::AlreadyPresent),
        Err(e) => {
            // Some file systems refuse hard links; rename is still atomic.
            log::debug!("hard link into place failed ({}), falling back to rename", e);
            if path.exists() {
                return Ok(ProvisionOutcome::AlreadyPresent);
            }
            fs::rename(staged, path)?;
            Ok(ProvisionOutcome::Created)
        }
    }
}

/// Make sure the environment file exists, creating it from the template if absent.
///
/// The template becomes visible in one step: either the whole file exists
/// afterwards or nothing was written.
pub fn ensure_config(path: &Path, service_port: u16) -> Result<ProvisionOutcome> {
    if path.exists() {
        log::debug!("Environment file {} already present", path.display());
        return Ok(ProvisionOutcome::AlreadyPresent);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| AppError::config_path(parent, e.to_string()))?;
    }

    let staged = staging_path(path);
    let content = render_template(service_port);

    let result = write_staged(&staged, &content).and_then(|()| publish_staged(&staged, path));
    if staged.exists() {
        if let Err(e) = fs::remove_file(&staged) {
            log::warn!("Failed to remove staging file {}: {}", staged.display(), e);
        }
    }

    let outcome = result.map_err(|e| AppError::config_path(path, e.to_string()))?;
    if outcome == ProvisionOutcome::Created {
        log::info!("Created environment template at {}", path.display());
    }
    Ok(outcome)
}
