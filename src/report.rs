//! Operation outcomes and their console rendering.
//!
//! Operations produce an [`Outcome`]; only this module decides how it looks.

use colored::Colorize as _;
use serde::Serialize;

use crate::error::AppError;
use crate::instance::{InstanceState, InstanceStatus, RunReport};
use crate::provision::ProvisionOutcome;

const PLACEHOLDER_WARNING: &str =
    "created environment file with placeholder values; edit it before relying on data feeds and alerts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Build,
    Run,
    Stop,
    Restart,
    Status,
    Logs,
    Init,
}

/// Structured result of one operation.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub operation: Operation,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<InstanceState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

fn dashboard_url(port: u16) -> String {
    format!("http://localhost:{}", port)
}

impl Outcome {
    pub fn new(operation: Operation, message: impl Into<String>) -> Self {
        Self {
            operation,
            success: true,
            message: message.into(),
            state: None,
            runtime_state: None,
            port: None,
            url: None,
            health: None,
            endpoint: None,
            uptime: None,
            warnings: Vec::new(),
            hints: Vec::new(),
        }
    }

    pub fn with_provision(mut self, provision: ProvisionOutcome, env_file: &std::path::Path) -> Self {
        if provision == ProvisionOutcome::Created {
            self.warnings.push(format!("{} ({})", PLACEHOLDER_WARNING, env_file.display()));
        }
        self
    }

    fn with_status(mut self, status: &InstanceStatus) -> Self {
        self.state = Some(status.state);
        self.runtime_state = status.runtime_state.clone();
        self.health = status.health.clone();
        if let Some(port) = status.port {
            self.port = Some(port);
            self.url = Some(dashboard_url(port));
        }
        self.endpoint = status
            .endpoint_responding
            .map(|ok| String::from(if ok { "responding" } else { "not responding" }));
        self.uptime = status.uptime().map(|d| {
            humantime::format_duration(std::time::Duration::from_secs(d.as_secs())).to_string()
        });
        self
    }

    pub fn built(image: &str) -> Self {
        Self::new(Operation::Build, format!("built image {}", image))
    }

    pub fn stopped(name: &str, found: bool) -> Self {
        let message = if found {
            format!("stopped and removed {}", name)
        } else {
            format!("{} is not running", name)
        };
        let mut outcome = Self::new(Operation::Stop, message);
        outcome.state = Some(InstanceState::Absent);
        outcome
    }

    pub fn started(operation: Operation, report: &RunReport, env_file: &std::path::Path) -> Self {
        let mut outcome = Self::new(operation, String::new())
            .with_status(&report.status)
            .with_provision(report.provision, env_file);

        outcome.port = Some(report.port);
        outcome.url = Some(dashboard_url(report.port));
        outcome.success = report.confirmed();

        if report.confirmed() {
            outcome.message = format!(
                "{} is {} on {}",
                report.status.name,
                report.status.state,
                dashboard_url(report.port)
            );
        } else {
            outcome.message = format!("{} started, status unknown — check logs", report.status.name);
            outcome.hints.push("inspect the container output with `dashctl logs`".to_string());
        }
        if report.status.state == InstanceState::Unhealthy {
            outcome
                .warnings
                .push("the runtime health check reports the dashboard unhealthy".to_string());
        }
        if report.status.state == InstanceState::Starting {
            outcome
                .hints
                .push("health check still converging; poll `dashctl status`".to_string());
        }
        outcome
    }

    pub fn status(status: &InstanceStatus) -> Self {
        let message = match status.state {
            InstanceState::Absent => format!("{} does not exist", status.name),
            InstanceState::Unknown => format!("{} status unknown", status.name),
            state => format!("{} is {}", status.name, state),
        };
        let mut outcome = Self::new(Operation::Status, message).with_status(status);
        if let Some(error) = &status.error {
            outcome.warnings.push(error.clone());
        }
        if status.state == InstanceState::Absent {
            outcome.hints.push("start it with `dashctl run`".to_string());
        }
        outcome
    }

    pub fn detached(name: &str) -> Self {
        Self::new(Operation::Logs, format!("detached from {} logs", name))
    }

    pub fn initialized(provision: ProvisionOutcome, env_file: &std::path::Path) -> Self {
        let message = match provision {
            ProvisionOutcome::Created => format!("created {}", env_file.display()),
            ProvisionOutcome::AlreadyPresent => format!("{} already present", env_file.display()),
        };
        Self::new(Operation::Init, message).with_provision(provision, env_file)
    }
}

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

/// Render an outcome for stdout.
pub fn render(outcome: &Outcome, format: Format) -> String {
    match format {
        Format::Json => serde_json::to_string_pretty(outcome)
            .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e)),
        Format::Text => render_text(outcome),
    }
}

fn render_text(outcome: &Outcome) -> String {
    let mut lines = Vec::new();

    let mark = if outcome.success {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    lines.push(format!("{} {}", mark, outcome.message));

    let mut field = |label: &str, value: String| {
        lines.push(format!("  {:<9}{}", format!("{}:", label).dimmed(), value));
    };
    if let Some(state) = outcome.state {
        let state_text = match state {
            InstanceState::Healthy | InstanceState::Running => state.to_string().green(),
            InstanceState::Starting | InstanceState::Unknown => state.to_string().yellow(),
            InstanceState::Unhealthy => state.to_string().red(),
            InstanceState::Stopped | InstanceState::Absent => state.to_string().normal(),
        };
        field("state", state_text.to_string());
    }
    if let Some(raw) = &outcome.runtime_state {
        field("runtime", raw.clone());
    }
    if let Some(health) = &outcome.health {
        field("health", health.clone());
    }
    if let Some(url) = &outcome.url {
        field("url", url.clone());
    }
    if let Some(endpoint) = &outcome.endpoint {
        field("endpoint", endpoint.clone());
    }
    if let Some(uptime) = &outcome.uptime {
        field("uptime", uptime.clone());
    }

    for warning in &outcome.warnings {
        lines.push(format!("{} {}", "!".yellow().bold(), warning.yellow()));
    }
    for hint in &outcome.hints {
        lines.push(format!("  {}", hint.dimmed()));
    }
    lines.join("\n")
}

/// Render a fatal error for stderr.
pub fn render_error(operation: Option<Operation>, err: &AppError, format: Format) -> String {
    match format {
        Format::Json => {
            let body = serde_json::json!({
                "operation": operation,
                "success": false,
                "error": err,
                "hint": err.hint(),
            });
            serde_json::to_string_pretty(&body).unwrap_or_else(|_| err.to_string())
        }
        Format::Text => {
            let mut out = format!("{} {}", "✗".red().bold(), err.to_string().red());
            if let Some(hint) = err.hint() {
                out.push_str(&format!("\n  {}", hint.dimmed()));
            }
            out
        }
    }
}
