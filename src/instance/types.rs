//! Instance-related type definitions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::provision::ProvisionOutcome;
use crate::runtime::ContainerInfo;

/// Lifecycle state of the managed container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Absent,
    Starting,
    Running,
    Healthy,
    Unhealthy,
    Stopped,
    /// The runtime could not be asked, or answered with something unexpected.
    Unknown,
}

impl InstanceState {
    /// Classify what the runtime reports for a container.
    pub fn from_container(info: Option<&ContainerInfo>) -> Self {
        let Some(info) = info else {
            return Self::Absent;
        };

        match info.state.as_str() {
            "running" => match info.health.as_deref() {
                Some("healthy") => Self::Healthy,
                Some("unhealthy") => Self::Unhealthy,
                Some("starting") => Self::Starting,
                _ => Self::Running,
            },
            "created" | "restarting" => Self::Starting,
            "exited" | "dead" | "paused" | "removing" => Self::Stopped,
            _ => Self::Unknown,
        }
    }

    /// Whether the container process is up, healthy or not.
    pub fn is_up(self) -> bool {
        matches!(
            self,
            Self::Starting | Self::Running | Self::Healthy | Self::Unhealthy
        )
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Absent => "absent",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Status information for the instance.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceStatus {
    pub name: String,
    pub state: InstanceState,
    /// State string exactly as the runtime reported it.
    pub runtime_state: Option<String>,
    pub health: Option<String>,
    /// Published host port; only resolved while the container is up.
    pub port: Option<u16>,
    pub started_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i64>,
    pub endpoint_responding: Option<bool>,
    /// Why the state is unknown, when it is.
    pub error: Option<String>,
}

impl InstanceStatus {
    pub fn from_container(name: &str, info: Option<&ContainerInfo>, internal_port: u16) -> Self {
        let state = InstanceState::from_container(info);
        Self {
            name: name.to_string(),
            state,
            runtime_state: info.map(|i| i.state.clone()),
            health: info.and_then(|i| i.health.clone()),
            port: info
                .filter(|_| state.is_up())
                .and_then(|i| i.published_port(internal_port)),
            started_at: info.and_then(|i| i.started_at),
            exit_code: info
                .filter(|_| state == InstanceState::Stopped)
                .and_then(|i| i.exit_code),
            endpoint_responding: None,
            error: None,
        }
    }

    pub fn unknown(name: &str, error: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            state: InstanceState::Unknown,
            runtime_state: None,
            health: None,
            port: None,
            started_at: None,
            exit_code: None,
            endpoint_responding: None,
            error: Some(error.into()),
        }
    }

    /// Time since the container started, if it is up.
    pub fn uptime(&self) -> Option<std::time::Duration> {
        let started = self.started_at.filter(|_| self.state.is_up())?;
        (Utc::now() - started).to_std().ok()
    }
}

/// What `run` and `restart` did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub container_id: String,
    pub port: u16,
    pub provision: ProvisionOutcome,
    pub built_image: bool,
    /// An earlier container with the same name was torn down.
    pub replaced: bool,
    /// State sampled after start.
    pub status: InstanceStatus,
}

impl RunReport {
    /// Whether the sample saw the container up.
    pub fn confirmed(&self) -> bool {
        self.status.state.is_up()
    }
}
