//! Container runtime access.

mod docker;
mod health;
mod inspect;

#[cfg(test)]
pub(crate) mod fake;

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AppError, Result};

pub use docker::DockerCli;
pub use health::EndpointProbe;
pub use inspect::parse_inspect;

/// Restart policy requested for the instance.
pub const RESTART_POLICY: &str = "unless-stopped";

/// Timeout for the HTTP endpoint probe.
const ENDPOINT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Image build request.
#[derive(Debug, Clone)]
pub struct BuildSpec {
    pub image: String,
    pub context: PathBuf,
    pub dockerfile: PathBuf,
    pub no_cache: bool,
}

/// Container creation request.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub name: String,
    pub image: String,
    pub host_port: u16,
    pub internal_port: u16,
    pub env_file: PathBuf,
    pub restart_policy: &'static str,
}

/// One published port as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortBinding {
    pub container_port: u16,
    pub protocol: String,
    pub host_ip: String,
    pub host_port: u16,
}

/// Point-in-time view of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    /// Raw runtime state, e.g. "running" or "exited".
    pub state: String,
    /// Health check status if the image defines one.
    pub health: Option<String>,
    pub exit_code: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub ports: Vec<PortBinding>,
}

impl ContainerInfo {
    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }

    /// Host port published for `internal_port`, or the first published port.
    pub fn published_port(&self, internal_port: u16) -> Option<u16> {
        self.ports
            .iter()
            .find(|b| b.container_port == internal_port && b.protocol == "tcp")
            .or_else(|| self.ports.first())
            .map(|b| b.host_port)
    }
}

/// Primitives the lifecycle controller needs from a container engine.
///
/// Calls are issued one at a time; implementations need no internal locking.
#[allow(async_fn_in_trait)]
pub trait ContainerRuntime {
    /// Fail with an environment error if the engine cannot be reached.
    async fn ping(&self) -> Result<()>;

    async fn image_exists(&self, image: &str) -> Result<bool>;

    async fn build_image(&self, spec: &BuildSpec) -> Result<()>;

    /// Look up a container by name; `None` if it does not exist.
    async fn inspect(&self, name: &str) -> Result<Option<ContainerInfo>>;

    async fn stop(&self, name: &str) -> Result<()>;

    async fn remove(&self, name: &str) -> Result<()>;

    /// Create and start a container, returning its id.
    async fn run(&self, spec: &RunSpec) -> Result<String>;

    /// Stream container output until it ends or the user interrupts.
    async fn follow_logs(&self, name: &str, tail: Option<u32>) -> Result<()>;

    /// Whether nothing on the host is listening on `port`.
    fn host_port_available(&self, port: u16) -> bool;
}

/// Check that nothing on the host already holds `port`.
///
/// Only "address in use" is conclusive. Other bind failures, such as a
/// privileged port for a non-root user, are left for the engine to decide.
pub fn check_port_available(port: u16) -> Result<()> {
    match std::net::TcpListener::bind(("0.0.0.0", port)) {
        Ok(_) => Ok(()),
        Err(e) => bind_failure(port, &e),
    }
}

fn bind_failure(port: u16, err: &std::io::Error) -> Result<()> {
    if err.kind() == std::io::ErrorKind::AddrInUse {
        return Err(AppError::port_occupied(port));
    }
    log::debug!("Could not probe port {} ({}), deferring to the runtime", port, err);
    Ok(())
}
