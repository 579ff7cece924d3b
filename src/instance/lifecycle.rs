//! Instance lifecycle management (build/run/stop/restart/status/logs).
//!
//! The controller keeps no state of its own: every operation asks the runtime
//! what exists before changing anything, and at most one container carrying
//! the configured name is ever left behind.

use std::time::Duration;

use tokio::time::Instant;

use super::types::{InstanceState, InstanceStatus, RunReport};
use crate::config::Settings;
use crate::error::{AppError, ErrorKind, Result};
use crate::paths::ProjectLayout;
use crate::provision::{ensure_config, ProvisionOutcome};
use crate::runtime::{BuildSpec, ContainerRuntime, EndpointProbe, RunSpec, RESTART_POLICY};

const READY_POLL_START: Duration = Duration::from_millis(500);
const READY_POLL_MAX: Duration = Duration::from_secs(2);

/// Drives the single named instance through a [`ContainerRuntime`].
pub struct Lifecycle<R> {
    runtime: R,
    settings: Settings,
    layout: ProjectLayout,
    probe: Option<EndpointProbe>,
}

#[allow(clippy::future_not_send)]
impl<R: ContainerRuntime> Lifecycle<R> {
    pub fn new(runtime: R, settings: Settings, layout: ProjectLayout) -> Result<Self> {
        let probe = if settings.probe_endpoint {
            Some(EndpointProbe::new(&settings.health_path)?)
        } else {
            None
        };
        Ok(Self {
            runtime,
            settings,
            layout,
            probe,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    #[cfg(test)]
    pub(crate) fn runtime(&self) -> &R {
        &self.runtime
    }

    fn name(&self) -> &str {
        &self.settings.container_name
    }

    /// Create the environment file from the template if it is missing.
    pub fn provision(&self) -> Result<ProvisionOutcome> {
        ensure_config(&self.layout.env_file, self.settings.internal_port)
    }

    /// Build the image. Failures are reported as-is and never retried.
    pub async fn build(&self, no_cache: bool) -> Result<()> {
        self.runtime.ping().await?;

        let spec = BuildSpec {
            image: self.settings.image.clone(),
            context: self.layout.build_context.clone(),
            dockerfile: self.layout.dockerfile.clone(),
            no_cache,
        };
        self.runtime.build_image(&spec).await?;
        log::info!("Built image {}", spec.image);
        Ok(())
    }

    /// Stop and remove the named container if there is one.
    ///
    /// A container that disappears between the lookup and the teardown counts
    /// as removed. Returns whether a container was found.
    pub async fn stop_existing(&self) -> Result<bool> {
        let name = self.name();
        let Some(existing) = self.runtime.inspect(name).await? else {
            log::debug!("No existing container named {}", name);
            return Ok(false);
        };

        log::info!(
            "Stopping existing container {} ({}, {})",
            name,
            existing.id,
            existing.state
        );
        tolerate_not_found(self.runtime.stop(name).await, "stop", name)?;
        tolerate_not_found(self.runtime.remove(name).await, "remove", name)?;
        Ok(true)
    }

    /// Tear the instance down. Stopping an absent instance succeeds.
    pub async fn stop(&self) -> Result<bool> {
        self.runtime.ping().await?;
        self.stop_existing().await
    }

    /// Replace whatever runs under the instance name with a fresh container.
    ///
    /// `wait` of `None` samples the state once after the grace period;
    /// `Some(timeout)` polls until the instance is ready, stops, or the
    /// timeout passes.
    pub async fn run(&self, port: u16, wait: Option<Duration>) -> Result<RunReport> {
        let provision = self.provision()?;
        self.runtime.ping().await?;

        let built_image = if self.runtime.image_exists(&self.settings.image).await? {
            false
        } else {
            log::info!("Image {} not found, building it first", self.settings.image);
            self.build(false).await?;
            true
        };

        let replaced = self.stop_existing().await?;

        if !self.runtime.host_port_available(port) {
            return Err(AppError::port_occupied(port));
        }

        let spec = RunSpec {
            name: self.name().to_string(),
            image: self.settings.image.clone(),
            host_port: port,
            internal_port: self.settings.internal_port,
            env_file: self.layout.env_file.clone(),
            restart_policy: RESTART_POLICY,
        };
        let container_id = self.runtime.run(&spec).await.map_err(|e| match e.kind() {
            ErrorKind::Environment | ErrorKind::StartFailed => e,
            _ => AppError::start_failed(&spec.name, e.to_string()),
        })?;
        log::info!(
            "Started {} ({}) on host port {}",
            spec.name,
            container_id,
            port
        );

        let status = match wait {
            None => {
                tokio::time::sleep(self.settings.grace_period).await;
                self.sample().await
            }
            Some(timeout) => self.wait_until_ready(timeout).await,
        };

        Ok(RunReport {
            container_id,
            port,
            provision,
            built_image,
            replaced,
            status,
        })
    }

    /// Exactly `stop_existing` followed by `run`.
    pub async fn restart(&self, port: u16, wait: Option<Duration>) -> Result<RunReport> {
        let provision = self.provision()?;
        self.runtime.ping().await?;
        let stopped = self.stop_existing().await?;

        let mut report = self.run(port, wait).await?;
        if provision == ProvisionOutcome::Created {
            report.provision = ProvisionOutcome::Created;
        }
        report.replaced |= stopped;
        Ok(report)
    }

    /// Current state as reported by the runtime. Never fails: an unreachable
    /// runtime yields [`InstanceState::Unknown`].
    pub async fn status(&self) -> InstanceStatus {
        let mut status = self.sample().await;

        if let (Some(probe), Some(port)) = (&self.probe, status.port) {
            status.endpoint_responding = Some(probe.check(port).await);
        }
        status
    }

    /// Attach to the container output until it ends or the user interrupts.
    pub async fn logs(&self, tail: Option<u32>) -> Result<()> {
        self.runtime.ping().await?;

        let name = self.name();
        if self.runtime.inspect(name).await?.is_none() {
            return Err(AppError::container_not_found(name));
        }

        self.runtime
            .follow_logs(name, tail.or(self.settings.log_tail))
            .await
    }

    async fn sample(&self) -> InstanceStatus {
        let name = self.name();
        match self.runtime.inspect(name).await {
            Ok(info) => {
                InstanceStatus::from_container(name, info.as_ref(), self.settings.internal_port)
            }
            Err(e) => {
                log::warn!("Could not query {}: {}", name, e);
                InstanceStatus::unknown(name, e.to_string())
            }
        }
    }

    /// Poll with backoff until healthy (or running without a health check),
    /// stopped, or timed out. Returns the last sample.
    async fn wait_until_ready(&self, timeout: Duration) -> InstanceStatus {
        let start = Instant::now();
        let mut interval = READY_POLL_START;

        loop {
            let status = self.sample().await;
            let settled = match status.state {
                InstanceState::Healthy | InstanceState::Unhealthy => true,
                InstanceState::Running => status.health.is_none(),
                InstanceState::Stopped | InstanceState::Absent => true,
                InstanceState::Starting | InstanceState::Unknown => false,
            };
            if settled {
                return status;
            }

            if start.elapsed() >= timeout {
                log::warn!(
                    "{} still {} after {}s",
                    self.name(),
                    status.state,
                    timeout.as_secs()
                );
                return status;
            }

            tokio::time::sleep(interval).await;
            interval = (interval * 2).min(READY_POLL_MAX);
        }
    }
}

fn tolerate_not_found(result: Result<()>, step: &str, name: &str) -> Result<()> {
    match result {
        Err(e) if e.kind() == ErrorKind::ContainerNotFound => {
            log::debug!("{} {}: container already gone", step, name);
            Ok(())
        }
        other => other,
    }
}
