//! In-memory runtime used by the lifecycle tests.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use super::{BuildSpec, ContainerInfo, ContainerRuntime, PortBinding, RunSpec};
use crate::error::{AppError, Result};

/// Behaves like a single-host engine: names are unique, running containers
/// cannot be removed, and published ports stay bound while running.
pub(crate) struct FakeRuntime {
    pub reachable: Cell<bool>,
    pub image_present: Cell<bool>,
    pub build_fails: Cell<bool>,
    pub run_fails: Cell<bool>,
    /// Next `stop` finds the container already gone.
    pub vanish_on_stop: Cell<bool>,
    /// Health status given to new containers, `None` for no health check.
    pub health: RefCell<Option<String>>,
    /// Ports held by something other than our container.
    pub foreign_ports: RefCell<Vec<u16>>,
    pub calls: RefCell<Vec<String>>,
    containers: RefCell<BTreeMap<String, ContainerInfo>>,
    next_id: Cell<u32>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            reachable: Cell::new(true),
            image_present: Cell::new(true),
            build_fails: Cell::new(false),
            run_fails: Cell::new(false),
            vanish_on_stop: Cell::new(false),
            health: RefCell::new(None),
            foreign_ports: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            containers: RefCell::new(BTreeMap::new()),
            next_id: Cell::new(1),
        }
    }

    fn record(&self, call: impl Into<String>) -> Result<()> {
        self.calls.borrow_mut().push(call.into());
        if self.reachable.get() {
            Ok(())
        } else {
            Err(AppError::environment("Cannot connect to the Docker daemon"))
        }
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn container_count(&self) -> usize {
        self.containers.borrow().len()
    }

    pub fn container(&self, name: &str) -> Option<ContainerInfo> {
        self.containers.borrow().get(name).cloned()
    }

    /// Put a running container in place as if started by an earlier run.
    pub fn seed_running(&self, name: &str, host_port: u16, internal_port: u16) {
        let info = ContainerInfo {
            id: format!("seed-{}", name),
            name: name.to_string(),
            image: "crypto-dashboard:latest".to_string(),
            state: "running".to_string(),
            health: None,
            exit_code: Some(0),
            started_at: None,
            ports: vec![PortBinding {
                container_port: internal_port,
                protocol: "tcp".to_string(),
                host_ip: "0.0.0.0".to_string(),
                host_port,
            }],
        };
        self.containers.borrow_mut().insert(name.to_string(), info);
    }

    pub fn set_state(&self, name: &str, state: &str) {
        if let Some(info) = self.containers.borrow_mut().get_mut(name) {
            info.state = state.to_string();
        }
    }
}

impl ContainerRuntime for FakeRuntime {
    async fn ping(&self) -> Result<()> {
        self.record("ping")
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        self.record(format!("image_exists {}", image))?;
        Ok(self.image_present.get())
    }

    async fn build_image(&self, spec: &BuildSpec) -> Result<()> {
        self.record(format!("build {}", spec.image))?;
        if self.build_fails.get() {
            return Err(AppError::build("Dockerfile:3 unknown instruction: RUNN"));
        }
        self.image_present.set(true);
        Ok(())
    }

    async fn inspect(&self, name: &str) -> Result<Option<ContainerInfo>> {
        self.record(format!("inspect {}", name))?;
        Ok(self.container(name))
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.record(format!("stop {}", name))?;
        if self.vanish_on_stop.replace(false) {
            self.containers.borrow_mut().remove(name);
        }
        match self.containers.borrow_mut().get_mut(name) {
            Some(info) => {
                info.state = "exited".to_string();
                Ok(())
            }
            None => Err(AppError::container_not_found(name)),
        }
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.record(format!("remove {}", name))?;
        let mut containers = self.containers.borrow_mut();
        let running = match containers.get(name) {
            Some(info) => info.is_running(),
            None => return Err(AppError::container_not_found(name)),
        };
        if running {
            return Err(AppError::runtime(format!(
                "cannot remove running container {}",
                name
            )));
        }
        containers.remove(name);
        Ok(())
    }

    async fn run(&self, spec: &RunSpec) -> Result<String> {
        self.record(format!("run {} {}", spec.name, spec.host_port))?;
        if self.containers.borrow().contains_key(&spec.name) {
            return Err(AppError::start_failed(
                &spec.name,
                "Conflict. The container name is already in use",
            ));
        }
        if !self.image_present.get() {
            return Err(AppError::start_failed(&spec.name, "image not found"));
        }

        if self.run_fails.get() {
            return Err(AppError::start_failed(&spec.name, "exec format error"));
        }

        let id = format!("c{}", self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);

        let info = ContainerInfo {
            id: id.clone(),
            name: spec.name.clone(),
            image: spec.image.clone(),
            state: "running".to_string(),
            health: self.health.borrow().clone(),
            exit_code: Some(0),
            started_at: Some(chrono::Utc::now()),
            ports: vec![PortBinding {
                container_port: spec.internal_port,
                protocol: "tcp".to_string(),
                host_ip: "0.0.0.0".to_string(),
                host_port: spec.host_port,
            }],
        };
        self.containers.borrow_mut().insert(spec.name.clone(), info);
        Ok(id)
    }

    async fn follow_logs(&self, name: &str, _tail: Option<u32>) -> Result<()> {
        self.record(format!("logs {}", name))
    }

    fn host_port_available(&self, port: u16) -> bool {
        if self.foreign_ports.borrow().contains(&port) {
            return false;
        }
        !self
            .containers
            .borrow()
            .values()
            .filter(|c| c.is_running())
            .any(|c| c.ports.iter().any(|b| b.host_port == port))
    }
}
