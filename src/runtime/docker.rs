//! `ContainerRuntime` backed by the `docker` command-line client.

use std::collections::VecDeque;
use std::io::Write as _;
use std::process::{ExitStatus, Output, Stdio};

use tokio::io::{AsyncBufReadExt as _, BufReader};
use tokio::process::Command;

use super::{check_port_available, parse_inspect, BuildSpec, ContainerInfo, ContainerRuntime, RunSpec};
use crate::error::{AppError, ErrorKind, Result};

/// Lines of build stderr kept for the error message.
const BUILD_ERROR_TAIL: usize = 20;

const DAEMON_UNREACHABLE_MARKERS: &[&str] = &[
    "Cannot connect to the Docker daemon",
    "Is the docker daemon running",
    "error during connect",
    "permission denied while trying to connect",
];

const NOT_FOUND_MARKERS: &[&str] = &["No such container", "No such object", "No such image"];

fn is_daemon_unreachable(stderr: &str) -> bool {
    DAEMON_UNREACHABLE_MARKERS.iter().any(|m| stderr.contains(m))
}

fn is_not_found(stderr: &str) -> bool {
    NOT_FOUND_MARKERS.iter().any(|m| stderr.contains(m))
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Map a failed invocation to an error. `name` turns "no such container"
/// into a not-found error.
fn classify_failure(step: &str, name: Option<&str>, stderr: &str) -> AppError {
    if is_daemon_unreachable(stderr) {
        return AppError::environment(stderr);
    }
    if let Some(name) = name {
        if is_not_found(stderr) {
            return AppError::container_not_found(name);
        }
    }
    let detail = if stderr.is_empty() { "(no output)" } else { stderr };
    AppError::runtime(format!("{} failed: {}", step, detail))
}

/// A follower ended by a signal was interrupted, not broken.
fn logs_exit(status: ExitStatus, name: &str) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt as _;
        if let Some(signal) = status.signal() {
            log::info!("docker logs for {} ended by signal {}, detaching", name, signal);
            return Ok(());
        }
    }
    Err(AppError::runtime(format!("docker logs exited with {}", status)))
}

/// Drives the local engine through the `docker` binary.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, err: &std::io::Error) -> AppError {
        if err.kind() == std::io::ErrorKind::NotFound {
            AppError::environment(format!("`{}` was not found on PATH", self.binary))
        } else {
            AppError::environment(format!("failed to run `{}`: {}", self.binary, err))
        }
    }

    async fn output(&self, args: &[&str]) -> Result<Output> {
        log::debug!("{} {}", self.binary, args.join(" "));
        self.command()
            .args(args)
            .output()
            .await
            .map_err(|e| self.spawn_error(&e))
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerRuntime for DockerCli {
    async fn ping(&self) -> Result<()> {
        let output = self.output(&["info", "--format", "{{.ServerVersion}}"]).await?;
        if output.status.success() {
            log::debug!(
                "Docker server version {}",
                String::from_utf8_lossy(&output.stdout).trim()
            );
            return Ok(());
        }

        let stderr = stderr_text(&output);
        if stderr.is_empty() {
            Err(AppError::environment("the Docker daemon did not respond"))
        } else {
            Err(AppError::environment(stderr))
        }
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        let output = self
            .output(&["image", "inspect", "--format", "{{.Id}}", image])
            .await?;
        if output.status.success() {
            return Ok(true);
        }

        let stderr = stderr_text(&output);
        if is_not_found(&stderr) {
            Ok(false)
        } else {
            Err(classify_failure("image inspect", None, &stderr))
        }
    }

    async fn build_image(&self, spec: &BuildSpec) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("build")
            .arg("--tag")
            .arg(&spec.image)
            .arg("--file")
            .arg(&spec.dockerfile);
        if spec.no_cache {
            cmd.arg("--no-cache");
        }
        cmd.arg(&spec.context)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        log::info!(
            "Building {} from {}",
            spec.image,
            spec.context.display()
        );
        let mut child = cmd.spawn().map_err(|e| self.spawn_error(&e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::runtime("failed to capture build stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::runtime("failed to capture build stderr"))?;

        // Build progress goes to our stderr so stdout stays reserved for results.
        let forward_stdout = async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let _ = writeln!(std::io::stderr(), "{}", line);
            }
        };
        let forward_stderr = async move {
            let mut tail = VecDeque::with_capacity(BUILD_ERROR_TAIL);
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let _ = writeln!(std::io::stderr(), "{}", line);
                if tail.len() == BUILD_ERROR_TAIL {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail
        };

        let ((), tail) = tokio::join!(forward_stdout, forward_stderr);
        let status = child
            .wait()
            .await
            .map_err(|e| AppError::runtime(format!("failed to wait for build: {}", e)))?;

        if status.success() {
            return Ok(());
        }

        let detail = tail.into_iter().collect::<Vec<_>>().join("\n");
        if is_daemon_unreachable(&detail) {
            return Err(AppError::environment(detail));
        }
        if detail.trim().is_empty() {
            Err(AppError::build(format!("docker build exited with {}", status)))
        } else {
            Err(AppError::build(detail))
        }
    }

    async fn inspect(&self, name: &str) -> Result<Option<ContainerInfo>> {
        let output = self.output(&["inspect", "--type", "container", name]).await?;
        if output.status.success() {
            return parse_inspect(&String::from_utf8_lossy(&output.stdout));
        }

        match classify_failure("inspect", Some(name), &stderr_text(&output)) {
            e if e.kind() == ErrorKind::ContainerNotFound => Ok(None),
            e => Err(e),
        }
    }

    async fn stop(&self, name: &str) -> Result<()> {
        let output = self.output(&["stop", name]).await?;
        if output.status.success() {
            return Ok(());
        }
        Err(classify_failure("stop", Some(name), &stderr_text(&output)))
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let output = self.output(&["rm", name]).await?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = stderr_text(&output);
        if stderr.contains("is already in progress") {
            log::debug!("Removal of {} already in progress", name);
            return Ok(());
        }
        Err(classify_failure("remove", Some(name), &stderr))
    }

    async fn run(&self, spec: &RunSpec) -> Result<String> {
        let publish = format!("{}:{}", spec.host_port, spec.internal_port);
        let env_file = spec.env_file.to_string_lossy();
        let args = [
            "run",
            "--detach",
            "--name",
            spec.name.as_str(),
            "--restart",
            spec.restart_policy,
            "--publish",
            publish.as_str(),
            "--env-file",
            env_file.as_ref(),
            spec.image.as_str(),
        ];

        let output = self.output(&args).await?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }

        let stderr = stderr_text(&output);
        if is_daemon_unreachable(&stderr) {
            return Err(AppError::environment(stderr));
        }
        Err(AppError::start_failed(&spec.name, stderr))
    }

    async fn follow_logs(&self, name: &str, tail: Option<u32>) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("logs").arg("--follow");
        if let Some(n) = tail {
            cmd.arg("--tail").arg(n.to_string());
        }
        cmd.arg(name)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn().map_err(|e| self.spawn_error(&e))?;

        // Ctrl-C reaches the whole foreground group, so `docker logs` may die
        // from the same signal; both paths count as detaching.
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, detaching from {} logs", name);
                if let Err(e) = child.kill().await {
                    log::debug!("docker logs already gone: {}", e);
                }
                Ok(())
            }
            status = child.wait() => {
                let status = status
                    .map_err(|e| AppError::runtime(format!("failed to wait for logs: {}", e)))?;
                logs_exit(status, name)
            }
        }
    }

    fn host_port_available(&self, port: u16) -> bool {
        check_port_available(port).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemon_down_is_environment_error() {
        let err = classify_failure(
            "stop",
            Some("crypto-dashboard"),
            "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?",
        );
        assert_eq!(err.kind(), ErrorKind::Environment);
    }

    #[test]
    fn missing_container_is_not_found() {
        let err = classify_failure(
            "stop",
            Some("crypto-dashboard"),
            "Error response from daemon: No such container: crypto-dashboard",
        );
        assert_eq!(err.kind(), ErrorKind::ContainerNotFound);
    }

    #[test]
    fn other_failures_are_runtime_errors() {
        let err = classify_failure("remove", Some("x"), "");
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert!(err.to_string().contains("(no output)"));
    }

    #[cfg(unix)]
    #[test]
    fn signalled_follower_detaches() {
        use std::os::unix::process::ExitStatusExt as _;

        // raw wait status 2: terminated by SIGINT
        assert!(logs_exit(ExitStatus::from_raw(2), "crypto-dashboard").is_ok());
        assert!(logs_exit(ExitStatus::from_raw(0), "crypto-dashboard").is_ok());

        // raw wait status 1 << 8: exit code 1
        let err = logs_exit(ExitStatus::from_raw(1 << 8), "crypto-dashboard").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn follower_killed_by_signal_is_not_an_error() {
        use std::os::unix::fs::PermissionsExt as _;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("docker");
        std::fs::write(&script, "#!/bin/sh\nkill -KILL $$\nsleep 5\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let docker = DockerCli::with_binary(script.to_string_lossy());
        docker.follow_logs("crypto-dashboard", None).await.unwrap();
    }

    #[tokio::test]
    async fn missing_binary_is_environment_error() {
        let docker = DockerCli::with_binary("dashctl-test-no-such-docker-binary");
        let err = docker.ping().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Environment);
    }
}
