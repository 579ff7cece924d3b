//! Maps parsed commands onto lifecycle operations.

use std::path::Path;

use crate::cli::{Cli, Command, RunArgs};
use crate::config::{load_settings, resolve_port, Settings, PORT_ENV_VAR};
use crate::error::{AppError, Result};
use crate::instance::Lifecycle;
use crate::paths::ProjectLayout;
use crate::report::{Operation, Outcome};
use crate::runtime::{ContainerRuntime, DockerCli};

pub fn operation(command: &Command) -> Operation {
    match command {
        Command::Build { .. } => Operation::Build,
        Command::Run(_) => Operation::Run,
        Command::Stop => Operation::Stop,
        Command::Restart(_) => Operation::Restart,
        Command::Status => Operation::Status,
        Command::Logs { .. } => Operation::Logs,
        Command::Init => Operation::Init,
    }
}

fn select_port(args: &RunArgs, settings: &Settings) -> u16 {
    let env_value = std::env::var(PORT_ENV_VAR).ok();
    resolve_port(args.port, env_value.as_deref(), settings.default_port)
}

fn wait_timeout(args: &RunArgs, settings: &Settings) -> Result<Option<std::time::Duration>> {
    args.wait_timeout(settings.startup_timeout)
        .map_err(|e| AppError::config(format!("invalid --wait duration: {}", e)))
}

/// Run one command against an already configured lifecycle.
#[allow(clippy::future_not_send)]
pub async fn execute<R: ContainerRuntime>(
    lifecycle: &Lifecycle<R>,
    command: &Command,
) -> Result<Outcome> {
    let settings = lifecycle.settings();
    let env_file = &lifecycle.layout().env_file;

    match command {
        Command::Build { no_cache } => {
            lifecycle.build(*no_cache).await?;
            Ok(Outcome::built(&settings.image))
        }
        Command::Run(args) => {
            let wait = wait_timeout(args, settings)?;
            let report = lifecycle.run(select_port(args, settings), wait).await?;
            Ok(Outcome::started(Operation::Run, &report, env_file))
        }
        Command::Stop => {
            let found = lifecycle.stop().await?;
            Ok(Outcome::stopped(&settings.container_name, found))
        }
        Command::Restart(args) => {
            let wait = wait_timeout(args, settings)?;
            let report = lifecycle.restart(select_port(args, settings), wait).await?;
            Ok(Outcome::started(Operation::Restart, &report, env_file))
        }
        Command::Status => Ok(Outcome::status(&lifecycle.status().await)),
        Command::Logs { tail } => {
            lifecycle.logs(*tail).await?;
            Ok(Outcome::detached(&settings.container_name))
        }
        Command::Init => {
            let provision = lifecycle.provision()?;
            Ok(Outcome::initialized(provision, env_file))
        }
    }
}

/// Settings for `command`. `status` never fails, so it falls back to the
/// defaults and hands back the load error as a warning.
fn settings_for(
    command: &Command,
    project_dir: &Path,
    explicit: Option<&Path>,
) -> Result<(Settings, Option<AppError>)> {
    match load_settings(project_dir, explicit) {
        Ok(settings) => Ok((settings, None)),
        Err(e) if matches!(command, Command::Status) => {
            log::warn!("Using default settings: {}", e);
            Ok((Settings::default(), Some(e)))
        }
        Err(e) => Err(e),
    }
}

/// Load settings for the invocation and run `command` against Docker.
pub async fn dispatch(cli: &Cli, command: &Command) -> Result<Outcome> {
    let (settings, ignored) = settings_for(command, &cli.project_dir, cli.config.as_deref())?;
    let layout = ProjectLayout::new(&cli.project_dir, &settings);
    log::debug!(
        "Managing {} ({}) from {}",
        settings.container_name,
        settings.image,
        layout.root.display()
    );

    let lifecycle = Lifecycle::new(DockerCli::new(), settings, layout)?;
    let mut outcome = execute(&lifecycle, command).await?;
    if let Some(e) = ignored {
        outcome
            .warnings
            .push(format!("settings ignored, using defaults: {}", e));
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::instance::InstanceState;
    use crate::runtime::fake::FakeRuntime;

    fn lifecycle(dir: &tempfile::TempDir) -> Lifecycle<FakeRuntime> {
        let settings = Settings {
            grace_period: Duration::ZERO,
            probe_endpoint: false,
            ..Settings::default()
        };
        let layout = ProjectLayout::new(dir.path(), &settings);
        Lifecycle::new(FakeRuntime::new(), settings, layout).unwrap()
    }

    fn run_args(port: Option<u16>) -> RunArgs {
        RunArgs { port, wait: None }
    }

    #[tokio::test]
    async fn run_then_status_reports_port() {
        let dir = tempfile::TempDir::new().unwrap();
        let lc = lifecycle(&dir);

        let outcome = execute(&lc, &Command::Run(run_args(Some(8080)))).await.unwrap();
        assert_eq!(outcome.port, Some(8080));
        assert!(outcome.warnings.iter().any(|w| w.contains("placeholder")));

        let status = execute(&lc, &Command::Status).await.unwrap();
        assert_eq!(status.state, Some(InstanceState::Running));
        assert_eq!(status.port, Some(8080));
    }

    #[tokio::test]
    async fn status_of_absent_instance_succeeds() {
        let dir = tempfile::TempDir::new().unwrap();
        let lc = lifecycle(&dir);

        let outcome = execute(&lc, &Command::Status).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.state, Some(InstanceState::Absent));
    }

    #[tokio::test]
    async fn stop_of_absent_instance_succeeds() {
        let dir = tempfile::TempDir::new().unwrap();
        let lc = lifecycle(&dir);

        let outcome = execute(&lc, &Command::Stop).await.unwrap();
        assert_eq!(outcome.state, Some(InstanceState::Absent));
        assert!(outcome.message.contains("not running"));
    }

    #[tokio::test]
    async fn logs_of_absent_instance_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let lc = lifecycle(&dir);

        let err = execute(&lc, &Command::Logs { tail: None }).await.unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn init_only_provisions() {
        let dir = tempfile::TempDir::new().unwrap();
        let lc = lifecycle(&dir);

        let outcome = execute(&lc, &Command::Init).await.unwrap();
        assert_eq!(outcome.operation, Operation::Init);
        assert!(dir.path().join(".env").exists());
        assert!(lc.runtime().calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn bad_wait_duration_is_rejected_before_touching_runtime() {
        let dir = tempfile::TempDir::new().unwrap();
        let lc = lifecycle(&dir);
        let args = RunArgs {
            port: Some(8501),
            wait: Some("soon".to_string()),
        };

        let err = execute(&lc, &Command::Run(args)).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
        assert!(lc.runtime().calls.borrow().is_empty());
    }

    #[test]
    fn status_survives_malformed_settings() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("dashctl.toml"), "container_name = [unterminated").unwrap();

        let (settings, ignored) = settings_for(&Command::Status, dir.path(), None).unwrap();
        assert_eq!(settings.container_name, Settings::default().container_name);
        assert_eq!(ignored.unwrap().kind(), crate::error::ErrorKind::Config);

        let err = settings_for(&Command::Run(run_args(None)), dir.path(), None).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn operations_follow_commands() {
        assert_eq!(operation(&Command::Status), Operation::Status);
        assert_eq!(operation(&Command::Restart(run_args(None))), Operation::Restart);
    }
}
