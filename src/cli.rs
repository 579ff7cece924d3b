use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[command(
    name = "dashctl",
    version,
    about = "Build, run and inspect the crypto dashboard container"
)]
pub struct Cli {
    /// Project directory holding the Dockerfile and environment file
    #[arg(long, global = true, default_value = ".")]
    pub project_dir: PathBuf,

    /// Settings file (default: <project-dir>/dashctl.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Build the dashboard image
    Build {
        /// Do not use the build cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Replace any existing container with a fresh one
    Run(RunArgs),
    /// Stop and remove the container
    Stop,
    /// Stop, remove and start the container again
    Restart(RunArgs),
    /// Show container state and published port
    Status,
    /// Follow container output until interrupted
    Logs {
        /// Number of lines to show from the end of the logs
        #[arg(long)]
        tail: Option<u32>,
    },
    /// Create the environment file from the template if it is missing
    Init,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Host port to publish (default: $DASHBOARD_PORT, then the configured default)
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Wait until the health check passes, up to DURATION (default: startup_timeout)
    #[arg(long, value_name = "DURATION", num_args = 0..=1, default_missing_value = "")]
    pub wait: Option<String>,
}

impl RunArgs {
    /// Parse `--wait`: `None` when absent, the configured timeout when given
    /// without a value.
    pub fn wait_timeout(
        &self,
        default: std::time::Duration,
    ) -> Result<Option<std::time::Duration>, humantime::DurationError> {
        match self.wait.as_deref() {
            None => Ok(None),
            Some("") => Ok(Some(default)),
            Some(raw) => humantime::parse_duration(raw).map(Some),
        }
    }
}
