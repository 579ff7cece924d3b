mod cli;
mod commands;
mod config;
mod error;
mod instance;
mod logging;
mod paths;
mod provision;
mod report;
mod runtime;

use std::io::IsTerminal as _;

use clap::{CommandFactory as _, Parser as _};

use cli::Cli;
pub use error::{AppError, ErrorKind, Result};
use report::Format;

/// Color override for a stream: never color what is not a terminal,
/// otherwise defer to the usual environment checks.
fn color_override(is_terminal: bool) -> Option<bool> {
    if is_terminal {
        None
    } else {
        Some(false)
    }
}

fn apply_color(is_terminal: bool) {
    match color_override(is_terminal) {
        Some(enabled) => colored::control::set_override(enabled),
        None => colored::control::unset_override(),
    }
}

/// Parse arguments, run one operation and return the process exit status.
pub fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return e.exit_code();
        }
    };

    logging::init(cli.verbose);

    let Some(command) = cli.command.clone() else {
        let _ = Cli::command().print_help();
        println!();
        return 0;
    };

    let format = if cli.json { Format::Json } else { Format::Text };
    let operation = commands::operation(&command);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let err = AppError::from(e);
            apply_color(std::io::stderr().is_terminal());
            eprintln!("{}", report::render_error(Some(operation), &err, format));
            return err.exit_code();
        }
    };

    match runtime.block_on(commands::dispatch(&cli, &command)) {
        Ok(outcome) => {
            apply_color(std::io::stdout().is_terminal());
            println!("{}", report::render(&outcome, format));
            0
        }
        Err(e) => {
            log::debug!("{:?} failed: {:?}", operation, e);
            apply_color(std::io::stderr().is_terminal());
            eprintln!("{}", report::render_error(Some(operation), &e, format));
            e.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirected_streams_are_never_colored() {
        assert_eq!(color_override(false), Some(false));
        assert_eq!(color_override(true), None);
    }
}
