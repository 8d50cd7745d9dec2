//! CLI entry point and dispatch logic
//!
//! This module owns the `run()` function which:
//! - Parses CLI arguments and installs the tracing subscriber
//! - Builds CliArgs and discovers Config
//! - Dispatches to command handlers
//! - Handles all error output

use clap::Parser;

use revloop_utils::error::{ConfigError, RevloopError};
use revloop_utils::logging::init_tracing;

use super::args::{Cli, Commands};
use super::commands;
use crate::{CliArgs, Config, ExitCode};

/// Main CLI execution function.
///
/// Prints everything itself, errors included, and returns the exit code to
/// use when it is not zero. main.rs only calls `std::process::exit()`.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("✗ Failed to initialize logging: {e}");
        return Err(ExitCode::INTERNAL);
    }

    let cli_args = CliArgs {
        config_path: cli.config.clone(),
        requirements: cli.requirements.clone(),
        log_dir: cli.log_dir.clone(),
        idle_timeout_secs: cli.idle_timeout,
        verbose: Some(cli.verbose),
    };

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => {
            match err.downcast::<ConfigError>() {
                Ok(config_err) => eprint!("{}", RevloopError::Config(config_err).display_for_user()),
                Err(other) => eprintln!("✗ Failed to load configuration: {other:#}"),
            }
            return Err(ExitCode::CLI_ARGS);
        }
    };

    for (key, source) in sorted_attribution(&config) {
        tracing::debug!(key, %source, "Effective configuration source");
    }

    let operation = cli.command.name();
    let force = cli.force;

    let result = match cli.command {
        Commands::Review { dirs } => commands::execute_review_command(&dirs, &config, force),
        Commands::Watch { dirs, duration } => {
            commands::execute_watch_command(&dirs, duration, &config, force)
        }
        Commands::Validate { files, json } => {
            commands::execute_validate_command(&files, json, &config)
        }
        Commands::Correct { file, json } => {
            commands::execute_correct_command(&file, json, &config, force)
        }
        Commands::Apply => commands::execute_apply_command(&config, force),
        Commands::Status { json } => commands::execute_status_command(json, &config),
        Commands::Requirements { json } => commands::execute_requirements_command(json, &config),
    };

    match result {
        Ok(code) if code == ExitCode::SUCCESS => Ok(()),
        Ok(code) => Err(code),
        Err(error) => Err(report_error(error, operation)),
    }
}

/// Print `error` once and pick its exit code.
fn report_error(error: anyhow::Error, operation: &str) -> ExitCode {
    match error.downcast::<RevloopError>() {
        Ok(revloop_error) => {
            eprint!("{}", revloop_error.display_for_user());
            revloop_error.to_exit_code()
        }
        Err(other) => {
            eprintln!("✗ {operation} failed: {other:#}");
            eprintln!("\n  Run with --verbose for more detailed output");
            ExitCode::INTERNAL
        }
    }
}

fn sorted_attribution(config: &Config) -> Vec<(&str, &crate::ConfigSource)> {
    let mut entries: Vec<_> = config
        .source_attribution
        .iter()
        .map(|(key, source)| (key.as_str(), source))
        .collect();
    entries.sort_by_key(|(key, _)| *key);
    entries
}
