//! CLI argument definitions and parsing structures
//!
//! This module defines the command-line interface structure using clap,
//! including the main `Cli` struct and the `Commands` enum.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// revloop - requirements-driven review loop for source trees
#[derive(Parser, Debug)]
#[command(name = "revloop")]
#[command(about = "Watch source trees, validate changes against a requirements document and apply corrections")]
#[command(long_about = r#"
revloop watches directories for file changes, checks each changed file against
the bullets of a markdown requirements document and applies mechanical
corrections (reindentation, docstring stubs, trailing whitespace) where it can.
Anything it cannot fix is recorded for manual review.

EXAMPLES:
  # Review a project until it has been quiet for the idle timeout
  revloop review src/

  # Only record changes to the review log for ten minutes
  revloop watch src/ tests/ --duration 600

  # Check files once and print canonical JSON
  revloop validate src/app.py src/util.py --json

  # Correct a single file and verify the result
  revloop correct src/app.py

  # Drain corrections restored from the log without watching
  revloop apply

  # Show pending and needs-review corrections
  revloop status --json

CONFIGURATION:
  Configuration is loaded with precedence: CLI flags > config file > defaults
  Config file is discovered by searching upward from CWD for .revloop/config.toml
  Use --config to specify an explicit config file path

LOGS:
  review_log.json, validation_log.json, corrections.json and
  correction_status.json live in the log directory (default .revloop/logs)
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Requirements document (default: docs/requirements.md)
    #[arg(long, global = true)]
    pub requirements: Option<PathBuf>,

    /// Directory for the JSON logs (default: .revloop/logs)
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Seconds without activity before the loops go idle
    #[arg(long, global = true)]
    pub idle_timeout: Option<u64>,

    /// Take over the log directory lock even if another process holds it
    #[arg(long, global = true)]
    pub force: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also append log output to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch directories and run the validate/correct loop until idle
    ///
    /// Every accepted change is validated; failures produce corrections that
    /// are applied, retried and verified. The command returns once no change
    /// has been seen for the idle timeout.
    ///
    /// EXAMPLES:
    ///   revloop review .
    ///   revloop review src/ docs/ --idle-timeout 60
    Review {
        /// Directories to watch
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },

    /// Record file changes to the review log without validating
    ///
    /// EXAMPLES:
    ///   revloop watch src/ --duration 300
    Watch {
        /// Directories to watch
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Stop after this many seconds instead of at the idle timeout
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Validate files once against the requirements document
    ///
    /// Exits with code 4 when any file misses a requirement.
    ///
    /// EXAMPLES:
    ///   revloop validate src/app.py
    ///   revloop validate src/*.py --json
    Validate {
        /// Files to validate
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output results as canonical JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate, correct and verify one file
    ///
    /// Exits with code 4 when requirements remain unmet afterwards.
    ///
    /// EXAMPLES:
    ///   revloop correct src/app.py
    Correct {
        /// File to correct
        file: PathBuf,

        /// Output the correction as canonical JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply pending corrections from the log until idle
    Apply,

    /// Show pending and needs-review corrections
    ///
    /// EXAMPLES:
    ///   revloop status
    ///   revloop status --json
    Status {
        /// Output status as canonical JSON
        #[arg(long)]
        json: bool,
    },

    /// List the requirements parsed from the requirements document
    Requirements {
        /// Output requirements as canonical JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    /// Subcommand name used for error context and the lock file.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Review { .. } => "review",
            Self::Watch { .. } => "watch",
            Self::Validate { .. } => "validate",
            Self::Correct { .. } => "correct",
            Self::Apply => "apply",
            Self::Status { .. } => "status",
            Self::Requirements { .. } => "requirements",
        }
    }
}

/// Build the CLI command structure without parsing arguments
/// This is used for introspection in tests
#[must_use]
pub fn build_cli() -> clap::Command {
    <Cli as clap::CommandFactory>::command()
}
