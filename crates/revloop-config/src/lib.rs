//! Configuration management for revloop
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > file > defaults. The TOML file has optional `[requirements]`,
//! `[logs]`, `[watch]`, `[validation]` and `[timing]` sections.

mod cli_args;
mod discovery;
mod model;
mod validation;

pub use cli_args::CliArgs;
pub use model::*;
