//! Requirements command implementation
//!
//! Handles `revloop requirements`: show what the validator will check.

use anyhow::{Context, Result};

use super::common::system_pipeline;
use crate::{Config, ExitCode, emit_jcs};

/// Execute the requirements command
pub fn execute_requirements_command(json: bool, config: &Config) -> Result<ExitCode> {
    let store = system_pipeline(config).requirement_store();
    let requirements = store.load();

    if json {
        let output = emit_jcs(&requirements).context("Failed to emit requirements JSON")?;
        println!("{output}");
        return Ok(ExitCode::SUCCESS);
    }

    if requirements.is_empty() {
        println!(
            "No requirements found in {}; every file validates",
            store.path().display()
        );
        return Ok(ExitCode::SUCCESS);
    }

    let mut section: Option<&str> = None;
    for requirement in &requirements {
        if section != Some(requirement.section.as_str()) {
            section = Some(&requirement.section);
            println!("## {}", requirement.section);
        }
        println!("  - {}", requirement.text);
    }
    Ok(ExitCode::SUCCESS)
}
