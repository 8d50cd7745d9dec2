//! Validate command implementation
//!
//! Handles `revloop validate`: one-shot validation of the given files.

use anyhow::{Context, Result};
use std::path::PathBuf;

use super::common::{absolute_path, system_pipeline};
use crate::{Config, ExitCode, ValidationResult, emit_jcs};

/// Execute the validate command
///
/// Every result is also appended to the validation log. Returns
/// `VALIDATION_FAILED` when any file misses a requirement.
pub fn execute_validate_command(files: &[PathBuf], json: bool, config: &Config) -> Result<ExitCode> {
    let validator = system_pipeline(config).validator();

    let results = files
        .iter()
        .map(|file| absolute_path(file).map(|path| validator.validate_file(&path)))
        .collect::<Result<Vec<ValidationResult>>>()?;

    if json {
        let output = emit_jcs(&results).context("Failed to emit validation JSON")?;
        println!("{output}");
    } else {
        for result in &results {
            print_result(result);
        }
    }

    if results.iter().all(|r| r.valid) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::VALIDATION_FAILED)
    }
}

fn print_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ {}: {}", result.file_path.display(), result.notes);
        return;
    }
    println!("✗ {}", result.file_path.display());
    for requirement in &result.missing_requirements {
        println!("    - {requirement}");
    }
}
