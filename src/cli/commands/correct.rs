//! Correct command implementation
//!
//! Handles `revloop correct`: validate one file, generate a correction,
//! apply it with retries and verify immediately.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use revloop_utils::error::{CorrectionError, RevloopError};

use super::common::{absolute_path, acquire_log_lock, system_pipeline};
use crate::{Config, Correction, CorrectionStatus, ExitCode, emit_jcs};

/// Execute the correct command
///
/// Exit code is `SUCCESS` when the file satisfies every requirement
/// afterwards, `VALIDATION_FAILED` when anything remains for manual review.
pub fn execute_correct_command(file: &Path, json: bool, config: &Config, force: bool) -> Result<ExitCode> {
    let path = absolute_path(file)?;
    if !path.is_file() {
        return Err(RevloopError::Correction(CorrectionError::FileNotFound { path }).into());
    }

    let _lock = acquire_log_lock(config, "correct", force)?;
    let pipeline = system_pipeline(config);
    let validator = Arc::new(pipeline.validator());
    let mut applier = pipeline.applier(Arc::clone(&validator));

    let result = validator.validate_file(&path);
    if result.valid {
        if json {
            println!("{}", emit_jcs(&result).context("Failed to emit validation JSON")?);
        } else {
            println!("✓ {}: {}", path.display(), result.notes);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let mut correction = applier
        .manager_mut()
        .generate_correction(&result)
        .with_context(|| format!("Could not read {} to plan a correction", path.display()))?;

    if correction.is_pending() {
        applier.retry_correction(&mut correction);
    }
    if correction.applied_at.is_some() {
        applier
            .manager_mut()
            .verify_correction_now(&mut correction, &validator);
    }

    if json {
        println!("{}", emit_jcs(&correction).context("Failed to emit correction JSON")?);
    } else {
        print_correction(&correction);
    }

    let resolved = correction.status == CorrectionStatus::Applied
        && correction.verification_success == Some(true);
    Ok(if resolved {
        ExitCode::SUCCESS
    } else {
        ExitCode::VALIDATION_FAILED
    })
}

fn print_correction(correction: &Correction) {
    let path = correction.file_path.display();
    match correction.status {
        CorrectionStatus::Applied if correction.verification_success == Some(true) => {
            println!("✓ Corrected {path}");
        }
        CorrectionStatus::Pending => println!("… Correction for {path} deferred; run `revloop apply` later"),
        _ => println!("✗ {path} needs manual review"),
    }

    for fix in &correction.fixes {
        let marker = match (fix.applied, &fix.error) {
            (true, _) => "✓",
            (false, Some(_)) => "✗",
            (false, None) if !fix.is_automated() => "!",
            (false, None) => "·",
        };
        println!("  {marker} {}", fix.description);
        if let Some(error) = &fix.error {
            println!("      {error}");
        }
    }

    if let Some(remaining) = &correction.remaining_requirements
        && !remaining.is_empty()
    {
        println!("  Remaining requirements:");
        for requirement in remaining {
            println!("    - {requirement}");
        }
    }
}
