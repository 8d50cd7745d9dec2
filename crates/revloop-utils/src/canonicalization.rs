//! Stable JSON output for machine consumers.

use anyhow::{Context, Result};
use serde::Serialize;

/// Serialize a value as canonical JSON (JCS, RFC 8785).
///
/// Keys are sorted and whitespace is fixed, so `--json` output of two runs
/// over the same logs compares byte for byte.
pub fn emit_jcs<T: Serialize>(value: &T) -> Result<String> {
    let json_value =
        serde_json::to_value(value).with_context(|| "Failed to serialize value to JSON")?;
    let json_bytes = serde_json_canonicalizer::to_vec(&json_value)
        .with_context(|| "Failed to canonicalize JSON using JCS")?;
    String::from_utf8(json_bytes).with_context(|| "JCS output contained invalid UTF-8")
}
