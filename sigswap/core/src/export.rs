//! Batch export adapter: packages the current mapping set for headless runs.
//!
//! The launcher artifact is a POSIX `sh` script with the mapping JSON embedded in a
//! here-document. It forwards its arguments to the `sigswap-batch` program and feeds
//! the embedded rules over stdin (`--mapping=-`) unless the caller supplies a mapping
//! file of their own.

use crate::error::MappingError;
use crate::mapping::MappingStore;

/// Program the launcher delegates to. `SIGSWAP_BATCH` overrides it at run time.
pub const BATCH_PROGRAM: &str = "sigswap-batch";

/// File name suggested for the launcher script.
pub const LAUNCHER_FILE_NAME: &str = "sigswap-batch.sh";

/// File name suggested for a bare mapping export.
pub const MAPPING_FILE_NAME: &str = "sigswap-mapping.json";

/// A file the host should write on the user's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchArtifact {
    /// Suggested file name.
    pub file_name: String,
    /// Full file contents.
    pub contents: String,
    /// Number of rules embedded.
    pub rules: usize,
    /// Whether the file should be marked executable.
    pub executable: bool,
}

/// Render the self-contained launcher for `store`.
pub fn export_launcher(store: &MappingStore) -> Result<BatchArtifact, MappingError> {
    let json = store.to_json()?;
    Ok(BatchArtifact {
        file_name: LAUNCHER_FILE_NAME.to_owned(),
        contents: render_launcher(&json, store.len()),
        rules: store.len(),
        executable: true,
    })
}

/// The mapping set alone, in the mapping file format.
pub fn export_mapping(store: &MappingStore) -> Result<BatchArtifact, MappingError> {
    let mut contents = store.to_json()?;
    contents.push('\n');
    Ok(BatchArtifact {
        file_name: MAPPING_FILE_NAME.to_owned(),
        contents,
        rules: store.len(),
        executable: false,
    })
}

fn render_launcher(mapping_json: &str, rules: usize) -> String {
    let delimiter = heredoc_delimiter(mapping_json);
    format!(
        r#"#!/bin/sh
# sigswap batch launcher with {rules} embedded mapping rule(s).
# Usage: {LAUNCHER_FILE_NAME} <inputPath> <outputPath> [--mode=HIL|SIL] [--mapping=<path>]
# Set SIGSWAP_BATCH to the sigswap-batch executable if it is not on PATH.
set -eu
program="${{SIGSWAP_BATCH:-{BATCH_PROGRAM}}}"
for arg in "$@"; do
  case "$arg" in
    --mapping|--mapping=*) exec "$program" "$@" ;;
  esac
done
exec "$program" "$@" --mapping=- <<'{delimiter}'
{mapping_json}
{delimiter}
"#
    )
}

/// A here-document terminator that does not occur as a line of `body`.
fn heredoc_delimiter(body: &str) -> String {
    let mut delimiter = String::from("SIGSWAP_RULES");
    let mut suffix = 0u32;
    while body.lines().any(|line| line == delimiter) {
        suffix += 1;
        delimiter = format!("SIGSWAP_RULES_{suffix}");
    }
    delimiter
}
