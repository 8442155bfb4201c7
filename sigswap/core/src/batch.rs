//! Headless file-to-file conversion used by the batch program and exported launchers.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::BatchError;
use crate::mapping::{parse_rules_json, Mode, SignalMapping};
use crate::transform::{active_rules, transform};

/// Where the rule set for a batch run comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingSource {
    /// Rules compiled into the program.
    Embedded,
    /// A mapping file on disk.
    File(PathBuf),
    /// Mapping JSON piped on stdin (`--mapping=-`).
    Stdin,
}

impl MappingSource {
    /// Interpret a `--mapping` value; `-` selects stdin.
    pub fn from_arg(arg: Option<&Path>) -> Self {
        match arg {
            None => MappingSource::Embedded,
            Some(path) if path.as_os_str() == "-" => MappingSource::Stdin,
            Some(path) => MappingSource::File(path.to_path_buf()),
        }
    }
}

/// One batch invocation.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Script to read.
    pub input: PathBuf,
    /// Destination for the transformed script.
    pub output: PathBuf,
    /// Transformation direction.
    pub mode: Mode,
    /// Rule set to apply.
    pub mapping: MappingSource,
}

/// Summary printed after a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Rules in the resolved mapping set.
    pub rules: usize,
    /// Rules that could match in the chosen mode.
    pub active_rules: usize,
    /// Replacements performed.
    pub changes: usize,
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Applied {} mapping rule(s) ({} active), {} replacement(s)",
            self.rules, self.active_rules, self.changes
        )
    }
}

/// Resolve the rule set, transform the input file, and write the output file.
pub fn run_batch(
    request: &BatchRequest,
    embedded: &[SignalMapping],
    stdin: impl Read,
) -> Result<BatchReport, BatchError> {
    let rules = load_rules(&request.mapping, embedded, stdin)?;

    if !request.input.exists() {
        return Err(BatchError::InputNotFound(request.input.clone()));
    }
    let source = fs::read_to_string(&request.input).map_err(|source| BatchError::Io {
        context: format!("reading {}", request.input.display()),
        source,
    })?;

    let result = transform(&source, request.mode, &rules);
    fs::write(&request.output, &result.code).map_err(|source| BatchError::Io {
        context: format!("writing {}", request.output.display()),
        source,
    })?;

    let report = BatchReport {
        rules: rules.len(),
        active_rules: active_rules(request.mode, &rules).len(),
        changes: result.changes,
    };
    info!(
        mode = %request.mode,
        rules = report.rules,
        changes = report.changes,
        output = %request.output.display(),
        "batch transformation written"
    );
    Ok(report)
}

fn load_rules(
    source: &MappingSource,
    embedded: &[SignalMapping],
    mut stdin: impl Read,
) -> Result<Vec<SignalMapping>, BatchError> {
    match source {
        MappingSource::Embedded => Ok(embedded.to_vec()),
        MappingSource::File(path) => {
            if !path.exists() {
                return Err(BatchError::MappingNotFound(path.clone()));
            }
            let payload = fs::read_to_string(path).map_err(|source| BatchError::Io {
                context: format!("reading mapping {}", path.display()),
                source,
            })?;
            Ok(parse_rules_json(&payload)?)
        }
        MappingSource::Stdin => {
            let mut payload = String::new();
            stdin
                .read_to_string(&mut payload)
                .map_err(|source| BatchError::Io {
                    context: "reading mapping from stdin".to_owned(),
                    source,
                })?;
            Ok(parse_rules_json(&payload)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MappingError;
    use std::io::empty;

    fn embedded() -> Vec<SignalMapping> {
        vec![
            SignalMapping::new("1", "$Speed", "@Speed"),
            SignalMapping::new("2", "$SpeedFront", "@SpeedFront"),
        ]
    }

    fn request(dir: &Path, mode: Mode, mapping: MappingSource) -> BatchRequest {
        BatchRequest {
            input: dir.join("in.can"),
            output: dir.join("out.can"),
            mode,
            mapping,
        }
    }

    #[test]
    fn embedded_rules_transform_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("in.can"), "$SpeedFront > $Speed").unwrap();
        let req = request(dir.path(), Mode::Sil, MappingSource::Embedded);

        let report = run_batch(&req, &embedded(), empty()).unwrap();
        assert_eq!(
            report,
            BatchReport {
                rules: 2,
                active_rules: 2,
                changes: 2
            }
        );
        let out = fs::read_to_string(dir.path().join("out.can")).unwrap();
        assert_eq!(out, "@SpeedFront > @Speed");
    }

    #[test]
    fn stdin_mapping_overrides_embedded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("in.can"), "@A @A").unwrap();
        let req = request(dir.path(), Mode::Hil, MappingSource::Stdin);
        let payload = br#"[{"id":"1","realSignal":"$A","simSignal":"@A"}]"#;

        let report = run_batch(&req, &embedded(), &payload[..]).unwrap();
        assert_eq!(report.rules, 1);
        assert_eq!(report.changes, 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("out.can")).unwrap(),
            "$A $A"
        );
    }

    #[test]
    fn missing_files_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), Mode::Sil, MappingSource::Embedded);
        let err = run_batch(&req, &embedded(), empty()).unwrap_err();
        assert!(matches!(err, BatchError::InputNotFound(_)));
        assert_eq!(err.exit_code(), 1);

        let missing = dir.path().join("nope.json");
        let req = request(dir.path(), Mode::Sil, MappingSource::File(missing));
        let err = run_batch(&req, &embedded(), empty()).unwrap_err();
        assert!(matches!(err, BatchError::MappingNotFound(_)));
        assert!(!dir.path().join("out.can").exists());
    }

    #[test]
    fn non_array_mapping_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("in.can"), "$Speed").unwrap();
        let mapping = dir.path().join("map.json");
        fs::write(&mapping, r#"{"rules": []}"#).unwrap();
        let req = request(dir.path(), Mode::Sil, MappingSource::File(mapping));

        let err = run_batch(&req, &embedded(), empty()).unwrap_err();
        assert!(matches!(
            err,
            BatchError::Mapping(MappingError::NotASequence { .. })
        ));
        assert!(!dir.path().join("out.can").exists());
    }

    #[test]
    fn mapping_arg_parsing() {
        assert_eq!(MappingSource::from_arg(None), MappingSource::Embedded);
        assert_eq!(
            MappingSource::from_arg(Some(Path::new("-"))),
            MappingSource::Stdin
        );
        assert_eq!(
            MappingSource::from_arg(Some(Path::new("rules.json"))),
            MappingSource::File(PathBuf::from("rules.json"))
        );
    }
}
