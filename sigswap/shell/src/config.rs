//! Command-line flags, environment fallbacks, and initial session assembly.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sigswap_core::{MappingStore, Mode, Preset, Session};
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Console for converting test scripts between HIL signal names and SIL system variables.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase diagnostic verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Override log level (e.g. info, debug, trace).
    #[arg(long, env = "SIGSWAP_LOG_LEVEL")]
    pub log_level: Option<String>,
    /// Initial transformation direction.
    #[arg(long, env = "SIGSWAP_MODE", default_value = "SIL", value_parser = parse_mode)]
    pub mode: Mode,
    /// Mapping file loaded at start-up instead of a preset.
    #[arg(long, env = "SIGSWAP_MAPPING", value_name = "FILE", conflicts_with = "preset")]
    pub mapping: Option<PathBuf>,
    /// Built-in rule set loaded at start-up.
    #[arg(long, value_name = "NAME", value_parser = parse_preset)]
    pub preset: Option<Preset>,
    /// Script loaded into the source at start-up.
    #[arg(long, value_name = "FILE")]
    pub source: Option<PathBuf>,
    /// Directory that download and export requests write into.
    #[arg(long, env = "SIGSWAP_OUT_DIR", default_value = ".", value_name = "DIR")]
    pub out_dir: PathBuf,
    /// Subcommand; defaults to the interactive console.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read commands from stdin until EOF or `exit`.
    Console,
    /// Run the given command lines in order and exit non-zero if any of them failed.
    ///
    /// A line that requests a file (upload) takes the following line as the path.
    Exec {
        /// Command lines, e.g. `run` `download`.
        #[arg(required = true)]
        lines: Vec<String>,
    },
}

fn parse_mode(value: &str) -> Result<Mode, String> {
    value.parse()
}

fn parse_preset(value: &str) -> Result<Preset, String> {
    value.parse()
}

/// Install the global `tracing` subscriber. Diagnostics go to stderr so stdout carries
/// only console output.
pub fn init_tracing(cli: &Cli) -> Result<()> {
    let level = cli
        .log_level
        .as_deref()
        .map(|lvl| lvl.to_ascii_uppercase())
        .map(|lvl| match lvl.as_str() {
            "TRACE" => Level::TRACE,
            "DEBUG" => Level::DEBUG,
            "INFO" => Level::INFO,
            "ERROR" => Level::ERROR,
            _ => Level::WARN,
        })
        .unwrap_or_else(|| match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        });
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Build the start-up session from flags: rules, mode, and optional source.
pub async fn initial_session(cli: &Cli) -> Result<Session> {
    let store = match (&cli.mapping, cli.preset) {
        (Some(path), _) => load_store(path).await?,
        (None, preset) => {
            let preset = preset.unwrap_or(Preset::Default);
            info!(preset = preset.name(), "loading preset");
            MappingStore::with_rules(preset.rules())
                .with_context(|| format!("loading preset {}", preset.name()))?
        }
    };
    let mut session = Session::new(store, cli.mode);
    if let Some(path) = &cli.source {
        let source = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading source {}", path.display()))?;
        session.set_source(source);
    }
    Ok(session)
}

async fn load_store(path: &Path) -> Result<MappingStore> {
    let payload = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading mapping {}", path.display()))?;
    let mut store = MappingStore::new();
    let count = store
        .replace_all_json(&payload)
        .with_context(|| format!("validating mapping {}", path.display()))?;
    info!(rules = count, path = %path.display(), "loaded mapping file");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["sigswap"]).unwrap();
        assert_eq!(cli.mode, Mode::Sil);
        assert!(cli.mapping.is_none());
        assert!(cli.command.is_none());
        assert_eq!(cli.out_dir, PathBuf::from("."));
    }

    #[test]
    fn flags_parse() {
        let cli = Cli::try_parse_from([
            "sigswap", "--mode", "hil", "--preset", "chassis", "exec", "run", "status",
        ])
        .unwrap();
        assert_eq!(cli.mode, Mode::Hil);
        assert_eq!(cli.preset, Some(Preset::Chassis));
        match cli.command {
            Some(Commands::Exec { lines }) => assert_eq!(lines, ["run", "status"]),
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["sigswap", "--mode", "xil"]).is_err());
    }

    #[tokio::test]
    async fn mapping_file_must_be_an_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(&path, r#"{"id": "1"}"#).unwrap();
        let cli = Cli::try_parse_from(["sigswap", "--mapping", path.to_str().unwrap()]).unwrap();
        let err = initial_session(&cli).await.unwrap_err();
        assert!(format!("{err:#}").contains("JSON array"));
    }
}
