//! `sigswap-batch`: converts one script file between HIL and SIL naming without a console.
//!
//! Usage: `sigswap-batch <inputPath> <outputPath> [--mode=HIL|SIL] [--mapping=<path>]`.
//! Without `--mapping` the built-in default rules are used; `--mapping=-` reads the rules
//! from stdin, which is how exported launchers pass their embedded set. Every failure
//! exits with status 1.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use sigswap_core::{run_batch, BatchRequest, MappingSource, Mode, Preset};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Batch CLI.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Convert a test script between HIL signal names and SIL system variables",
    override_usage = "sigswap-batch <inputPath> <outputPath> [--mode=HIL|SIL] [--mapping=<path>]"
)]
struct Cli {
    /// Script to convert.
    input: PathBuf,
    /// Where to write the converted script.
    output: PathBuf,
    /// Transformation direction (case-insensitive).
    #[arg(long, default_value = "SIL", value_parser = parse_mode)]
    mode: Mode,
    /// Mapping file replacing the built-in rules; `-` reads it from stdin.
    #[arg(long, value_name = "PATH")]
    mapping: Option<PathBuf>,
    /// Increase diagnostic verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_mode(value: &str) -> Result<Mode, String> {
    value.parse()
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(1);
        }
    };

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error: {err}");
        return ExitCode::from(1);
    }

    let request = BatchRequest {
        input: cli.input,
        output: cli.output,
        mode: cli.mode,
        mapping: MappingSource::from_arg(cli.mapping.as_deref()),
    };
    match run_batch(&request, &Preset::Default.rules(), std::io::stdin().lock()) {
        Ok(report) => {
            println!("{report}");
            println!("Mode {} -> {}", request.mode, request.output.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}
