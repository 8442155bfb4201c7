//! `sigswap` console: drives a conversion session from a terminal or a scripted list of
//! command lines, and fulfils the file, documentation, and assistant requests the
//! interpreter emits.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use sigswap_core::assist::Assistants;
use sigswap_core::{BatchArtifact, Outcome, Request, Session};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::{debug, info};

mod config;

use config::{Cli, Commands};

const DOCS: &str = include_str!("../README.md");

/// Where command lines (and file paths for upload requests) come from.
enum LineSource {
    Terminal(Lines<BufReader<Stdin>>),
    Script(VecDeque<String>),
}

impl LineSource {
    async fn next_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self {
            LineSource::Terminal(lines) => {
                let mut stdout = tokio::io::stdout();
                stdout.write_all(prompt.as_bytes()).await?;
                stdout.flush().await?;
                Ok(lines.next_line().await?)
            }
            LineSource::Script(lines) => Ok(lines.pop_front()),
        }
    }
}

/// Host side of a session: output directory and optional collaborators.
struct Host {
    out_dir: PathBuf,
    assistants: Assistants,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init_tracing(&cli)?;

    let mut session = config::initial_session(&cli).await?;
    let host = Host {
        out_dir: cli.out_dir.clone(),
        assistants: Assistants::none(),
    };
    info!(
        mode = %session.mode(),
        rules = session.store().len(),
        "session started"
    );

    match cli.command {
        None | Some(Commands::Console) => {
            println!("sigswap console. Type 'help' for commands, 'exit' to quit.");
            let lines = BufReader::new(tokio::io::stdin()).lines();
            drive(&mut session, &host, LineSource::Terminal(lines)).await?;
        }
        Some(Commands::Exec { lines }) => {
            let failures =
                drive(&mut session, &host, LineSource::Script(lines.into_iter().collect())).await?;
            if failures > 0 {
                anyhow::bail!("{failures} command(s) reported errors");
            }
        }
    }
    Ok(())
}

/// Dispatch lines until the source is exhausted. Returns how many outcomes had errors.
async fn drive(session: &mut Session, host: &Host, mut input: LineSource) -> Result<usize> {
    let mut failures = 0;
    while let Some(line) = input.next_line("sigswap> ").await? {
        if matches!(line.trim(), "exit" | "quit") {
            break;
        }
        let outcome = session.execute(&line);
        failures += usize::from(outcome.has_error());
        print_outcome(&outcome);

        for request in outcome.requests {
            let followup = fulfil(session, host, &mut input, request).await?;
            failures += usize::from(followup.has_error());
            print_outcome(&followup);
        }
    }
    Ok(failures)
}

async fn fulfil(
    session: &mut Session,
    host: &Host,
    input: &mut LineSource,
    request: Request,
) -> Result<Outcome> {
    debug!(?request, "fulfilling request");
    let outcome = match request {
        Request::PickFile(target) => {
            let path = input.next_line("path> ").await?;
            match path.as_deref().map(str::trim) {
                Some(path) if !path.is_empty() => {
                    let contents = tokio::fs::read_to_string(path).await;
                    session.complete_upload(target, path, contents)
                }
                _ => session.cancel_upload(target),
            }
        }
        Request::SaveFile(artifact) => {
            let written = save_artifact(&host.out_dir, &artifact)
                .await
                .map_err(|err| format!("{err:#}"));
            session.complete_save(&artifact.file_name, written)
        }
        Request::ShowDocs => {
            println!("{DOCS}");
            Outcome::default()
        }
        Request::Rewrite => {
            let result = host
                .assistants
                .rewrite(session.source(), session.mode(), session.store().rules())
                .await;
            session.apply_rewrite(result)
        }
        Request::Suggest => {
            let result = host
                .assistants
                .suggest(session.source(), session.store().rules())
                .await;
            session.apply_suggestions(result)
        }
    };
    Ok(outcome)
}

async fn save_artifact(dir: &Path, artifact: &BatchArtifact) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating output directory {}", dir.display()))?;
    let path = dir.join(&artifact.file_name);
    tokio::fs::write(&path, &artifact.contents)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    if artifact.executable {
        mark_executable(&path).await?;
    }
    info!(path = %path.display(), rules = artifact.rules, "artifact written");
    Ok(path)
}

#[cfg(unix)]
async fn mark_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .with_context(|| format!("marking {} executable", path.display()))
}

#[cfg(not(unix))]
async fn mark_executable(_path: &Path) -> Result<()> {
    Ok(())
}

fn print_outcome(outcome: &Outcome) {
    for entry in &outcome.entries {
        println!("{entry}");
    }
}
