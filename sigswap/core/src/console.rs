//! Single-line command interpreter and the session state it drives.
//!
//! A [`Session`] owns the source text, the current [`Mode`], the [`MappingStore`], and the
//! latest transformation output. All mutation goes through `&mut Session`, so one command
//! is fully applied before the next is observed. Commands report back only through tagged
//! [`LogEntry`] values and [`Request`]s for the host to fulfil (file dialogs, saves,
//! documentation, assistant calls).

use std::fmt;
use std::path::PathBuf;

use tracing::debug;

use crate::error::AssistError;
use crate::export::{export_launcher, export_mapping, BatchArtifact};
use crate::mapping::{MappingField, MappingStore, Mode, SignalMapping};
use crate::presets::{self, Preset};
use crate::transform::{transform, TransformationResult};

/// Usage text printed by `help`.
pub const HELP_TEXT: &str = "\
Available commands:
  help, ?                    Show this help
  upload, load [map]         Load a source script, or a mapping file with 'map', 'rule' or 'json'
  run, transform             Transform the source with the current mode and mappings
  download, save [map]       Save the transformed script, or the mapping file with 'map'
  export, batch, cli         Export a batch launcher with the current mappings embedded
  swap, replace              Move the output into the source and flip the mode
  mode <hil|sil>             Set the transformation direction (h and s also work)
  clear                      Clear the source script
  readme, docs, man          Show the documentation
  rules, list                List the mapping rules
  preset [name]              Load a built-in rule set, or list them
  status                     Show mode, rule count, and last result
  add <real> <sim> [desc]    Append a mapping rule
  remove <id>                Delete a mapping rule
  set <id> <field> <value>   Edit a rule field (real, sim, description)
  assist                     Ask the code assistant to rewrite the source
  suggest                    Ask the mapping advisor for new rules";

/// Entries kept in [`Session::history`]; older ones are dropped first.
pub const HISTORY_LIMIT: usize = 1000;

/// Category tag of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    /// Echo of the submitted line.
    Command,
    /// Neutral information.
    Info,
    /// An operation completed.
    Success,
    /// An operation failed or was misused; state is unchanged.
    Error,
    /// A side effect was requested from the host.
    Action,
}

impl LogKind {
    fn tag(self) -> &'static str {
        match self {
            LogKind::Command => ">",
            LogKind::Info => "info",
            LogKind::Success => "ok",
            LogKind::Error => "error",
            LogKind::Action => "action",
        }
    }
}

/// One line of interpreter output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Category.
    pub kind: LogKind,
    /// Message text, possibly multi-line.
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LogKind::Command => write!(f, "> {}", self.message),
            kind => write!(f, "[{}] {}", kind.tag(), self.message),
        }
    }
}

/// What a file-selection request should load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadTarget {
    /// The script to transform.
    Source,
    /// A mapping file replacing the store.
    Mapping,
}

/// Side effect the host must perform after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Let the user pick a file, then call [`Session::complete_upload`].
    PickFile(UploadTarget),
    /// Write a file for the user.
    SaveFile(BatchArtifact),
    /// Display the documentation.
    ShowDocs,
    /// Run the code assistant, then call [`Session::apply_rewrite`].
    Rewrite,
    /// Run the mapping advisor, then call [`Session::apply_suggestions`].
    Suggest,
}

/// Everything one command produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Log entries in emission order.
    pub entries: Vec<LogEntry>,
    /// Requested side effects.
    pub requests: Vec<Request>,
}

impl Outcome {
    /// True if any entry is tagged [`LogKind::Error`].
    pub fn has_error(&self) -> bool {
        self.entries.iter().any(|entry| entry.kind == LogKind::Error)
    }

    fn push(&mut self, kind: LogKind, message: impl Into<String>) {
        self.entries.push(LogEntry {
            kind,
            message: message.into(),
        });
    }

    fn info(&mut self, message: impl Into<String>) {
        self.push(LogKind::Info, message);
    }

    fn success(&mut self, message: impl Into<String>) {
        self.push(LogKind::Success, message);
    }

    fn error(&mut self, message: impl Into<String>) {
        self.push(LogKind::Error, message);
    }

    fn action(&mut self, message: impl Into<String>, request: Request) {
        self.push(LogKind::Action, message);
        self.requests.push(request);
    }
}

/// A recognised console command with its argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `help`, `?`
    Help,
    /// `upload`, `load`
    Upload(UploadTarget),
    /// `run`, `transform`
    Run,
    /// `download`, `save`; `true` saves the mapping file instead of the output.
    Download(bool),
    /// `export`, `batch`, `cli`
    Export,
    /// `swap`, `replace`
    Swap,
    /// `mode <arg>` with the raw argument.
    Mode(String),
    /// `clear`
    Clear,
    /// `readme`, `docs`, `man`
    Docs,
    /// `rules`, `list`
    Rules,
    /// `preset [name]`
    Preset(String),
    /// `status`
    Status,
    /// `add <real> <sim> [description]`
    Add(String),
    /// `remove <id>`
    Remove(String),
    /// `set <id> <field> <value>`
    Set(String),
    /// `assist`
    Assist,
    /// `suggest`
    Suggest,
    /// Anything else, with the offending token.
    Unknown(String),
}

impl Command {
    /// Parse one line. Returns `None` for blank input.
    ///
    /// The command token is the text before the first space, lower-cased; the argument is
    /// the trimmed remainder with its case preserved.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (token, argument) = match line.split_once(' ') {
            Some((token, rest)) => (token, rest.trim()),
            None => (line, ""),
        };
        let token = token.to_lowercase();
        let argument = argument.to_owned();
        let wants_mapping = |arg: &str| {
            let arg = arg.to_lowercase();
            ["map", "rule", "json"].iter().any(|key| arg.contains(key))
        };

        Some(match token.as_str() {
            "help" | "?" => Command::Help,
            "upload" | "load" => Command::Upload(if wants_mapping(&argument) {
                UploadTarget::Mapping
            } else {
                UploadTarget::Source
            }),
            "run" | "transform" => Command::Run,
            "download" | "save" => Command::Download(wants_mapping(&argument)),
            "export" | "batch" | "cli" => Command::Export,
            "swap" | "replace" => Command::Swap,
            "mode" => Command::Mode(argument),
            "clear" => Command::Clear,
            "readme" | "docs" | "man" => Command::Docs,
            "rules" | "list" => Command::Rules,
            "preset" => Command::Preset(argument),
            "status" => Command::Status,
            "add" => Command::Add(argument),
            "remove" => Command::Remove(argument),
            "set" => Command::Set(argument),
            "assist" => Command::Assist,
            "suggest" => Command::Suggest,
            _ => Command::Unknown(token),
        })
    }
}

/// Interactive conversion session.
#[derive(Debug, Clone)]
pub struct Session {
    source: String,
    output: Option<TransformationResult>,
    mode: Mode,
    store: MappingStore,
    history: Vec<LogEntry>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(
            MappingStore::with_rules(Preset::Default.rules()).unwrap_or_default(),
            Mode::default(),
        )
    }
}

impl Session {
    /// Session over `store` in `mode` with no source loaded.
    pub fn new(store: MappingStore, mode: Mode) -> Self {
        Self {
            source: String::new(),
            output: None,
            mode,
            store,
            history: Vec::new(),
        }
    }

    /// Current source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Latest transformation output, if any.
    pub fn output(&self) -> Option<&TransformationResult> {
        self.output.as_ref()
    }

    /// Current direction.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Current rule set.
    pub fn store(&self) -> &MappingStore {
        &self.store
    }

    /// The most recent logged entries, oldest first, at most [`HISTORY_LIMIT`].
    pub fn history(&self) -> &[LogEntry] {
        &self.history
    }

    /// Replace the source text and recompute the output.
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
        self.refresh();
    }

    /// Change direction and recompute the output.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.refresh();
    }

    /// Edit the store through `edit`, then recompute the output.
    pub fn edit_store<T>(&mut self, edit: impl FnOnce(&mut MappingStore) -> T) -> T {
        let value = edit(&mut self.store);
        self.refresh();
        value
    }

    fn refresh(&mut self) {
        self.output = if self.source.is_empty() {
            None
        } else {
            Some(transform(&self.source, self.mode, self.store.rules()))
        };
    }

    fn has_output(&self) -> bool {
        self.output
            .as_ref()
            .is_some_and(|output| !output.code.is_empty())
    }

    /// Run one line of input.
    pub fn execute(&mut self, line: &str) -> Outcome {
        let Some(command) = Command::parse(line) else {
            return Outcome::default();
        };
        let mut out = Outcome::default();
        out.push(LogKind::Command, line.trim());

        match command {
            Command::Help => out.info(HELP_TEXT),
            Command::Upload(target) => {
                let what = match target {
                    UploadTarget::Source => "source script",
                    UploadTarget::Mapping => "mapping file",
                };
                out.action(format!("Select a {what} to load"), Request::PickFile(target));
            }
            Command::Run => self.run(&mut out),
            Command::Download(mapping) => self.download(mapping, &mut out),
            Command::Export => match export_launcher(&self.store) {
                Ok(artifact) => {
                    let message = format!(
                        "Exporting {} with {} embedded rule(s)",
                        artifact.file_name, artifact.rules
                    );
                    out.action(message, Request::SaveFile(artifact));
                }
                Err(err) => out.error(format!("Export failed: {err}")),
            },
            Command::Swap => self.swap(&mut out),
            Command::Mode(arg) => match Mode::from_console_arg(&arg) {
                Some(mode) => {
                    self.set_mode(mode);
                    out.success(format!("Mode set to {mode}"));
                }
                None => out.error(format!(
                    "Invalid mode {arg:?}. Usage: mode <hil|sil> (current: {})",
                    self.mode
                )),
            },
            Command::Clear => {
                self.set_source(String::new());
                out.success("Source cleared");
            }
            Command::Docs => out.action("Opening documentation", Request::ShowDocs),
            Command::Rules => self.list_rules(&mut out),
            Command::Preset(name) => self.load_preset(&name, &mut out),
            Command::Status => out.info(self.status_line()),
            Command::Add(arg) => self.add_rule(&arg, &mut out),
            Command::Remove(id) => self.remove_rule(&id, &mut out),
            Command::Set(arg) => self.set_field(&arg, &mut out),
            Command::Assist => {
                if self.source.is_empty() {
                    out.error("No source loaded; nothing to rewrite");
                } else {
                    out.action("Requesting assistant rewrite", Request::Rewrite);
                }
            }
            Command::Suggest => {
                if self.source.is_empty() {
                    out.error("No source loaded; nothing to analyse");
                } else {
                    out.action("Requesting mapping suggestions", Request::Suggest);
                }
            }
            Command::Unknown(token) => {
                out.error(format!("Unknown command: {token}. Type 'help' for usage"))
            }
        }

        self.record(&out);
        out
    }

    /// Finish a [`Request::PickFile`]: one atomic update with the loaded contents.
    pub fn complete_upload<E: fmt::Display>(
        &mut self,
        target: UploadTarget,
        name: &str,
        contents: Result<String, E>,
    ) -> Outcome {
        let mut out = Outcome::default();
        match (target, contents) {
            (_, Err(err)) => out.error(format!("Could not read {name}: {err}")),
            (UploadTarget::Source, Ok(text)) => {
                let bytes = text.len();
                self.set_source(text);
                out.success(format!("Loaded {name} ({bytes} bytes)"));
            }
            (UploadTarget::Mapping, Ok(text)) => match self.store.replace_all_json(&text) {
                Ok(count) => {
                    self.refresh();
                    out.success(format!("Loaded {count} mapping rule(s) from {name}"));
                }
                Err(err) => out.error(format!("Mapping import rejected: {err}")),
            },
        }
        self.record(&out);
        out
    }

    /// Finish a [`Request::PickFile`] that got no path from the user.
    pub fn cancel_upload(&mut self, target: UploadTarget) -> Outcome {
        let mut out = Outcome::default();
        let what = match target {
            UploadTarget::Source => "source script",
            UploadTarget::Mapping => "mapping file",
        };
        out.error(format!("No path given for the {what}; nothing loaded"));
        self.record(&out);
        out
    }

    /// Finish a [`Request::SaveFile`] with the host's write result.
    pub fn complete_save<E: fmt::Display>(
        &mut self,
        file_name: &str,
        written: Result<PathBuf, E>,
    ) -> Outcome {
        let mut out = Outcome::default();
        match written {
            Ok(path) => out.success(format!("Saved {}", path.display())),
            Err(err) => out.error(format!("Could not save {file_name}: {err}")),
        }
        self.record(&out);
        out
    }

    /// Finish a [`Request::Rewrite`]. Success replaces the output text; failure changes
    /// nothing.
    pub fn apply_rewrite(&mut self, result: Result<String, AssistError>) -> Outcome {
        let mut out = Outcome::default();
        match result {
            Ok(code) => {
                self.output = Some(TransformationResult { code, changes: 0 });
                out.success("Assistant rewrite applied to output");
            }
            Err(err) => out.error(format!("Assistant rewrite failed: {err}")),
        }
        self.record(&out);
        out
    }

    /// Finish a [`Request::Suggest`]. Success merges new rules; failure changes nothing.
    pub fn apply_suggestions(
        &mut self,
        result: Result<Vec<SignalMapping>, AssistError>,
    ) -> Outcome {
        let mut out = Outcome::default();
        match result {
            Ok(rules) => {
                let offered = rules.len();
                let added = self.edit_store(|store| store.merge_suggested(rules));
                out.success(format!(
                    "Merged {added} of {offered} suggested rule(s); {} total",
                    self.store.len()
                ));
            }
            Err(err) => out.error(format!("Mapping suggestions failed: {err}")),
        }
        self.record(&out);
        out
    }

    fn record(&mut self, out: &Outcome) {
        for entry in &out.entries {
            debug!(kind = ?entry.kind, message = %entry.message, "console");
        }
        self.history.extend(out.entries.iter().cloned());
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
    }

    fn run(&mut self, out: &mut Outcome) {
        if self.source.is_empty() {
            out.info("Source is empty. Use 'upload' to load a script");
        }
        let result = transform(&self.source, self.mode, self.store.rules());
        out.success(format!(
            "Transformation complete ({}): {} change(s) using {} rule(s)",
            self.mode,
            result.changes,
            self.store.active_len()
        ));
        self.output = Some(result);
    }

    fn download(&mut self, mapping: bool, out: &mut Outcome) {
        if mapping {
            match export_mapping(&self.store) {
                Ok(artifact) => out.action(
                    format!("Saving {}", artifact.file_name),
                    Request::SaveFile(artifact),
                ),
                Err(err) => out.error(format!("Mapping export failed: {err}")),
            }
            return;
        }
        let Some(output) = self.output.as_ref().filter(|_| self.has_output()) else {
            out.error("No transformed code to download. Use 'run' first");
            return;
        };
        let artifact = BatchArtifact {
            file_name: format!("converted_{}.can", self.mode.as_str().to_lowercase()),
            contents: output.code.clone(),
            rules: self.store.len(),
            executable: false,
        };
        out.action(
            format!("Saving {}", artifact.file_name),
            Request::SaveFile(artifact),
        );
    }

    fn swap(&mut self, out: &mut Outcome) {
        if !self.has_output() {
            out.error("No transformed code to swap. Use 'run' first");
            return;
        }
        if let Some(output) = self.output.take() {
            self.source = output.code;
        }
        self.mode = self.mode.flip();
        self.refresh();
        out.success(format!(
            "Output moved to source; mode switched to {}",
            self.mode
        ));
    }

    fn list_rules(&self, out: &mut Outcome) {
        if self.store.is_empty() {
            out.info("No mapping rules defined");
            return;
        }
        let mut listing = format!("{} mapping rule(s):", self.store.len());
        for rule in self.store.rules() {
            listing.push_str(&format!(
                "\n  {}: {} <-> {}",
                rule.id, rule.real_signal, rule.sim_signal
            ));
            if let Some(description) = &rule.description {
                listing.push_str(&format!("  ({description})"));
            }
            if rule.is_inert() {
                listing.push_str("  [inactive]");
            }
        }
        out.info(listing);
    }

    fn load_preset(&mut self, name: &str, out: &mut Outcome) {
        if name.is_empty() {
            out.info(format!("Available presets: {}", presets::names()));
            return;
        }
        let preset = match name.parse::<Preset>() {
            Ok(preset) => preset,
            Err(err) => {
                out.error(err);
                return;
            }
        };
        match self.edit_store(|store| store.replace_all(preset.rules())) {
            Ok(()) => out.success(format!(
                "Loaded preset {} ({} rules)",
                preset.name(),
                self.store.len()
            )),
            Err(err) => out.error(format!("Preset {} rejected: {err}", preset.name())),
        }
    }

    fn status_line(&self) -> String {
        let output = match &self.output {
            Some(result) => format!("{} change(s) in last output", result.changes),
            None => "no output".to_owned(),
        };
        format!(
            "Mode {} | {} rule(s), {} active | source {} bytes | {}",
            self.mode,
            self.store.len(),
            self.store.active_len(),
            self.source.len(),
            output
        )
    }

    fn add_rule(&mut self, arg: &str, out: &mut Outcome) {
        let mut parts = arg.split_whitespace();
        let (Some(real), Some(sim)) = (parts.next(), parts.next()) else {
            out.error("Usage: add <real> <sim> [description]");
            return;
        };
        let description = parts.collect::<Vec<_>>().join(" ");
        let description = (!description.is_empty()).then_some(description);
        let id = self.edit_store(|store| store.add_new(real, sim, description));
        out.success(format!("Added rule {id}: {real} <-> {sim}"));
    }

    fn remove_rule(&mut self, id: &str, out: &mut Outcome) {
        if id.is_empty() {
            out.error("Usage: remove <id>");
            return;
        }
        match self.edit_store(|store| store.remove(id)) {
            Some(rule) => out.success(format!("Removed rule {}: {}", rule.id, rule.real_signal)),
            None => out.info(format!("No rule with id {id}")),
        }
    }

    fn set_field(&mut self, arg: &str, out: &mut Outcome) {
        let (id, rest) = split_word(arg);
        let (field, value) = split_word(rest);
        if id.is_empty() || field.is_empty() {
            out.error("Usage: set <id> <real|sim|description> <value>");
            return;
        }
        let value = value.to_owned();
        let field = match field.parse::<MappingField>() {
            Ok(field) => field,
            Err(err) => {
                out.error(err);
                return;
            }
        };
        if self.edit_store(|store| store.update(id, field, value)) {
            out.success(format!("Updated rule {id}"));
        } else {
            out.info(format!("No rule with id {id}"));
        }
    }
}

/// First whitespace-delimited word and the trimmed remainder.
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        let store = MappingStore::with_rules(vec![
            SignalMapping::new("1", "$EngineSpeed", "@sysvar::Engine::Speed"),
            SignalMapping::new("2", "EngineMsg.Torque", "@sysvar::Engine::Torque"),
        ])
        .unwrap();
        let mut session = Session::new(store, Mode::Sil);
        session.set_source("rpm = $EngineSpeed; tq = EngineMsg.Torque;");
        session
    }

    fn errors(out: &Outcome) -> Vec<&LogEntry> {
        out.entries
            .iter()
            .filter(|entry| entry.kind == LogKind::Error)
            .collect()
    }

    #[test]
    fn parse_splits_token_and_argument() {
        assert_eq!(Command::parse("   "), None);
        assert_eq!(Command::parse("  RUN  "), Some(Command::Run));
        assert_eq!(
            Command::parse("MODE   Hil "),
            Some(Command::Mode("Hil".into()))
        );
        assert_eq!(
            Command::parse("load My_Rules.JSON"),
            Some(Command::Upload(UploadTarget::Mapping))
        );
        assert_eq!(
            Command::parse("upload script.can"),
            Some(Command::Upload(UploadTarget::Source))
        );
        assert_eq!(Command::parse("?"), Some(Command::Help));
        for alias in ["readme", "DOCS", "man"] {
            assert_eq!(Command::parse(alias), Some(Command::Docs));
        }
        for alias in ["export", "batch", "Cli"] {
            assert_eq!(Command::parse(alias), Some(Command::Export));
        }
        assert_eq!(Command::parse("replace"), Some(Command::Swap));
        assert_eq!(Command::parse("list"), Some(Command::Rules));
        assert_eq!(
            Command::parse("FooBar baz"),
            Some(Command::Unknown("foobar".into()))
        );
    }

    #[test]
    fn unknown_command_logs_one_error_and_changes_nothing() {
        let mut session = session();
        let before = session.clone();
        let out = session.execute("foobar");
        let errs = errors(&out);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("foobar"));
        assert!(out.requests.is_empty());
        assert_eq!(session.source(), before.source());
        assert_eq!(session.mode(), before.mode());
        assert_eq!(session.store(), before.store());
    }

    #[test]
    fn invalid_mode_is_a_usage_error() {
        let mut session = session();
        let out = session.execute("mode xyz");
        assert_eq!(errors(&out).len(), 1);
        assert!(errors(&out)[0].message.contains("Usage"));
        assert_eq!(session.mode(), Mode::Sil);

        let out = session.execute("mode H");
        assert!(!out.has_error());
        assert_eq!(session.mode(), Mode::Hil);
    }

    #[test]
    fn run_reports_change_count() {
        let mut session = session();
        let out = session.execute("transform");
        assert!(!out.has_error());
        let last = out.entries.last().unwrap();
        assert_eq!(last.kind, LogKind::Success);
        assert!(last.message.contains("2 change(s)"));
        assert_eq!(
            session.output().unwrap().code,
            "rpm = @sysvar::Engine::Speed; tq = @sysvar::Engine::Torque;"
        );
    }

    #[test]
    fn run_on_empty_source_reports_no_changes() {
        let mut session = Session::default();
        let out = session.execute("run");
        assert!(!out.has_error());
        assert!(out.entries.last().unwrap().message.contains("0 change(s)"));
        assert_eq!(session.output().unwrap().code, "");
        // An empty output still cannot be swapped or downloaded.
        assert!(session.execute("swap").has_error());
        assert!(session.execute("download").has_error());
    }

    #[test]
    fn swap_moves_output_and_flips_mode() {
        let mut session = session();
        session.execute("run");
        let out = session.execute("swap");
        assert!(!out.has_error());
        assert_eq!(session.mode(), Mode::Hil);
        assert_eq!(
            session.source(),
            "rpm = @sysvar::Engine::Speed; tq = @sysvar::Engine::Torque;"
        );
        // The live output now converts back towards HIL.
        assert_eq!(
            session.output().unwrap().code,
            "rpm = $EngineSpeed; tq = EngineMsg.Torque;"
        );
    }

    #[test]
    fn swap_and_download_need_output() {
        let mut session = session();
        session.execute("clear");
        assert_eq!(session.source(), "");
        assert!(session.output().is_none());

        let out = session.execute("swap");
        assert_eq!(errors(&out).len(), 1);
        assert_eq!(session.mode(), Mode::Sil);
        assert!(session.execute("download").has_error());
    }

    #[test]
    fn download_and_export_request_files() {
        let mut session = session();
        session.execute("run");
        let out = session.execute("save");
        match out.requests.as_slice() {
            [Request::SaveFile(artifact)] => {
                assert_eq!(artifact.file_name, "converted_sil.can");
                assert!(artifact.contents.contains("@sysvar::Engine::Speed"));
            }
            other => panic!("unexpected requests: {other:?}"),
        }

        let out = session.execute("cli");
        match out.requests.as_slice() {
            [Request::SaveFile(artifact)] => {
                assert!(artifact.executable);
                assert_eq!(artifact.rules, 2);
            }
            other => panic!("unexpected requests: {other:?}"),
        }

        let out = session.execute("download map");
        assert!(matches!(
            out.requests.as_slice(),
            [Request::SaveFile(artifact)] if artifact.file_name.ends_with(".json")
        ));
    }

    #[test]
    fn upload_completion_is_atomic() {
        let mut session = session();
        let out = session.execute("load rules");
        assert_eq!(out.requests, [Request::PickFile(UploadTarget::Mapping)]);

        let before = session.store().clone();
        let out = session.complete_upload(UploadTarget::Mapping, "bad.json", Ok::<_, String>(
            r#"{"not": "an array"}"#.into(),
        ));
        assert!(out.has_error());
        assert_eq!(session.store(), &before);

        let out = session.complete_upload(
            UploadTarget::Mapping,
            "rules.json",
            Ok::<_, String>(r#"[{"id":"1","realSignal":"rpm","simSignal":"RPM"}]"#.into()),
        );
        assert!(!out.has_error());
        assert_eq!(session.store().len(), 1);
        assert_eq!(session.output().unwrap().changes, 1);

        let out = session.complete_upload(
            UploadTarget::Source,
            "missing.can",
            Err::<String, _>("no such file"),
        );
        assert!(out.has_error());
        assert!(session.source().starts_with("rpm"));
    }

    #[test]
    fn failed_assistants_leave_state_untouched() {
        let mut session = session();
        session.execute("run");
        let before = session.clone();

        let out = session.apply_rewrite(Err(AssistError::Unavailable("code assistant")));
        assert_eq!(errors(&out).len(), 1);
        let out = session.apply_suggestions(Err(AssistError::Failed(anyhow::anyhow!("timeout"))));
        assert_eq!(errors(&out).len(), 1);

        assert_eq!(session.source(), before.source());
        assert_eq!(session.output(), before.output());
        assert_eq!(session.store(), before.store());
    }

    #[test]
    fn suggestions_merge_into_store() {
        let mut session = session();
        let out = session.apply_suggestions(Ok(vec![
            SignalMapping::new("x", "$EngineSpeed", "@dup"),
            SignalMapping::new("y", "$Gear", "@sysvar::Trans::Gear"),
        ]));
        assert!(!out.has_error());
        assert_eq!(session.store().len(), 3);
        assert_eq!(session.store().get("3").unwrap().real_signal, "$Gear");
    }

    #[test]
    fn rule_editing_commands() {
        let mut session = session();
        assert!(!session.execute("add $Gear @sysvar::Trans::Gear engaged gear").has_error());
        assert_eq!(
            session.store().get("3").unwrap().description.as_deref(),
            Some("engaged gear")
        );
        assert!(session.execute("add $Only").has_error());
        assert!(!session.execute("set 3 sim @sysvar::Gear").has_error());
        assert_eq!(session.store().get("3").unwrap().sim_signal, "@sysvar::Gear");
        assert!(!session.execute("set  3   real  $Gear2 ").has_error());
        assert_eq!(session.store().get("3").unwrap().real_signal, "$Gear2");
        assert!(!session.execute("set 3 desc top  gear").has_error());
        assert_eq!(
            session.store().get("3").unwrap().description.as_deref(),
            Some("top  gear")
        );
        assert!(session.execute("set 3").has_error());
        assert!(session.execute("set 3 colour red").has_error());

        let out = session.execute("remove 99");
        assert!(!out.has_error());
        assert!(!session.execute("remove 3").has_error());
        assert_eq!(session.store().len(), 2);

        let out = session.execute("rules");
        assert!(out.entries[1].message.contains("$EngineSpeed <-> @sysvar::Engine::Speed"));
    }

    #[test]
    fn presets_replace_the_store() {
        let mut session = session();
        assert!(session.execute("preset").entries[1].message.contains("chassis"));
        assert!(session.execute("preset body").has_error());
        assert!(!session.execute("preset chassis").has_error());
        assert_eq!(session.store().rules(), Preset::Chassis.rules().as_slice());
    }

    #[test]
    fn history_accumulates() {
        let mut session = session();
        session.execute("help");
        session.execute("status");
        session.execute("docs");
        assert_eq!(session.history().len(), 6);
        assert_eq!(session.history()[0].to_string(), "> help");
        assert_eq!(session.history()[5].kind, LogKind::Action);
    }

    #[test]
    fn history_keeps_only_the_latest_entries() {
        let mut session = session();
        for _ in 0..HISTORY_LIMIT {
            session.execute("status");
        }
        session.execute("help");
        assert_eq!(session.history().len(), HISTORY_LIMIT);
        assert_eq!(session.history()[HISTORY_LIMIT - 2].to_string(), "> help");
        assert_eq!(session.history()[0].to_string(), "> status");
    }

    #[test]
    fn host_completions_are_logged() {
        let mut session = session();
        let out = session.complete_save("out.can", Err::<PathBuf, _>("read-only file system"));
        assert_eq!(errors(&out).len(), 1);
        assert!(errors(&out)[0].message.contains("out.can"));
        let out = session.complete_save("out.can", Ok::<_, String>(PathBuf::from("dir/out.can")));
        assert_eq!(out.entries[0].kind, LogKind::Success);

        let before = session.source().to_owned();
        let out = session.cancel_upload(UploadTarget::Source);
        assert!(out.has_error());
        assert_eq!(session.source(), before);
        assert_eq!(session.history().len(), 3);
    }
}
