//! sigswap core: converts test scripts between real (HIL) signal names and simulated (SIL)
//! system variables using a table of bidirectional mapping rules.
//!
//! The crate holds the mapping store, the deterministic substitution engine, the console
//! command interpreter, and the batch export adapter. It performs no terminal or dialog
//! I/O of its own; hosts fulfil the [`console::Request`]s it emits.
#![deny(missing_docs)]

/// Optional AI-assisted collaborator seams.
pub mod assist;
/// Headless file-to-file conversion.
pub mod batch;
/// Command interpreter and session state.
pub mod console;
/// Error types.
pub mod error;
/// Batch launcher and mapping file export.
pub mod export;
/// Mapping rules, modes, and the rule store.
pub mod mapping;
/// Built-in rule sets.
pub mod presets;
/// Substitution engine.
pub mod transform;

pub use batch::{run_batch, BatchReport, BatchRequest, MappingSource};
pub use console::{Command, LogEntry, LogKind, Outcome, Request, Session, UploadTarget};
pub use error::{AssistError, BatchError, MappingError};
pub use export::BatchArtifact;
pub use mapping::{parse_rules_json, MappingField, MappingStore, Mode, SignalMapping};
pub use presets::Preset;
pub use transform::{transform, TransformationResult};
