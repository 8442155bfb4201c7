//! Seams for the optional AI-assisted collaborators.
//!
//! Neither collaborator feeds the deterministic engine. A rewrite replaces the
//! transformed text wholesale; suggestions are merged into the mapping store. Sessions
//! consume their outcomes through [`crate::console::Session::apply_rewrite`] and
//! [`crate::console::Session::apply_suggestions`].

use async_trait::async_trait;

use crate::error::AssistError;
use crate::mapping::{Mode, SignalMapping};

/// Rewrites a whole script for the target mode.
#[async_trait]
pub trait CodeAssistant: Send + Sync {
    /// Return the converted script.
    async fn rewrite(
        &self,
        source: &str,
        mode: Mode,
        rules: &[SignalMapping],
    ) -> Result<String, AssistError>;
}

/// Proposes mapping rules for signals found in a script.
#[async_trait]
pub trait MappingAdvisor: Send + Sync {
    /// Return candidate rules; ids are reassigned on merge.
    async fn suggest(
        &self,
        source: &str,
        existing: &[SignalMapping],
    ) -> Result<Vec<SignalMapping>, AssistError>;
}

/// Optional collaborators available to a session.
#[derive(Default)]
pub struct Assistants {
    /// Script rewriting service.
    pub code: Option<Box<dyn CodeAssistant>>,
    /// Mapping suggestion service.
    pub mappings: Option<Box<dyn MappingAdvisor>>,
}

impl Assistants {
    /// No collaborators configured.
    pub fn none() -> Self {
        Self::default()
    }

    /// Ask the rewrite service, or report it as unavailable.
    pub async fn rewrite(
        &self,
        source: &str,
        mode: Mode,
        rules: &[SignalMapping],
    ) -> Result<String, AssistError> {
        match &self.code {
            Some(assistant) => assistant.rewrite(source, mode, rules).await,
            None => Err(AssistError::Unavailable("code assistant")),
        }
    }

    /// Ask the suggestion service, or report it as unavailable.
    pub async fn suggest(
        &self,
        source: &str,
        existing: &[SignalMapping],
    ) -> Result<Vec<SignalMapping>, AssistError> {
        match &self.mappings {
            Some(advisor) => advisor.suggest(source, existing).await,
            None => Err(AssistError::Unavailable("mapping advisor")),
        }
    }
}
