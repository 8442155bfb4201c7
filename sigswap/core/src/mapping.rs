//! Signal mapping rules, transformation direction, and the session-owned rule store.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::MappingError;

/// One bidirectional substitution rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignalMapping {
    /// Identity within a store; never used for ordering or matching.
    pub id: String,
    /// Hardware-domain token.
    pub real_signal: String,
    /// Simulation-domain token.
    pub sim_signal: String,
    /// Free-form note shown in listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SignalMapping {
    /// Build a rule from its parts.
    pub fn new(
        id: impl Into<String>,
        real_signal: impl Into<String>,
        sim_signal: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            real_signal: real_signal.into(),
            sim_signal: sim_signal.into(),
            description: None,
        }
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Text searched for when transforming in `mode`.
    pub fn pattern(&self, mode: Mode) -> &str {
        match mode {
            Mode::Sil => &self.real_signal,
            Mode::Hil => &self.sim_signal,
        }
    }

    /// Text written in place of the pattern when transforming in `mode`.
    pub fn replacement(&self, mode: Mode) -> &str {
        match mode {
            Mode::Sil => &self.sim_signal,
            Mode::Hil => &self.real_signal,
        }
    }

    /// A rule missing either side never matches.
    pub fn is_inert(&self) -> bool {
        self.real_signal.is_empty() || self.sim_signal.is_empty()
    }
}

/// Transformation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Simulation target: real signal names become system variables.
    #[default]
    #[serde(rename = "SIL")]
    Sil,
    /// Hardware target: system variables become real signal names.
    #[serde(rename = "HIL")]
    Hil,
}

impl Mode {
    /// The opposite direction.
    pub fn flip(self) -> Self {
        match self {
            Mode::Sil => Mode::Hil,
            Mode::Hil => Mode::Sil,
        }
    }

    /// Accepts the console spellings `hil`/`h` and `sil`/`s`, case-insensitively.
    pub fn from_console_arg(arg: &str) -> Option<Self> {
        match arg.trim().to_ascii_lowercase().as_str() {
            "hil" | "h" => Some(Mode::Hil),
            "sil" | "s" => Some(Mode::Sil),
            _ => None,
        }
    }

    /// Canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Sil => "SIL",
            Mode::Hil => "HIL",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SIL" => Ok(Mode::Sil),
            "HIL" => Ok(Mode::Hil),
            other => Err(format!("unknown mode {other:?} (expected HIL or SIL)")),
        }
    }
}

/// Editable field of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingField {
    /// `realSignal`.
    RealSignal,
    /// `simSignal`.
    SimSignal,
    /// `description`; an empty value clears it.
    Description,
}

impl FromStr for MappingField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "real" | "realsignal" => Ok(MappingField::RealSignal),
            "sim" | "simsignal" => Ok(MappingField::SimSignal),
            "desc" | "description" => Ok(MappingField::Description),
            other => Err(format!(
                "unknown field {other:?} (expected real, sim or description)"
            )),
        }
    }
}

/// Ordered rule collection owned by one session.
///
/// Insertion order is kept for display and export; matching order is decided by the
/// transformation engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingStore {
    rules: Vec<SignalMapping>,
}

impl MappingStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with `rules`, validated like [`MappingStore::replace_all`].
    pub fn with_rules(rules: Vec<SignalMapping>) -> Result<Self, MappingError> {
        let mut store = Self::new();
        store.replace_all(rules)?;
        Ok(store)
    }

    /// Rules in insertion order.
    pub fn rules(&self) -> &[SignalMapping] {
        &self.rules
    }

    /// Number of rules, inert ones included.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when the store holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules that can actually match (both sides non-empty).
    pub fn active_len(&self) -> usize {
        self.rules.iter().filter(|rule| !rule.is_inert()).count()
    }

    /// Look up a rule by id.
    pub fn get(&self, id: &str) -> Option<&SignalMapping> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    /// One plus the largest numeric id present, or `"1"` when no id is numeric. At
    /// `u64::MAX` it falls back to the smallest unused positive number.
    pub fn next_id(&self) -> String {
        next_numeric_id(&self.rules).to_string()
    }

    /// Append a rule carrying a caller-chosen id.
    pub fn add(&mut self, rule: SignalMapping) -> Result<(), MappingError> {
        if self.get(&rule.id).is_some() {
            return Err(MappingError::DuplicateId { id: rule.id });
        }
        debug!(id = %rule.id, "adding mapping rule");
        self.rules.push(rule);
        Ok(())
    }

    /// Append a rule under a freshly allocated id and return that id.
    pub fn add_new(
        &mut self,
        real_signal: impl Into<String>,
        sim_signal: impl Into<String>,
        description: Option<String>,
    ) -> String {
        let id = self.next_id();
        let mut rule = SignalMapping::new(id.clone(), real_signal, sim_signal);
        rule.description = description;
        self.rules.push(rule);
        id
    }

    /// Delete the rule with `id`. Absent ids are ignored.
    pub fn remove(&mut self, id: &str) -> Option<SignalMapping> {
        let pos = self.rules.iter().position(|rule| rule.id == id)?;
        Some(self.rules.remove(pos))
    }

    /// Overwrite one field of the rule with `id`. Returns false when no such rule exists.
    pub fn update(&mut self, id: &str, field: MappingField, value: impl Into<String>) -> bool {
        let Some(rule) = self.rules.iter_mut().find(|rule| rule.id == id) else {
            return false;
        };
        let value = value.into();
        match field {
            MappingField::RealSignal => rule.real_signal = value,
            MappingField::SimSignal => rule.sim_signal = value,
            MappingField::Description => {
                rule.description = if value.is_empty() { None } else { Some(value) };
            }
        }
        true
    }

    /// Swap in a whole new rule set. On error the current rules are kept.
    pub fn replace_all(&mut self, rules: Vec<SignalMapping>) -> Result<(), MappingError> {
        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(MappingError::DuplicateId {
                    id: rule.id.clone(),
                });
            }
        }
        debug!(rules = rules.len(), "replacing mapping store");
        self.rules = rules;
        Ok(())
    }

    /// Validate a JSON payload and swap it in. Returns the number of rules loaded.
    pub fn replace_all_json(&mut self, payload: &str) -> Result<usize, MappingError> {
        let rules = parse_rules_json(payload)?;
        let count = rules.len();
        self.replace_all(rules)?;
        Ok(count)
    }

    /// Append suggestions whose `realSignal` is not already mapped, renumbering them.
    /// Returns how many were appended.
    pub fn merge_suggested(&mut self, suggested: Vec<SignalMapping>) -> usize {
        let mut appended = 0;
        for mut rule in suggested {
            if self
                .rules
                .iter()
                .any(|existing| existing.real_signal == rule.real_signal)
            {
                continue;
            }
            rule.id = next_numeric_id(&self.rules).to_string();
            self.rules.push(rule);
            appended += 1;
        }
        debug!(appended, "merged suggested mappings");
        appended
    }

    /// Pretty JSON in the mapping file format.
    pub fn to_json(&self) -> Result<String, MappingError> {
        Ok(serde_json::to_string_pretty(&self.rules)?)
    }
}

/// One past the largest numeric id. Once that would overflow, the smallest positive
/// number not already used as an id.
fn next_numeric_id(rules: &[SignalMapping]) -> u64 {
    let max = rules
        .iter()
        .filter_map(|rule| rule.id.trim().parse::<u64>().ok())
        .max();
    match max {
        None => 1,
        Some(max) => max
            .checked_add(1)
            .unwrap_or_else(|| lowest_free_id(rules)),
    }
}

fn lowest_free_id(rules: &[SignalMapping]) -> u64 {
    let taken: HashSet<&str> = rules.iter().map(|rule| rule.id.as_str()).collect();
    // Among 1..=len+1 at least one number is unused.
    (1..=rules.len() as u64 + 1)
        .find(|candidate| !taken.contains(candidate.to_string().as_str()))
        .unwrap_or(1)
}

/// Parse a mapping file, checking the schema explicitly before accepting anything.
///
/// The root must be an array; every element must be an object with string `id`,
/// `realSignal` and `simSignal`, and an optional string (or null) `description`.
pub fn parse_rules_json(payload: &str) -> Result<Vec<SignalMapping>, MappingError> {
    let root: Value = serde_json::from_str(payload)?;
    let Value::Array(items) = root else {
        return Err(MappingError::NotASequence {
            found: json_type_name(&root),
        });
    };
    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_record(index, item))
        .collect()
}

fn parse_record(index: usize, item: &Value) -> Result<SignalMapping, MappingError> {
    let Value::Object(fields) = item else {
        return Err(MappingError::InvalidRecord {
            index,
            reason: format!("expected an object, found {}", json_type_name(item)),
        });
    };
    let description = match fields.get("description") {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(other) => {
            return Err(MappingError::InvalidRecord {
                index,
                reason: format!(
                    "field \"description\" must be a string, found {}",
                    json_type_name(other)
                ),
            })
        }
    };
    Ok(SignalMapping {
        id: required_string(index, fields, "id")?,
        real_signal: required_string(index, fields, "realSignal")?,
        sim_signal: required_string(index, fields, "simSignal")?,
        description,
    })
}

fn required_string(
    index: usize,
    fields: &Map<String, Value>,
    name: &str,
) -> Result<String, MappingError> {
    match fields.get(name) {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => Err(MappingError::InvalidRecord {
            index,
            reason: format!(
                "field {name:?} must be a string, found {}",
                json_type_name(other)
            ),
        }),
        None => Err(MappingError::InvalidRecord {
            index,
            reason: format!("missing required field {name:?}"),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
