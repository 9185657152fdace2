//! Results produced by a lint or format invocation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A style or policy issue tied to a rule and a source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub rule_code: String,
    pub rule_name: String,
    pub rule_category: String,
    /// 1-based line of the offending token.
    pub line_number: usize,
    /// 0-based character offset within that line.
    pub column_offset: usize,
    /// The full text of the offending source line.
    pub line: String,
    /// Byte offset of the enclosing statement within the source.
    pub statement_location: usize,
    pub description: String,
    /// Whether the rule can fix this kind of violation at all.
    pub is_auto_fixable: bool,
    /// Whether fixing was requested and allowed for this rule in this run.
    pub is_fix_enabled: bool,
    pub help: Option<String>,
}

impl Violation {
    /// Sort key placing violations in source order.
    #[must_use]
    pub fn position(&self) -> (usize, usize) {
        (self.line_number, self.column_offset)
    }
}

/// A statement the engine could not process. Returned as data, never as a
/// service failure.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EngineError {
    pub statement: String,
    pub message: String,
    pub hint: Option<String>,
}

/// Result of linting one source text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintOutcome {
    pub violations: Vec<Violation>,
    pub errors: BTreeSet<EngineError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_source_code: Option<String>,
}

/// Result of formatting one source text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatOutcome {
    pub formatted_source_code: String,
    pub errors: BTreeSet<EngineError>,
}
