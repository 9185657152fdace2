//! Lint and format configuration types.
//!
//! Field names use the hyphenated spelling on the wire (`postgres-target-version`,
//! `comma-at-beginning`, ...). Keys the service does not know about are kept in
//! an `extra` bag and written back out verbatim, so newer engine options pass
//! through without a code change here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Default PostgreSQL major version targeted by the linter.
pub const DEFAULT_POSTGRES_TARGET_VERSION: u32 = 14;

/// Pattern that accepts any non-empty name.
pub const ANY_NAME_PATTERN: &str = "^.+$";

/// Upper bound for [`FormatConfig::lines_between_statements`].
pub const MAX_LINES_BETWEEN_STATEMENTS: u32 = 10;

/// Linter options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LintConfig {
    pub postgres_target_version: u32,
    /// Rule codes, code prefixes or rule names to enable. Empty enables all.
    pub select: Vec<String>,
    /// Rule codes, code prefixes or rule names to disable.
    pub ignore: Vec<String>,
    /// Restricts fixing to these rules. Empty allows every fixable rule.
    pub fixable: Vec<String>,
    /// Rules that must never be fixed.
    pub unfixable: Vec<String>,
    /// Ignore inline `-- noqa` suppression comments.
    pub ignore_noqa: bool,
    pub allowed_extensions: Vec<String>,
    pub allowed_languages: Vec<String>,
    pub disallowed_schemas: Vec<String>,
    pub disallowed_data_types: Vec<String>,
    pub required_columns: Vec<String>,
    pub timestamp_column_suffix: String,
    pub date_column_suffix: String,
    pub regex_partition: String,
    pub regex_index: String,
    pub regex_constraint_primary_key: String,
    pub regex_constraint_unique_key: String,
    pub regex_constraint_foreign_key: String,
    pub regex_constraint_check: String,
    pub regex_constraint_exclusion: String,
    pub regex_sequence: String,
    /// Unrecognised keys, preserved as supplied.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            postgres_target_version: DEFAULT_POSTGRES_TARGET_VERSION,
            select: Vec::new(),
            ignore: Vec::new(),
            fixable: Vec::new(),
            unfixable: Vec::new(),
            ignore_noqa: false,
            allowed_extensions: Vec::new(),
            allowed_languages: Vec::new(),
            disallowed_schemas: Vec::new(),
            disallowed_data_types: Vec::new(),
            required_columns: Vec::new(),
            timestamp_column_suffix: "_at".to_owned(),
            date_column_suffix: "_date".to_owned(),
            regex_partition: ANY_NAME_PATTERN.to_owned(),
            regex_index: ANY_NAME_PATTERN.to_owned(),
            regex_constraint_primary_key: ANY_NAME_PATTERN.to_owned(),
            regex_constraint_unique_key: ANY_NAME_PATTERN.to_owned(),
            regex_constraint_foreign_key: ANY_NAME_PATTERN.to_owned(),
            regex_constraint_check: ANY_NAME_PATTERN.to_owned(),
            regex_constraint_exclusion: ANY_NAME_PATTERN.to_owned(),
            regex_sequence: ANY_NAME_PATTERN.to_owned(),
            extra: Map::new(),
        }
    }
}

impl LintConfig {
    /// The naming-policy patterns, keyed by their wire name.
    #[must_use]
    pub fn naming_patterns(&self) -> [(&'static str, &str); 8] {
        [
            ("regex-partition", &self.regex_partition),
            ("regex-index", &self.regex_index),
            ("regex-constraint-primary-key", &self.regex_constraint_primary_key),
            ("regex-constraint-unique-key", &self.regex_constraint_unique_key),
            ("regex-constraint-foreign-key", &self.regex_constraint_foreign_key),
            ("regex-constraint-check", &self.regex_constraint_check),
            ("regex-constraint-exclusion", &self.regex_constraint_exclusion),
            ("regex-sequence", &self.regex_sequence),
        ]
    }
}

/// Formatter options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FormatConfig {
    /// Place list separators at the start of the line instead of the end.
    pub comma_at_beginning: bool,
    /// Put the statement terminator on its own line.
    pub new_line_before_semicolon: bool,
    /// Drop the `pg_catalog.` qualifier from function calls.
    pub remove_pg_catalog_from_functions: bool,
    /// Blank lines emitted between consecutive statements.
    pub lines_between_statements: u32,
    /// Unrecognised keys, preserved as supplied.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            comma_at_beginning: true,
            new_line_before_semicolon: true,
            remove_pg_catalog_from_functions: true,
            lines_between_statements: 1,
            extra: Map::new(),
        }
    }
}

/// The fully merged configuration used for exactly one engine invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectiveConfig {
    pub lint: LintConfig,
    pub format: FormatConfig,
}

impl EffectiveConfig {
    /// Check the fields whose validity cannot be expressed through their type.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidPattern`] if a naming-policy field does not
    /// compile as a regular expression, and [`CoreError::InvalidConfig`] if
    /// `lines-between-statements` exceeds [`MAX_LINES_BETWEEN_STATEMENTS`].
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.format.lines_between_statements > MAX_LINES_BETWEEN_STATEMENTS {
            return Err(CoreError::InvalidConfig {
                section: "format",
                reason: format!(
                    "lines-between-statements must be at most {MAX_LINES_BETWEEN_STATEMENTS}"
                ),
            });
        }
        for (field, pattern) in self.lint.naming_patterns() {
            regex::Regex::new(pattern).map_err(|e| CoreError::InvalidPattern {
                field: field.to_owned(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Render the configuration as a TOML document with `[lint]` and
    /// `[format]` tables, the same shape a client keeps in its editor.
    ///
    /// Passthrough values that are JSON `null` have no TOML equivalent and
    /// are omitted.
    ///
    /// # Errors
    /// Returns [`CoreError::Render`] if a passthrough value cannot be
    /// expressed in TOML (for example an integer above `i64::MAX`).
    pub fn to_toml(&self) -> Result<String, CoreError> {
        let value = serde_json::to_value(self).map_err(|e| CoreError::Render(e.to_string()))?;
        toml::to_string(&strip_nulls(value)).map_err(|e| CoreError::Render(e.to_string()))
    }
}

fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().filter(|v| !v.is_null()).map(strip_nulls).collect())
        }
        other => other,
    }
}

/// Per-request configuration fragment as received on the wire.
///
/// Both sections are raw key/value bags; they are only given a type when
/// merged onto a baseline by [`crate::merge::merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestConfig {
    pub lint: Map<String, Value>,
    pub format: Map<String, Value>,
}
