//! Built-in PostgreSQL engine.
//!
//! Parses with `sqlparser`'s PostgreSQL dialect one statement at a time, so
//! a statement that fails to parse is reported and the rest of the source is
//! still linted or formatted.

mod format;
mod lint;
mod rules;
mod scan;

use lintbox_core::{EffectiveConfig, FormatOutcome, LintOutcome};

use crate::{EngineInvocationError, SqlEngine};

/// Stateless PostgreSQL lint/format engine. Every call sees only its own
/// source and configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgEngine;

impl PgEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// `(code, name)` of every rule this engine knows.
    pub fn rules() -> impl Iterator<Item = (&'static str, &'static str)> {
        rules::RULES.iter().map(|r| (r.code, r.name))
    }
}

impl SqlEngine for PgEngine {
    fn name(&self) -> &'static str {
        "lintbox-pg"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn lint(
        &self,
        source: &str,
        config: &EffectiveConfig,
        with_fix: bool,
    ) -> Result<LintOutcome, EngineInvocationError> {
        lint::lint(source, &config.lint, with_fix)
    }

    fn format(
        &self,
        source: &str,
        config: &EffectiveConfig,
    ) -> Result<FormatOutcome, EngineInvocationError> {
        Ok(format::format(source, &config.format))
    }
}

/// Statement splitting, exposed for fuzzing.
#[doc(hidden)]
pub fn split_offsets(source: &str) -> Vec<(usize, usize)> {
    scan::split(source).into_iter().map(|s| (s.offset, s.text_end())).collect()
}
