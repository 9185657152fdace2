//! Lint/format engine abstraction trait.
//!
//! Allows swapping the bundled PostgreSQL engine for another implementation
//! without changing the invocation logic.

use lintbox_core::{EffectiveConfig, FormatOutcome, LintOutcome};

use crate::EngineInvocationError;

/// A SQL lint/format capability.
///
/// Implementations must be stateless with respect to configuration: every
/// call receives the configuration it runs with and must not retain it.
/// Calls run on blocking worker threads and may execute concurrently.
pub trait SqlEngine: Send + Sync + 'static {
    /// Short engine name reported by the version endpoint.
    fn name(&self) -> &'static str;

    /// Engine version reported by the version endpoint.
    fn version(&self) -> &'static str;

    /// Analyse `source` and, when `with_fix` is set, apply automatic fixes.
    ///
    /// # Errors
    /// Returns [`EngineInvocationError::Failed`] only when the invocation as
    /// a whole cannot run; per-statement problems belong in the outcome.
    fn lint(
        &self,
        source: &str,
        config: &EffectiveConfig,
        with_fix: bool,
    ) -> Result<LintOutcome, EngineInvocationError>;

    /// Reformat `source`.
    ///
    /// # Errors
    /// Returns [`EngineInvocationError::Failed`] only when the invocation as
    /// a whole cannot run.
    fn format(
        &self,
        source: &str,
        config: &EffectiveConfig,
    ) -> Result<FormatOutcome, EngineInvocationError>;
}
