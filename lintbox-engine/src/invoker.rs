//! Bounded, isolated engine invocation.
//!
//! Every call runs on a blocking worker thread with its own copy of the
//! source and the effective configuration, under a wall-clock bound. The
//! invoker also normalises outcomes so callers can rely on their
//! invariants whatever engine is plugged in.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use lintbox_core::{EffectiveConfig, FormatOutcome, LintOutcome, Violation};

use crate::{EngineInvocationError, SqlEngine};

/// Default bound on a single engine invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs lint and format requests against a [`SqlEngine`].
///
/// # Cancel Safety
/// Not cancel safe in the strict sense: dropping the future, or hitting the
/// timeout, abandons the worker thread, which runs to completion and has its
/// result discarded.
#[derive(Clone)]
pub struct EngineInvoker {
    engine: Arc<dyn SqlEngine>,
    timeout: Duration,
}

impl fmt::Debug for EngineInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineInvoker")
            .field("engine", &self.engine.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl EngineInvoker {
    /// Create an invoker with the default timeout.
    #[must_use]
    pub fn new(engine: Arc<dyn SqlEngine>) -> Self {
        Self { engine, timeout: DEFAULT_TIMEOUT }
    }

    /// Create an invoker with a custom timeout.
    #[must_use]
    pub fn with_timeout(engine: Arc<dyn SqlEngine>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    #[must_use]
    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    #[must_use]
    pub fn engine_version(&self) -> &'static str {
        self.engine.version()
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Lint `source` with `config`.
    ///
    /// Violations come back ordered by position. Without `with_fix` no
    /// violation is fix-enabled and no fixed source is returned; a fixed
    /// source identical to the input is dropped.
    ///
    /// # Errors
    /// Returns [`EngineInvocationError::Timeout`] when the bound elapses,
    /// [`EngineInvocationError::Crashed`] if the engine panics, and passes
    /// through [`EngineInvocationError::Failed`] from the engine.
    pub async fn lint(
        &self,
        source: String,
        config: EffectiveConfig,
        with_fix: bool,
    ) -> Result<LintOutcome, EngineInvocationError> {
        let invocation = Uuid::new_v4();
        let source: Arc<str> = Arc::from(source);
        let started = Instant::now();

        tracing::info!(
            %invocation,
            engine = self.engine.name(),
            bytes = source.len(),
            with_fix,
            "starting lint"
        );

        let engine = Arc::clone(&self.engine);
        let input = Arc::clone(&source);
        let mut outcome = self
            .run(invocation, move || engine.lint(&input, &config, with_fix))
            .await?;

        outcome.violations.sort_by_key(Violation::position);
        if !with_fix {
            for violation in &mut outcome.violations {
                violation.is_fix_enabled = false;
            }
            outcome.fixed_source_code = None;
        }
        if outcome.fixed_source_code.as_deref() == Some(&*source) {
            outcome.fixed_source_code = None;
        }

        tracing::info!(
            %invocation,
            violations = outcome.violations.len(),
            errors = outcome.errors.len(),
            fixed = outcome.fixed_source_code.is_some(),
            elapsed_ms = started.elapsed().as_millis(),
            "lint complete"
        );
        Ok(outcome)
    }

    /// Format `source` with `config`.
    ///
    /// # Errors
    /// Same as [`EngineInvoker::lint`].
    pub async fn format(
        &self,
        source: String,
        config: EffectiveConfig,
    ) -> Result<FormatOutcome, EngineInvocationError> {
        let invocation = Uuid::new_v4();
        let started = Instant::now();

        tracing::info!(
            %invocation,
            engine = self.engine.name(),
            bytes = source.len(),
            "starting format"
        );

        let engine = Arc::clone(&self.engine);
        let outcome = self.run(invocation, move || engine.format(&source, &config)).await?;

        tracing::info!(
            %invocation,
            errors = outcome.errors.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "format complete"
        );
        Ok(outcome)
    }

    async fn run<T, F>(&self, invocation: Uuid, job: F) -> Result<T, EngineInvocationError>
    where
        F: FnOnce() -> Result<T, EngineInvocationError> + Send + 'static,
        T: Send + 'static,
    {
        let task = tokio::task::spawn_blocking(job);
        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => {
                tracing::error!(%invocation, error = %join, "engine task crashed");
                Err(EngineInvocationError::Crashed(join.to_string()))
            }
            Err(_) => {
                tracing::warn!(
                    %invocation,
                    limit_ms = self.timeout.as_millis(),
                    "engine invocation timed out"
                );
                Err(EngineInvocationError::Timeout { limit: self.timeout })
            }
        }
    }
}
