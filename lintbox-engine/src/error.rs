//! Error types for the engine crate.

use std::time::Duration;

/// Unexpected failures while invoking the engine.
///
/// Statements the engine cannot process are not errors; they are reported
/// in-band as [`lintbox_core::EngineError`] values inside the outcome.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EngineInvocationError {
    /// The engine did not finish within the configured bound.
    #[error("engine invocation timed out after {}ms", limit.as_millis())]
    Timeout { limit: Duration },

    /// The engine task panicked or was cancelled.
    #[error("engine crashed: {0}")]
    Crashed(String),

    /// The engine rejected the invocation as a whole.
    #[error("engine failed: {0}")]
    Failed(String),
}
