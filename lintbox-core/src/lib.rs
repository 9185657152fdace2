//! Core types for the lintbox SQL lint/format playground.
//!
//! Defines the configuration model and the merger that applies a
//! per-request fragment onto a baseline, the lint/format outcome types, and
//! the share identifiers and entries persisted by the share store.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod error;
pub mod merge;
pub mod outcome;
pub mod share;

pub use config::{EffectiveConfig, FormatConfig, LintConfig, RequestConfig};
pub use error::CoreError;
pub use merge::merge;
pub use outcome::{EngineError, FormatOutcome, LintOutcome, Violation};
pub use share::{ShareEntry, ShareId, SharePayload, SHARE_ID_LEN};
