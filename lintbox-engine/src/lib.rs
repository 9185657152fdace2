//! SQL lint/format engines and the invoker that runs them for lintbox.
//!
//! [`SqlEngine`] is the seam; [`PgEngine`] is the bundled PostgreSQL
//! implementation and [`EngineInvoker`] runs any engine with a time bound on
//! a blocking worker thread.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod backend;
pub mod error;
pub mod invoker;
pub mod pg;

pub use backend::SqlEngine;
pub use error::EngineInvocationError;
pub use invoker::{EngineInvoker, DEFAULT_TIMEOUT};
pub use pg::PgEngine;
