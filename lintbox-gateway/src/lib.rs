//! HTTP API gateway for the lintbox SQL lint/format playground.
//!
//! Exposes lint, format and share endpoints over the engine invoker, with
//! an expiring in-memory share store behind them.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod routes;
pub mod service;
pub mod settings;
pub mod store;
