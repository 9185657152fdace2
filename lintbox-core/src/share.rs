//! Shareable snapshots of a request and its presentation.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::RequestConfig;

/// Number of characters in a generated share identifier.
///
/// 62^8 ≈ 2.2×10^14 possible identifiers.
pub const SHARE_ID_LEN: usize = 8;

/// Short opaque identifier addressing a stored share entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareId(String);

impl ShareId {
    /// Generate a fresh identifier of [`SHARE_ID_LEN`] alphanumeric characters.
    ///
    /// Characters are drawn uniformly from `[A-Za-z0-9]` using the thread-local
    /// CSPRNG. Uniqueness against existing entries is not checked.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        Self(
            std::iter::repeat_with(|| char::from(rng.sample(Alphanumeric)))
                .take(SHARE_ID_LEN)
                .collect(),
        )
    }

    /// Wrap an identifier received from a caller. No shape check is done;
    /// an identifier that was never issued simply misses on lookup.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ShareId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The caller-supplied part of a share entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharePayload {
    pub source_code: String,
    pub config: RequestConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_fix: Option<bool>,
    /// Precomputed presentation fields (summaries, labels, styling hints).
    /// Stored and returned untouched.
    #[serde(default)]
    pub presentation: Map<String, Value>,
}

/// A stored, expiring snapshot. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[non_exhaustive]
pub struct ShareEntry {
    #[serde(rename = "request_id")]
    pub id: ShareId,
    #[serde(flatten)]
    pub payload: SharePayload,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ShareEntry {
    /// Create an entry valid from `created_at` until `expires_at`.
    #[must_use]
    pub fn new(
        id: ShareId,
        payload: SharePayload,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self { id, payload, created_at, expires_at }
    }

    /// Returns `true` once `now` has reached the entry's expiry time.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
