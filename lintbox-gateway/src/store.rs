//! Expiring share storage.
//!
//! [`ShareStore`] is the persistence seam; [`MemoryShareStore`] keeps entries
//! in process memory behind a lock and enforces TTL on every read.

use std::{collections::HashMap, sync::RwLock, time::Duration};

use async_trait::async_trait;
use chrono::Utc;

use lintbox_core::{ShareEntry, ShareId, SharePayload};

use crate::error::StoreError;

/// Create/read storage for share entries. Entries are immutable once
/// created; there is no update or delete.
#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Store `payload` under a freshly generated identifier, readable for
    /// `ttl`.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] if the backing storage fails.
    async fn create(&self, payload: SharePayload, ttl: Duration) -> Result<ShareEntry, StoreError>;

    /// Fetch a live entry.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] for identifiers that were never
    /// issued and for expired entries alike, and
    /// [`StoreError::Unavailable`] if the backing storage fails.
    async fn get(&self, id: &ShareId) -> Result<ShareEntry, StoreError>;

    /// Drop every expired entry, returning how many were removed.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] if the backing storage fails.
    async fn purge_expired(&self) -> Result<usize, StoreError>;
}

/// In-process share store.
///
/// Identifier collisions overwrite the earlier entry.
#[derive(Debug, Default)]
pub struct MemoryShareStore {
    entries: RwLock<HashMap<ShareId, ShareEntry>>,
}

impl MemoryShareStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until swept.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.entries.read().map_err(poisoned)?.len())
    }

    /// Whether the store holds no entries.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn sweep(entries: &mut HashMap<ShareId, ShareEntry>) -> usize {
        let now = Utc::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }
}

#[allow(clippy::needless_pass_by_value)]
fn poisoned<T>(_: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Unavailable("share store lock poisoned".to_owned())
}

#[async_trait]
impl ShareStore for MemoryShareStore {
    async fn create(&self, payload: SharePayload, ttl: Duration) -> Result<ShareEntry, StoreError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StoreError::Unavailable(format!("invalid ttl: {e}")))?;
        let created_at = Utc::now();
        let entry = ShareEntry::new(ShareId::generate(), payload, created_at, created_at + ttl);

        let mut entries = self.entries.write().map_err(poisoned)?;
        let swept = Self::sweep(&mut entries);
        if entries.insert(entry.id.clone(), entry.clone()).is_some() {
            tracing::warn!(share_id = %entry.id, "share id collision, previous entry overwritten");
        }
        tracing::info!(
            share_id = %entry.id,
            expires_at = %entry.expires_at,
            swept,
            "share created"
        );
        Ok(entry)
    }

    async fn get(&self, id: &ShareId) -> Result<ShareEntry, StoreError> {
        let entries = self.entries.read().map_err(poisoned)?;
        match entries.get(id) {
            Some(entry) if !entry.is_expired_at(Utc::now()) => Ok(entry.clone()),
            _ => Err(StoreError::NotFound(id.clone())),
        }
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        Ok(Self::sweep(&mut entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn payload(source: &str) -> SharePayload {
        SharePayload {
            source_code: source.to_owned(),
            config: lintbox_core::RequestConfig::default(),
            with_fix: Some(true),
            presentation: Map::from_iter([("summary".to_owned(), json!("1 violation"))]),
        }
    }

    #[tokio::test]
    async fn create_then_get_returns_supplied_fields() {
        let store = MemoryShareStore::new();
        let created = match store.create(payload("SELECT 1;"), Duration::from_secs(60)).await {
            Ok(e) => e,
            Err(e) => panic!("create failed: {e}"),
        };
        let fetched = match store.get(&created.id).await {
            Ok(e) => e,
            Err(e) => panic!("get failed: {e}"),
        };
        assert_eq!(fetched.payload, payload("SELECT 1;"));
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn identical_payloads_get_distinct_ids() {
        let store = MemoryShareStore::new();
        let mut ids = std::collections::HashSet::new();
        for _ in 0..16 {
            match store.create(payload("SELECT 1;"), Duration::from_secs(60)).await {
                Ok(e) => ids.insert(e.id),
                Err(e) => panic!("create failed: {e}"),
            };
        }
        assert_eq!(ids.len(), 16);
    }

    #[tokio::test]
    async fn unknown_and_expired_ids_are_both_not_found() {
        let store = MemoryShareStore::new();
        let expired = match store.create(payload("SELECT 1;"), Duration::ZERO).await {
            Ok(e) => e,
            Err(e) => panic!("create failed: {e}"),
        };
        let missing = store.get(&ShareId::new("nonexistent")).await;
        let gone = store.get(&expired.id).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))), "got {missing:?}");
        assert!(matches!(gone, Err(StoreError::NotFound(_))), "got {gone:?}");
    }

    #[tokio::test]
    async fn purge_removes_only_expired_entries() {
        let store = MemoryShareStore::new();
        for ttl in [Duration::from_secs(60), Duration::ZERO] {
            if let Err(e) = store.create(payload("SELECT 1;"), ttl).await {
                panic!("create failed: {e}");
            }
        }
        let purged = match store.purge_expired().await {
            Ok(n) => n,
            Err(e) => panic!("purge failed: {e}"),
        };
        assert_eq!(purged, 1);
        assert!(matches!(store.len(), Ok(1)));
    }

    #[tokio::test]
    async fn create_sweeps_expired_entries() {
        let store = MemoryShareStore::new();
        for ttl in [Duration::ZERO, Duration::ZERO, Duration::from_secs(60)] {
            if let Err(e) = store.create(payload("SELECT 1;"), ttl).await {
                panic!("create failed: {e}");
            }
        }
        assert!(matches!(store.len(), Ok(1)));
    }

    #[tokio::test]
    async fn concurrent_creates_and_reads_are_consistent() {
        let store = std::sync::Arc::new(MemoryShareStore::new());
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..64 {
            let store = std::sync::Arc::clone(&store);
            tasks.spawn(async move {
                let source = format!("SELECT {i};");
                let created = store.create(payload(&source), Duration::from_secs(60)).await?;
                let fetched = store.get(&created.id).await?;
                Ok::<_, StoreError>((source, fetched))
            });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((source, fetched))) => assert_eq!(fetched.payload.source_code, source),
                Ok(Err(e)) => panic!("store failed: {e}"),
                Err(e) => panic!("task failed: {e}"),
            }
        }
        assert!(matches!(store.len(), Ok(64)));
    }
}
