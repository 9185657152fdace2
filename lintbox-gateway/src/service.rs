//! Request orchestration: merge configuration, invoke the engine, and read
//! or write shares.

use std::{sync::Arc, time::Duration};

use serde::Serialize;

use lintbox_core::{
    merge, EffectiveConfig, FormatOutcome, LintOutcome, RequestConfig, ShareEntry, ShareId,
    SharePayload,
};
use lintbox_engine::{EngineInvoker, PgEngine};

use crate::{
    error::GatewayError,
    settings::{Settings, DEFAULT_MAX_SOURCE_BYTES, DEFAULT_SHARE_TTL},
    store::{MemoryShareStore, ShareStore},
};

/// `GET share/{id}` result: the stored entry plus its configuration
/// rendered as TOML.
#[derive(Debug, Serialize)]
pub struct SharedRequest {
    #[serde(flatten)]
    pub entry: ShareEntry,
    pub config_toml: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub engine: &'static str,
    pub version: &'static str,
}

/// Composition root shared by all request handlers.
///
/// The baseline configuration is built once at startup and only ever read;
/// each request merges onto its own copy.
#[derive(Clone)]
pub struct Playground {
    baseline: Arc<EffectiveConfig>,
    invoker: EngineInvoker,
    store: Arc<dyn ShareStore>,
    share_ttl: Duration,
    max_source_bytes: usize,
}

impl std::fmt::Debug for Playground {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Playground")
            .field("invoker", &self.invoker)
            .field("share_ttl", &self.share_ttl)
            .field("max_source_bytes", &self.max_source_bytes)
            .finish_non_exhaustive()
    }
}

impl Playground {
    #[must_use]
    pub fn new(
        baseline: Arc<EffectiveConfig>,
        invoker: EngineInvoker,
        store: Arc<dyn ShareStore>,
    ) -> Self {
        Self {
            baseline,
            invoker,
            store,
            share_ttl: DEFAULT_SHARE_TTL,
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
        }
    }

    /// Wire the bundled engine and the in-memory store according to
    /// `settings`.
    #[must_use]
    pub fn from_settings(settings: &Settings, baseline: EffectiveConfig) -> Self {
        let invoker =
            EngineInvoker::with_timeout(Arc::new(PgEngine::new()), settings.engine_timeout);
        Self::new(Arc::new(baseline), invoker, Arc::new(MemoryShareStore::new()))
            .with_share_ttl(settings.share_ttl)
            .with_max_source_bytes(settings.max_source_bytes)
    }

    #[must_use]
    pub fn with_share_ttl(mut self, ttl: Duration) -> Self {
        self.share_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_max_source_bytes(mut self, limit: usize) -> Self {
        self.max_source_bytes = limit;
        self
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn ShareStore> {
        Arc::clone(&self.store)
    }

    #[must_use]
    pub fn engine_info(&self) -> EngineInfo {
        EngineInfo {
            engine: self.invoker.engine_name(),
            version: self.invoker.engine_version(),
        }
    }

    /// # Errors
    /// Returns [`GatewayError::InvalidRequest`] for oversized sources,
    /// [`GatewayError::Validation`] for bad configuration, and
    /// [`GatewayError::Engine`] if the engine fails as a whole.
    pub async fn lint(
        &self,
        source_code: String,
        config: &RequestConfig,
        with_fix: bool,
    ) -> Result<LintOutcome, GatewayError> {
        self.check_source(&source_code)?;
        let effective = self.effective(config)?;
        Ok(self.invoker.lint(source_code, effective, with_fix).await?)
    }

    /// # Errors
    /// Same as [`Playground::lint`].
    pub async fn format(
        &self,
        source_code: String,
        config: &RequestConfig,
    ) -> Result<FormatOutcome, GatewayError> {
        self.check_source(&source_code)?;
        let effective = self.effective(config)?;
        Ok(self.invoker.format(source_code, effective).await?)
    }

    /// Validate and store a share, returning its identifier.
    ///
    /// A share is only accepted if [`Playground::load`] can render it again.
    ///
    /// # Errors
    /// Returns [`GatewayError::InvalidRequest`] or [`GatewayError::Validation`]
    /// for payloads a lint request would reject or whose configuration has no
    /// TOML form, and [`GatewayError::Store`] if the store is unavailable.
    pub async fn share(&self, payload: SharePayload) -> Result<ShareId, GatewayError> {
        self.check_source(&payload.source_code)?;
        self.effective(&payload.config)?
            .to_toml()
            .map_err(|e| GatewayError::InvalidRequest(format!("config cannot be shared: {e}")))?;
        let entry = self.store.create(payload, self.share_ttl).await?;
        Ok(entry.id)
    }

    /// Load a live share.
    ///
    /// # Errors
    /// Returns [`GatewayError::Store`] with [`crate::error::StoreError::NotFound`]
    /// for unknown or expired identifiers.
    pub async fn load(&self, id: &ShareId) -> Result<SharedRequest, GatewayError> {
        let entry = self.store.get(id).await?;
        let config_toml = self.effective(&entry.payload.config)?.to_toml()?;
        tracing::debug!(share_id = %id, "share loaded");
        Ok(SharedRequest { entry, config_toml })
    }

    fn effective(&self, config: &RequestConfig) -> Result<EffectiveConfig, GatewayError> {
        Ok(merge(&self.baseline, config)?)
    }

    fn check_source(&self, source: &str) -> Result<(), GatewayError> {
        if source.len() > self.max_source_bytes {
            return Err(GatewayError::InvalidRequest(format!(
                "source_code is {} bytes; the limit is {}",
                source.len(),
                self.max_source_bytes
            )));
        }
        Ok(())
    }
}
