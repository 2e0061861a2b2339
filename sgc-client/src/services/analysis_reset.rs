//! Analysis mode and reset
//!
//! Test accounts may regenerate their analysis. A confirmed reset clears the
//! backend record first; local analysis data is removed only after the
//! backend accepted.

use crate::db::{keys, LocalStore};
use crate::models::backend_types::AnalysisMode;
use crate::services::backend_client::HttpBackend;
use crate::services::capture_store::{CaptureError, CaptureStore};
use crate::services::preview_cache::PreviewCache;
use crate::types::BackendError;
use crate::utils::clean_phone;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResetError {
    #[error("No phone number found")]
    NoPhone,

    #[error("Reset failed: {0}")]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Storage(#[from] sgc_common::Error),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

pub struct AnalysisResetService {
    backend: HttpBackend,
    store: LocalStore,
    captures: CaptureStore,
    previews: PreviewCache,
}

impl AnalysisResetService {
    pub fn new(
        backend: HttpBackend,
        store: LocalStore,
        captures: CaptureStore,
        previews: PreviewCache,
    ) -> Self {
        Self {
            backend,
            store,
            captures,
            previews,
        }
    }

    /// Current analysis mode, `None` without a phone or on failure
    pub async fn mode(&self) -> Option<AnalysisMode> {
        let phone = self.stored_phone().await.ok()?;
        match self.backend.analysis_mode(&phone).await {
            Ok(mode) => Some(mode),
            Err(e) => {
                tracing::debug!(error = %e, "Analysis mode check failed");
                None
            }
        }
    }

    /// Reset the analysis on the backend, then drop local analysis data
    pub async fn force_reset(&self) -> Result<(), ResetError> {
        let phone = self.stored_phone().await?;
        self.backend.force_reset(&phone).await?;

        self.captures.clear().await?;
        self.store.multi_remove(&keys::ANALYSIS_KEYS).await?;
        self.previews.clear().await?;

        tracing::info!("Analysis reset");
        Ok(())
    }

    async fn stored_phone(&self) -> Result<String, ResetError> {
        self.store
            .get_string(keys::PHONE)
            .await?
            .map(|p| clean_phone(&p))
            .filter(|p| !p.is_empty())
            .ok_or(ResetError::NoPhone)
    }
}
