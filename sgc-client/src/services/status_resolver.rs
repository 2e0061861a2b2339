//! Status resolver
//!
//! Produces one [`UserStatusSnapshot`] from the local cache and two remote
//! sources. The cache is read first and is the answer when both remote calls
//! fail; remote failures are logged and never surfaced. Newly learned values
//! are written back to the cache.

use crate::db::{keys, LocalStore};
use crate::models::user_status::{
    merge_status, LegacyAuthStatus, MembershipTier, UserStatusRecord, UserStatusSnapshot,
};
use crate::types::{BackendError, StatusBackend};
use crate::utils::clean_phone;
use std::sync::Arc;
use std::time::Duration;

pub struct StatusResolver {
    store: LocalStore,
    backend: Arc<dyn StatusBackend>,
    timeout: Duration,
}

impl StatusResolver {
    pub fn new(store: LocalStore, backend: Arc<dyn StatusBackend>, timeout: Duration) -> Self {
        Self {
            store,
            backend,
            timeout,
        }
    }

    /// Cached snapshot only; unreadable values read as locked/free
    pub async fn cached(&self) -> UserStatusSnapshot {
        let is_premium = self.read_flag(keys::IS_PREMIUM).await;
        let has_completed_analysis = self.read_flag(keys::ANALYSIS_COMPLETE).await;
        let membership_tier = match self.store.get_string(keys::MEMBERSHIP_TIER).await {
            Ok(tier) => MembershipTier::parse(tier.as_deref().unwrap_or("")),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read cached membership tier");
                MembershipTier::Free
            }
        };

        UserStatusSnapshot {
            is_premium,
            membership_tier,
            has_completed_analysis,
        }
    }

    /// Resolve the current snapshot
    ///
    /// `phone` is the stored phone (any form); without it the primary lookup
    /// is skipped. Both remote calls run concurrently under the status
    /// timeout.
    pub async fn resolve(&self, phone: Option<&str>) -> UserStatusSnapshot {
        let cached = self.cached().await;

        let phone = phone.map(clean_phone).filter(|p| !p.is_empty());
        let (primary, legacy) = tokio::join!(
            self.fetch_primary(phone.as_deref()),
            self.fetch_legacy()
        );

        let snapshot = merge_status(&cached, primary.as_ref(), legacy.as_ref());

        tracing::debug!(
            premium = snapshot.is_premium,
            tier = %snapshot.membership_tier,
            analysis_complete = snapshot.has_completed_analysis,
            primary_ok = primary.is_some(),
            legacy_ok = legacy.is_some(),
            "Resolved user status"
        );

        self.persist_changes(&cached, &snapshot).await;
        snapshot
    }

    async fn fetch_primary(&self, phone: Option<&str>) -> Option<UserStatusRecord> {
        let phone = phone?;
        let result = tokio::time::timeout(self.timeout, self.backend.user_status(phone)).await;
        absorb("user status", result)
    }

    async fn fetch_legacy(&self) -> Option<LegacyAuthStatus> {
        let result = tokio::time::timeout(self.timeout, self.backend.legacy_auth_status()).await;
        absorb("legacy auth status", result)
    }

    async fn read_flag(&self, key: &str) -> bool {
        match self.store.get_flag(key).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key, error = %e, "Could not read cached flag");
                false
            }
        }
    }

    async fn persist_changes(&self, cached: &UserStatusSnapshot, snapshot: &UserStatusSnapshot) {
        if snapshot.is_premium != cached.is_premium {
            self.write(self.store.set_flag(keys::IS_PREMIUM, snapshot.is_premium).await);
        }
        if snapshot.has_completed_analysis != cached.has_completed_analysis {
            self.write(
                self.store
                    .set_flag(keys::ANALYSIS_COMPLETE, snapshot.has_completed_analysis)
                    .await,
            );
        }
        if snapshot.membership_tier != cached.membership_tier {
            self.write(
                self.store
                    .set_string(keys::MEMBERSHIP_TIER, snapshot.membership_tier.as_str())
                    .await,
            );
        }
    }

    fn write(&self, result: sgc_common::Result<()>) {
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to persist resolved status");
        }
    }
}

/// Swallow a remote failure, keeping only usable values
fn absorb<T>(
    source: &str,
    result: Result<Result<T, BackendError>, tokio::time::error::Elapsed>,
) -> Option<T> {
    match result {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            tracing::debug!(source, error = %e, "Status fetch failed, using cache");
            None
        }
        Err(_) => {
            tracing::debug!(source, "Status fetch timed out, using cache");
            None
        }
    }
}
