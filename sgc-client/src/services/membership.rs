//! Premium unlock by membership email
//!
//! Flow: validate email, confirm membership, unlock, cache the premium state,
//! tell the backend about the tier (best effort), then route to results when
//! an analysis is already cached or to a new analysis otherwise.

use crate::db::{keys, LocalStore};
use crate::services::backend_client::HttpBackend;
use crate::types::BackendError;
use crate::utils::clean_phone;
use chrono::Utc;
use sgc_common::events::{EventBus, SgcEvent};
use thiserror::Error;

/// Tier assumed for members whose records predate tiers
pub const DEFAULT_PAID_TIER: &str = "transformation";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MembershipError {
    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Please use your registered email ID which you used for purchase")]
    NotMember,

    #[error("{0}")]
    Rejected(String),

    #[error("Connection error. Please try again.")]
    Connection(String),

    #[error("Local storage error: {0}")]
    Storage(String),
}

impl From<sgc_common::Error> for MembershipError {
    fn from(err: sgc_common::Error) -> Self {
        MembershipError::Storage(err.to_string())
    }
}

impl From<BackendError> for MembershipError {
    fn from(err: BackendError) -> Self {
        MembershipError::Connection(err.to_string())
    }
}

/// Where to go after a successful unlock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// A completed analysis is cached; show it
    ShowResults { tier: String },
    /// No usable analysis yet
    StartAnalysis { tier: String },
}

impl UnlockOutcome {
    pub fn tier(&self) -> &str {
        match self {
            UnlockOutcome::ShowResults { tier } | UnlockOutcome::StartAnalysis { tier } => tier,
        }
    }
}

/// `local@domain.tld` with no whitespace
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((name, tld)) => !name.is_empty() && !tld.is_empty(),
        None => false,
    }
}

pub struct MembershipService {
    backend: HttpBackend,
    store: LocalStore,
    event_bus: EventBus,
}

impl MembershipService {
    pub fn new(backend: HttpBackend, store: LocalStore, event_bus: EventBus) -> Self {
        Self {
            backend,
            store,
            event_bus,
        }
    }

    pub async fn unlock(&self, email: &str) -> Result<UnlockOutcome, MembershipError> {
        if !is_valid_email(email) {
            return Err(MembershipError::InvalidEmail);
        }
        let email = email.trim().to_lowercase();

        let membership = self.backend.check_membership(&email).await?;
        if !membership.is_member {
            tracing::info!("Membership check found no purchase for email");
            return Err(MembershipError::NotMember);
        }

        let unlock = self.backend.unlock_premium(&email).await?;
        if !unlock.success {
            return Err(MembershipError::Rejected(
                unlock
                    .message
                    .unwrap_or_else(|| "Failed to unlock premium access.".to_string()),
            ));
        }

        let tier = unlock
            .membership_tier
            .or(membership.membership.and_then(|m| m.plan))
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PAID_TIER.to_string());

        self.store.set_flag(keys::IS_PREMIUM, true).await?;
        self.store.set_string(keys::EMAIL, &email).await?;
        self.store.set_flag(keys::EMAIL_VERIFIED, true).await?;
        self.store.set_string(keys::MEMBERSHIP_TIER, &tier).await?;

        if let Some(phone) = self.store.get_string(keys::PHONE).await? {
            if let Err(e) = self
                .backend
                .update_membership(&clean_phone(&phone), &tier)
                .await
            {
                tracing::warn!(error = %e, "Failed to update tier in backend");
            }
        }

        self.event_bus.emit_lossy(SgcEvent::MembershipUnlocked {
            tier: tier.clone(),
            timestamp: Utc::now(),
        });
        tracing::info!(tier = %tier, "Premium access unlocked");

        let has_result = self.store.get_flag(keys::ANALYSIS_COMPLETE).await?
            && self.store.contains(keys::ANALYSIS_RESULT).await?;

        Ok(if has_result {
            UnlockOutcome::ShowResults { tier }
        } else {
            UnlockOutcome::StartAnalysis { tier }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("jane@example.com"));
        assert!(is_valid_email("  Jane.Doe@mail.example.co  "));
        assert!(!is_valid_email("jane@example"));
        assert!(!is_valid_email("jane example@example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("jane@@example.com"));
        assert!(!is_valid_email("jane@.com"));
    }
}
