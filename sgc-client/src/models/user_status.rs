//! User status snapshot and the merge rule that produces it
//!
//! Three sources feed a snapshot: the local cache, the primary user-status
//! record and the legacy auth status. [`merge_status`] is total and pure, so the
//! order in which the two remote fetches complete cannot change the outcome.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Membership tier as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MembershipTier {
    #[default]
    Free,
    Transformation,
    Lifestyle,
    /// Tier name this client does not know about
    Other(String),
}

impl MembershipTier {
    /// Parse a tier name; empty input reads as `Free`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "free" => MembershipTier::Free,
            "transformation" => MembershipTier::Transformation,
            "lifestyle" => MembershipTier::Lifestyle,
            _ => MembershipTier::Other(s.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MembershipTier::Free => "free",
            MembershipTier::Transformation => "transformation",
            MembershipTier::Lifestyle => "lifestyle",
            MembershipTier::Other(name) => name,
        }
    }

    /// Paid tiers imply premium access
    pub fn is_paid(&self) -> bool {
        matches!(
            self,
            MembershipTier::Transformation | MembershipTier::Lifestyle
        )
    }
}

impl fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MembershipTier {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MembershipTier {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = Option::<String>::deserialize(deserializer)?;
        Ok(MembershipTier::parse(s.as_deref().unwrap_or("")))
    }
}

/// Merged point-in-time view used to gate premium features
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserStatusSnapshot {
    pub is_premium: bool,
    pub membership_tier: MembershipTier,
    pub has_completed_analysis: bool,
}

/// `GET /api/user/status` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserStatusRecord {
    pub found: bool,
    pub membership_tier: MembershipTier,
    pub is_premium: bool,
}

/// `GET /api/auth/user-status` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyAuthStatus {
    pub is_premium: bool,
    pub has_completed_analysis: bool,
}

/// Merge cached values with whatever the remote sources returned
///
/// - A primary record counts only when `found`; it then replaces the cached
///   tier and premium flag (premium if flagged or on a paid tier).
/// - The legacy status can only set flags, never clear them.
pub fn merge_status(
    cached: &UserStatusSnapshot,
    primary: Option<&UserStatusRecord>,
    legacy: Option<&LegacyAuthStatus>,
) -> UserStatusSnapshot {
    let mut snapshot = cached.clone();

    if let Some(record) = primary.filter(|r| r.found) {
        snapshot.membership_tier = record.membership_tier.clone();
        snapshot.is_premium = record.is_premium || record.membership_tier.is_paid();
    }

    if let Some(legacy) = legacy {
        snapshot.is_premium |= legacy.is_premium;
        snapshot.has_completed_analysis |= legacy.has_completed_analysis;
    }

    snapshot
}
