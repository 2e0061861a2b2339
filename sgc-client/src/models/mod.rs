//! Data models for the SGC client core

pub mod analysis_attempt;
pub mod analysis_result;
pub mod backend_types;
pub mod chat;
pub mod preview;
pub mod user_status;

pub use analysis_attempt::{AnalysisAttempt, PhaseTransition};
pub use analysis_result::{
    AnalysisResult, BarberSection, BeardSection, IdentitySnapshot, OutfitCatalog, OutfitContext,
    OutfitItem, StyleItem,
};
pub use chat::{ChatMessage, ChatRole};
pub use preview::{outfit_id, HeadshotStyle, PreviewRequest};
pub use user_status::{
    merge_status, LegacyAuthStatus, MembershipTier, UserStatusRecord, UserStatusSnapshot,
};
