//! Client services
//!
//! Leaf-first: image preparation and capture slots, the backend client, then
//! the orchestrating services built on them.

pub mod analysis_orchestrator;
pub mod analysis_reset;
pub mod backend_client;
pub mod capture_store;
pub mod daily_task;
pub mod image_prep;
pub mod membership;
pub mod phone_auth;
pub mod preview_cache;
pub mod status_resolver;
pub mod stylist_chat;

pub use analysis_orchestrator::AnalysisOrchestrator;
pub use analysis_reset::{AnalysisResetService, ResetError};
pub use backend_client::HttpBackend;
pub use capture_store::{CaptureError, CaptureStore, CapturedImageRef};
pub use daily_task::DailyTaskService;
pub use image_prep::ImagePrepError;
pub use membership::{MembershipError, MembershipService, UnlockOutcome};
pub use phone_auth::{
    select_phone_auth, AuthError, BackendOtpAuth, HostedIdentityAuth, PhoneAuth, VerifiedUser,
};
pub use preview_cache::{PreviewCache, PreviewError};
pub use status_resolver::StatusResolver;
pub use stylist_chat::StylistChat;
