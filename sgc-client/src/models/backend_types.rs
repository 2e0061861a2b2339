//! Backend request and response bodies
//!
//! Response types default every field so that additive backend changes and
//! partially filled records never fail deserialization.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeRequest {
    /// Face, body and skin, in that order (base64 JPEG)
    pub images: [String; 3],
    pub phone: Option<String>,
}

/// Error body of a failed analyze call
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalyzeErrorBody {
    pub detail: Option<serde_json::Value>,
}

pub const IMAGE_VALIDATION_FAILED: &str = "IMAGE_VALIDATION_FAILED";

#[derive(Debug, Clone, Serialize)]
pub struct PhoneRequest {
    pub phone: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyOtpRequest {
    pub phone: String,
    pub otp: String,
}

/// User record attached to auth responses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthUser {
    pub uid: Option<String>,
    #[serde(alias = "phoneNumber")]
    pub phone_number: Option<String>,
    pub is_premium: bool,
    pub has_completed_analysis: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OtpResponse {
    pub success: bool,
    pub error: Option<String>,
    pub detail: Option<String>,
    pub user: Option<AuthUser>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterUserRequest {
    pub phone: String,
    pub firebase_uid: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterUserResponse {
    pub user: Option<AuthUser>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutfitImageRequest {
    pub visual_spec: String,
    pub context_name: String,
    pub outfit_index: usize,
    pub outfit_title: String,
    pub head_to_toe: Vec<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeadshotImageRequest {
    pub style_type: String,
    pub name: String,
    pub description: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenerateImageResponse {
    pub success: bool,
    pub image_base64: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CachedImagesResponse {
    pub images: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<ChatTurn>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MembershipPlan {
    pub plan: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CheckMembershipResponse {
    pub is_member: bool,
    pub membership: Option<MembershipPlan>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UnlockPremiumResponse {
    pub success: bool,
    pub membership_tier: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateMembershipRequest {
    pub phone: String,
    pub tier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformationTask {
    pub day: i64,
    pub week: i64,
    pub title: String,
    pub instruction: String,
    pub cta_text: String,
    pub deep_link: String,
    pub deep_link_section: Option<String>,
}

impl TransformationTask {
    /// Tasks with this deep link are completed in place
    pub fn is_mark_done(&self) -> bool {
        self.deep_link == "mark_done"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TodayTaskResponse {
    pub has_started: bool,
    pub current_day: Option<i64>,
    pub current_week: Option<i64>,
    pub total_days: Option<i64>,
    pub task: Option<TransformationTask>,
    pub is_completed: Option<bool>,
    pub completed_tasks: Vec<i64>,
    pub locked: Option<bool>,
    pub locked_message: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteTaskRequest {
    pub phone: String,
    pub day: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisMode {
    pub is_test_mode: bool,
    pub analysis_count: u32,
    pub max_analyses: u32,
    pub can_analyze: bool,
    pub remaining_regenerations: u32,
    pub has_existing_analysis: bool,
    pub locked_message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForceResetRequest {
    pub phone: String,
    pub confirm: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_user_accepts_camel_case_phone() {
        let user: AuthUser =
            serde_json::from_str(r#"{"uid": "u1", "phoneNumber": "+15550001234"}"#).unwrap();
        assert_eq!(user.phone_number.as_deref(), Some("+15550001234"));
        assert!(!user.is_premium);
    }

    #[test]
    fn test_today_task_partial_body() {
        let body = r#"{"has_started": true, "task": {"day": 3, "title": "Wardrobe audit", "deep_link": "mark_done"}}"#;
        let today: TodayTaskResponse = serde_json::from_str(body).unwrap();
        let task = today.task.unwrap();
        assert_eq!(task.day, 3);
        assert!(task.is_mark_done());
        assert!(today.completed_tasks.is_empty());
    }
}
