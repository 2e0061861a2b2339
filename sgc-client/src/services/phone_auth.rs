//! Phone verification
//!
//! One capability set, two variants chosen at startup:
//! - [`BackendOtpAuth`]: the backend's own send/verify endpoints
//! - [`HostedIdentityAuth`]: a hosted identity service, followed by a
//!   best-effort registration of the user with the backend
//!
//! Both are session-bound: `confirm_code` uses the state left by the last
//! successful `request_code` on the same instance.

use crate::services::backend_client::HttpBackend;
use crate::types::BackendError;
use crate::utils::with_plus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sgc_common::config::AuthConfig;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

const SEND_FAILED: &str = "Failed to send OTP. Please try again.";
const INVALID_OTP: &str = "Invalid OTP. Please try again.";
const INVALID_CODE: &str = "Invalid code. Please try again.";

/// Verification failures; the message is suitable for display
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    #[error("No code was sent. Please request a new code.")]
    NoPendingRequest,

    #[error("Please enter a valid phone number")]
    InvalidPhone,

    #[error("{0}")]
    Rejected(String),

    /// Transport failure; the detail is for logs only
    #[error("Connection error. Please try again.")]
    Connection(String),
}

/// Verified account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerifiedUser {
    pub uid: Option<String>,
    /// Phone as verified, with leading `+`
    pub phone: String,
    pub is_premium: bool,
    pub has_completed_analysis: bool,
}

#[async_trait]
pub trait PhoneAuth: Send + Sync {
    /// Send a verification code to `phone`
    async fn request_code(&self, phone: &str) -> Result<(), AuthError>;

    /// Confirm the code sent by the last `request_code`
    async fn confirm_code(&self, code: &str) -> Result<VerifiedUser, AuthError>;

    fn name(&self) -> &'static str;
}

/// Pick the variant for this configuration
pub fn select_phone_auth(config: &AuthConfig, backend: HttpBackend) -> Arc<dyn PhoneAuth> {
    match config.identity_url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => {
            tracing::info!(identity_url = url, "Using hosted identity phone verification");
            Arc::new(HostedIdentityAuth::new(
                url,
                config.identity_api_key.clone(),
                backend,
            ))
        }
        None => {
            tracing::info!("Using backend OTP phone verification");
            Arc::new(BackendOtpAuth::new(backend))
        }
    }
}

fn normalize_phone(phone: &str) -> Result<String, AuthError> {
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if digits < 7 {
        return Err(AuthError::InvalidPhone);
    }
    Ok(with_plus(phone))
}

fn backend_failure(err: BackendError, fallback: &str) -> AuthError {
    match err {
        BackendError::Api { .. } => {
            AuthError::Rejected(err.server_message().unwrap_or_else(|| fallback.to_string()))
        }
        other => AuthError::Connection(other.to_string()),
    }
}

// ============================================================================
// Backend OTP
// ============================================================================

pub struct BackendOtpAuth {
    backend: HttpBackend,
    pending_phone: Mutex<Option<String>>,
}

impl BackendOtpAuth {
    pub fn new(backend: HttpBackend) -> Self {
        Self {
            backend,
            pending_phone: Mutex::new(None),
        }
    }
}

#[async_trait]
impl PhoneAuth for BackendOtpAuth {
    async fn request_code(&self, phone: &str) -> Result<(), AuthError> {
        let phone = normalize_phone(phone)?;

        let response = self
            .backend
            .send_otp(&phone)
            .await
            .map_err(|e| backend_failure(e, SEND_FAILED))?;

        if !response.success {
            return Err(AuthError::Rejected(
                response.error.unwrap_or_else(|| SEND_FAILED.to_string()),
            ));
        }

        tracing::info!(phone = %sgc_common::events::mask_phone(&phone), "Verification code sent");
        *self.pending_phone.lock().await = Some(phone);
        Ok(())
    }

    async fn confirm_code(&self, code: &str) -> Result<VerifiedUser, AuthError> {
        let mut pending = self.pending_phone.lock().await;
        let phone = pending.clone().ok_or(AuthError::NoPendingRequest)?;

        let response = self
            .backend
            .verify_otp(&phone, code.trim())
            .await
            .map_err(|e| backend_failure(e, INVALID_OTP))?;

        if !response.success {
            return Err(AuthError::Rejected(
                response
                    .detail
                    .or(response.error)
                    .unwrap_or_else(|| INVALID_OTP.to_string()),
            ));
        }

        *pending = None;
        let user = response.user.unwrap_or_default();
        Ok(VerifiedUser {
            uid: user.uid,
            phone,
            is_premium: user.is_premium,
            has_completed_analysis: user.has_completed_analysis,
        })
    }

    fn name(&self) -> &'static str {
        "backend-otp"
    }
}

// ============================================================================
// Hosted identity service
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendCodeRequest<'a> {
    phone_number: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendCodeResponse {
    session_info: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    session_info: &'a str,
    code: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: Option<String>,
    phone_number: Option<String>,
}

#[derive(Deserialize)]
struct IdentityErrorBody {
    error: IdentityErrorDetail,
}

#[derive(Deserialize)]
struct IdentityErrorDetail {
    message: String,
}

struct PendingVerification {
    phone: String,
    session_info: String,
}

pub struct HostedIdentityAuth {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    backend: HttpBackend,
    pending: Mutex<Option<PendingVerification>>,
}

impl HostedIdentityAuth {
    pub fn new(base_url: &str, api_key: Option<String>, backend: HttpBackend) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            backend,
            pending: Mutex::new(None),
        }
    }

    async fn call<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<R, IdentityFailure> {
        let mut request = self
            .http
            .post(format!("{}/accounts:{}", self.base_url, method))
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| IdentityFailure::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| IdentityFailure::Transport(e.to_string()))?;

        if !status.is_success() {
            let code = serde_json::from_str::<IdentityErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or_default();
            return Err(IdentityFailure::Code(code));
        }

        serde_json::from_str(&text).map_err(|e| IdentityFailure::Transport(e.to_string()))
    }
}

enum IdentityFailure {
    Transport(String),
    /// Service error code, e.g. `INVALID_CODE`
    Code(String),
}

/// Error codes may carry a suffix (`TOO_MANY_ATTEMPTS_TRY_LATER : ...`)
fn error_code(code: &str) -> &str {
    code.split([' ', ':']).next().unwrap_or("")
}

fn send_error_message(code: &str) -> &'static str {
    match error_code(code) {
        "INVALID_PHONE_NUMBER" => "Invalid phone number format. Please check and try again.",
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "Too many attempts. Please try again later.",
        "QUOTA_EXCEEDED" => "SMS quota exceeded. Please try again later.",
        "MISSING_CLIENT_IDENTIFIER" | "INVALID_APP_CREDENTIAL" => {
            "App verification failed. Please try again."
        }
        _ => SEND_FAILED,
    }
}

fn confirm_error_message(code: &str) -> &'static str {
    match error_code(code) {
        "INVALID_CODE" => "Invalid verification code. Please check and try again.",
        "CODE_EXPIRED" => "Code has expired. Please request a new one.",
        "SESSION_EXPIRED" | "INVALID_SESSION_INFO" => "Session expired. Please request a new code.",
        _ => INVALID_CODE,
    }
}

#[async_trait]
impl PhoneAuth for HostedIdentityAuth {
    async fn request_code(&self, phone: &str) -> Result<(), AuthError> {
        let phone = normalize_phone(phone)?;

        let response: SendCodeResponse = self
            .call(
                "sendVerificationCode",
                &SendCodeRequest {
                    phone_number: &phone,
                },
            )
            .await
            .map_err(|f| match f {
                IdentityFailure::Transport(e) => AuthError::Connection(e),
                IdentityFailure::Code(code) => {
                    tracing::warn!(code = %code, "Identity service rejected code request");
                    AuthError::Rejected(send_error_message(&code).to_string())
                }
            })?;

        tracing::info!(phone = %sgc_common::events::mask_phone(&phone), "Verification code sent");
        *self.pending.lock().await = Some(PendingVerification {
            phone,
            session_info: response.session_info,
        });
        Ok(())
    }

    async fn confirm_code(&self, code: &str) -> Result<VerifiedUser, AuthError> {
        let mut pending = self.pending.lock().await;
        let verification = pending.as_ref().ok_or(AuthError::NoPendingRequest)?;

        let response: SignInResponse = self
            .call(
                "signInWithPhoneNumber",
                &SignInRequest {
                    session_info: &verification.session_info,
                    code: code.trim(),
                },
            )
            .await
            .map_err(|f| match f {
                IdentityFailure::Transport(e) => AuthError::Connection(e),
                IdentityFailure::Code(code) => {
                    AuthError::Rejected(confirm_error_message(&code).to_string())
                }
            })?;

        let phone = response
            .phone_number
            .unwrap_or_else(|| verification.phone.clone());
        *pending = None;

        let mut user = VerifiedUser {
            uid: response.local_id,
            phone,
            ..Default::default()
        };

        // The backend user record carries premium/analysis flags
        match self
            .backend
            .register_user(&user.phone, user.uid.as_deref())
            .await
        {
            Ok(registered) => {
                if let Some(record) = registered.user {
                    user.is_premium = record.is_premium;
                    user.has_completed_analysis = record.has_completed_analysis;
                }
            }
            Err(e) => tracing::warn!(error = %e, "Backend user registration failed"),
        }

        Ok(user)
    }

    fn name(&self) -> &'static str {
        "hosted-identity"
    }
}
