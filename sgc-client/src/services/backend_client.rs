//! HTTP client for the style backend
//!
//! One `reqwest::Client` shared by every call. Deadlines are not set on the
//! client: each caller wraps its future in `tokio::time::timeout`, and dropping
//! the future aborts the request.

use crate::models::backend_types::*;
use crate::models::preview::PreviewRequest;
use crate::models::user_status::{LegacyAuthStatus, UserStatusRecord};
use crate::types::{AnalysisBackend, BackendError, PreviewBackend, StatusBackend};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

const USER_AGENT: &str = concat!("sgc-client/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub const ANALYZE_PATH: &str = "/api/sgc-brain/analyze";
pub const USER_STATUS_PATH: &str = "/api/user/status";
pub const LEGACY_STATUS_PATH: &str = "/api/auth/user-status";
pub const GENERATE_OUTFIT_PATH: &str = "/api/sgc-brain/generate-single-image";
pub const GENERATE_HEADSHOT_PATH: &str = "/api/sgc-brain/generate-headshot-image";
pub const CACHED_IMAGES_PATH: &str = "/api/sgc-brain/get-cached-images";
pub const CHAT_PATH: &str = "/api/ai-stylist/chat";
pub const SEND_OTP_PATH: &str = "/api/auth/send-otp";
pub const VERIFY_OTP_PATH: &str = "/api/auth/verify-otp";
pub const REGISTER_USER_PATH: &str = "/api/auth/firebase-user";
pub const CHECK_MEMBERSHIP_PATH: &str = "/api/auth/check-membership";
pub const UNLOCK_PREMIUM_PATH: &str = "/api/auth/unlock-premium";
pub const UPDATE_MEMBERSHIP_PATH: &str = "/api/user/update-membership";
pub const TODAY_TASK_PATH: &str = "/api/transformation/today-task";
pub const COMPLETE_TASK_PATH: &str = "/api/transformation/complete-task";
pub const ANALYSIS_MODE_PATH: &str = "/api/sgc-brain/analysis-mode";
pub const FORCE_RESET_PATH: &str = "/api/sgc-brain/force-reset";

/// Backend HTTP client
#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// `base_url` without trailing slash, e.g. `https://api.example.com`
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send and return the body text of a 2xx response
    async fn send_text(&self, request: reqwest::RequestBuilder) -> Result<String, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "Backend returned error status");
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, BackendError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let text = self
            .send_text(self.http.post(self.url(path)).json(body))
            .await?;
        serde_json::from_str(&text).map_err(|e| BackendError::Parse(format!("{}: {}", path, e)))
    }

    async fn get_json<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<R, BackendError> {
        let text = self
            .send_text(self.http.get(self.url(path)).query(query))
            .await?;
        serde_json::from_str(&text).map_err(|e| BackendError::Parse(format!("{}: {}", path, e)))
    }

    pub async fn send_otp(&self, phone: &str) -> Result<OtpResponse, BackendError> {
        self.post_json(
            SEND_OTP_PATH,
            &PhoneRequest {
                phone: phone.to_string(),
            },
        )
        .await
    }

    pub async fn verify_otp(&self, phone: &str, otp: &str) -> Result<OtpResponse, BackendError> {
        self.post_json(
            VERIFY_OTP_PATH,
            &VerifyOtpRequest {
                phone: phone.to_string(),
                otp: otp.to_string(),
            },
        )
        .await
    }

    /// Create or update the backend user record after hosted verification
    pub async fn register_user(
        &self,
        phone: &str,
        uid: Option<&str>,
    ) -> Result<RegisterUserResponse, BackendError> {
        self.post_json(
            REGISTER_USER_PATH,
            &RegisterUserRequest {
                phone: phone.to_string(),
                firebase_uid: uid.map(str::to_string),
            },
        )
        .await
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
        self.post_json(CHAT_PATH, request).await
    }

    pub async fn check_membership(
        &self,
        email: &str,
    ) -> Result<CheckMembershipResponse, BackendError> {
        self.post_json(
            CHECK_MEMBERSHIP_PATH,
            &EmailRequest {
                email: email.to_string(),
            },
        )
        .await
    }

    pub async fn unlock_premium(&self, email: &str) -> Result<UnlockPremiumResponse, BackendError> {
        self.post_json(
            UNLOCK_PREMIUM_PATH,
            &EmailRequest {
                email: email.to_string(),
            },
        )
        .await
    }

    pub async fn update_membership(&self, phone: &str, tier: &str) -> Result<(), BackendError> {
        self.send_text(
            self.http
                .post(self.url(UPDATE_MEMBERSHIP_PATH))
                .json(&UpdateMembershipRequest {
                    phone: phone.to_string(),
                    tier: tier.to_string(),
                }),
        )
        .await?;
        Ok(())
    }

    pub async fn today_task(&self, phone: &str) -> Result<TodayTaskResponse, BackendError> {
        self.get_json(TODAY_TASK_PATH, &[("phone", phone)]).await
    }

    pub async fn complete_task(&self, phone: &str, day: i64) -> Result<(), BackendError> {
        self.send_text(
            self.http
                .post(self.url(COMPLETE_TASK_PATH))
                .json(&CompleteTaskRequest {
                    phone: phone.to_string(),
                    day,
                }),
        )
        .await?;
        Ok(())
    }

    pub async fn analysis_mode(&self, phone: &str) -> Result<AnalysisMode, BackendError> {
        self.post_json(
            ANALYSIS_MODE_PATH,
            &PhoneRequest {
                phone: phone.to_string(),
            },
        )
        .await
    }

    pub async fn force_reset(&self, phone: &str) -> Result<(), BackendError> {
        self.send_text(self.http.post(self.url(FORCE_RESET_PATH)).json(&ForceResetRequest {
            phone: phone.to_string(),
            confirm: true,
        }))
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AnalysisBackend for HttpBackend {
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<String, BackendError> {
        tracing::debug!(has_phone = request.phone.is_some(), "Submitting analysis");
        self.send_text(self.http.post(self.url(ANALYZE_PATH)).json(request))
            .await
    }
}

#[async_trait]
impl StatusBackend for HttpBackend {
    async fn user_status(&self, phone: &str) -> Result<UserStatusRecord, BackendError> {
        self.get_json(USER_STATUS_PATH, &[("phone", phone)]).await
    }

    async fn legacy_auth_status(&self) -> Result<LegacyAuthStatus, BackendError> {
        self.get_json(LEGACY_STATUS_PATH, &[]).await
    }
}

#[async_trait]
impl PreviewBackend for HttpBackend {
    async fn generate_preview(
        &self,
        request: &PreviewRequest,
        phone: Option<String>,
    ) -> Result<GenerateImageResponse, BackendError> {
        if let Some(body) = request.outfit_body(phone.clone()) {
            return self.post_json(GENERATE_OUTFIT_PATH, &body).await;
        }
        match request.headshot_body(phone) {
            Some(body) => self.post_json(GENERATE_HEADSHOT_PATH, &body).await,
            None => Err(BackendError::Parse("Unsupported preview request".to_string())),
        }
    }

    async fn cached_previews(&self, phone: &str) -> Result<HashMap<String, String>, BackendError> {
        let response: CachedImagesResponse = self
            .post_json(
                CACHED_IMAGES_PATH,
                &PhoneRequest {
                    phone: phone.to_string(),
                },
            )
            .await?;
        Ok(response.images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_trimmed() {
        let backend = HttpBackend::new("http://localhost:8001/").unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8001");
        assert_eq!(
            backend.url(ANALYZE_PATH),
            "http://localhost:8001/api/sgc-brain/analyze"
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Reserve a port, then free it so nothing is listening
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let backend = HttpBackend::new(format!("http://127.0.0.1:{}", port)).unwrap();
        match backend.legacy_auth_status().await {
            Err(BackendError::Network(_)) => {}
            other => panic!("Expected network error, got {:?}", other),
        }
    }
}
