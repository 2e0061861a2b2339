//! Backend seams
//!
//! The services talk to the backend through these traits so that tests and
//! alternative transports can stand in for [`HttpBackend`]. Each trait covers
//! one consumer:
//! - [`AnalysisBackend`]: the analysis orchestrator
//! - [`StatusBackend`]: the status resolver
//! - [`PreviewBackend`]: the preview cache
//!
//! [`HttpBackend`]: crate::services::backend_client::HttpBackend

use crate::models::backend_types::{AnalyzeRequest, GenerateImageResponse};
use crate::models::preview::PreviewRequest;
use crate::models::user_status::{LegacyAuthStatus, UserStatusRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Backend call errors
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Connection refused, DNS failure, reset, ...
    #[error("Network error: {0}")]
    Network(String),

    /// Transport-level timeout
    #[error("Request timed out")]
    Timeout,

    /// Non-success HTTP status; `body` is the raw response text
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Success status with an unusable body
    #[error("Parse error: {0}")]
    Parse(String),
}

impl BackendError {
    /// Server-provided message from an error body (`detail` or `message`)
    pub fn server_message(&self) -> Option<String> {
        let BackendError::Api { body, .. } = self else {
            return None;
        };
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        ["detail", "message", "error"]
            .iter()
            .filter_map(|k| value.get(*k).and_then(|v| v.as_str()))
            .map(str::to_string)
            .find(|s| !s.trim().is_empty())
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_decode() {
            BackendError::Parse(err.to_string())
        } else {
            BackendError::Network(err.to_string())
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Submit the three encoded captures; returns the raw success body
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<String, BackendError>;
}

#[async_trait]
pub trait StatusBackend: Send + Sync {
    /// Primary status record looked up by cleaned phone number
    async fn user_status(&self, phone: &str) -> Result<UserStatusRecord, BackendError>;

    /// Session-bound legacy status
    async fn legacy_auth_status(&self) -> Result<LegacyAuthStatus, BackendError>;
}

#[async_trait]
pub trait PreviewBackend: Send + Sync {
    async fn generate_preview(
        &self,
        request: &PreviewRequest,
        phone: Option<String>,
    ) -> Result<GenerateImageResponse, BackendError>;

    /// Previews the backend already generated for this user
    async fn cached_previews(&self, phone: &str) -> Result<HashMap<String, String>, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message_from_detail() {
        let err = BackendError::Api {
            status: 400,
            body: r#"{"detail": "Invalid OTP"}"#.to_string(),
        };
        assert_eq!(err.server_message().as_deref(), Some("Invalid OTP"));

        let err = BackendError::Api {
            status: 500,
            body: "Internal Server Error".to_string(),
        };
        assert_eq!(err.server_message(), None);
        assert_eq!(BackendError::Timeout.server_message(), None);
    }
}
