//! Error types for the analysis pipeline
//!
//! Every variant is terminal for the current attempt. None of them is fatal to
//! the process: the caller shows [`AnalysisError::user_message`] and offers a
//! restart at [`AnalysisError::restart_slot`].

use sgc_common::events::CaptureSlot;
use std::time::Duration;
use thiserror::Error;

/// Analysis attempt failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// A capture step was skipped; detected locally, no network call made
    #[error("Missing captures: {}", join_slots(.missing))]
    MissingInput { missing: Vec<CaptureSlot> },

    /// Local decode/resize/encode failure
    #[error("Image preparation failed for {slot}: {message}")]
    ImagePreparation { slot: CaptureSlot, message: String },

    /// Backend rejected the photos as unusable
    #[error("Image validation failed: {}", .reasons.join(" | "))]
    ImageValidation { reasons: Vec<String> },

    /// Client deadline exceeded; the request was dropped
    #[error("Analysis timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success response, transport failure or malformed body
    #[error("Analysis service error ({status:?}): {message}")]
    Service { status: Option<u16>, message: String },

    /// Another attempt is still running
    #[error("An analysis attempt is already in progress")]
    AttemptInProgress,

    /// Local store read/write failed
    #[error("Local storage error: {0}")]
    Storage(String),
}

pub const MISSING_INPUT_MESSAGE: &str = "Missing images. Please complete all scans.";
pub const VALIDATION_FALLBACK_MESSAGE: &str = "Image validation failed. Please retake your photos.";
pub const SERVICE_FALLBACK_MESSAGE: &str = "Analysis failed. Please try again.";
pub const TIMEOUT_MESSAGE: &str = "Analysis took too long. Please try again.";
const GENERIC_MESSAGE: &str = "Something went wrong. Please try again.";

fn join_slots(slots: &[CaptureSlot]) -> String {
    slots
        .iter()
        .map(CaptureSlot::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl AnalysisError {
    /// Human-readable message for display
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::MissingInput { .. } => MISSING_INPUT_MESSAGE.to_string(),
            AnalysisError::ImagePreparation { .. } => {
                "We couldn't prepare your photos. Please retake them.".to_string()
            }
            AnalysisError::ImageValidation { reasons } => {
                let joined = reasons
                    .iter()
                    .map(|r| r.trim())
                    .filter(|r| !r.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                if joined.is_empty() {
                    VALIDATION_FALLBACK_MESSAGE.to_string()
                } else {
                    joined
                }
            }
            AnalysisError::Timeout(_) => TIMEOUT_MESSAGE.to_string(),
            AnalysisError::Service { message, .. } => {
                if message.trim().is_empty() {
                    SERVICE_FALLBACK_MESSAGE.to_string()
                } else {
                    message.clone()
                }
            }
            AnalysisError::AttemptInProgress => {
                "Your photos are already being analyzed.".to_string()
            }
            AnalysisError::Storage(_) => GENERIC_MESSAGE.to_string(),
        }
    }

    /// Short machine-readable kind, used in telemetry
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::MissingInput { .. } => "missing_input",
            AnalysisError::ImagePreparation { .. } => "image_preparation",
            AnalysisError::ImageValidation { .. } => "image_validation",
            AnalysisError::Timeout(_) => "timeout",
            AnalysisError::Service { .. } => "service",
            AnalysisError::AttemptInProgress => "attempt_in_progress",
            AnalysisError::Storage(_) => "storage",
        }
    }

    /// Capture step a retry re-enters; always the first slot
    pub fn restart_slot(&self) -> CaptureSlot {
        CaptureSlot::ALL[0]
    }
}

impl From<sgc_common::Error> for AnalysisError {
    fn from(err: sgc_common::Error) -> Self {
        AnalysisError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_joins_reasons() {
        let err = AnalysisError::ImageValidation {
            reasons: vec![
                "Face not clearly visible".to_string(),
                "Body photo too dark".to_string(),
            ],
        };
        assert_eq!(
            err.user_message(),
            "Face not clearly visible\n\nBody photo too dark"
        );
    }

    #[test]
    fn test_empty_reasons_fall_back() {
        let err = AnalysisError::ImageValidation { reasons: vec![] };
        assert_eq!(err.user_message(), VALIDATION_FALLBACK_MESSAGE);

        let err = AnalysisError::Service {
            status: Some(500),
            message: "  ".to_string(),
        };
        assert_eq!(err.user_message(), SERVICE_FALLBACK_MESSAGE);
    }

    #[test]
    fn test_restart_slot_is_face() {
        let errors = [
            AnalysisError::MissingInput {
                missing: vec![CaptureSlot::Skin],
            },
            AnalysisError::Timeout(Duration::from_secs(30)),
            AnalysisError::Storage("disk full".to_string()),
        ];
        for err in errors {
            assert_eq!(err.restart_slot(), CaptureSlot::Face);
        }
    }

    #[test]
    fn test_missing_input_display() {
        let err = AnalysisError::MissingInput {
            missing: vec![CaptureSlot::Body, CaptureSlot::Skin],
        };
        assert_eq!(err.to_string(), "Missing captures: body, skin");
        assert_eq!(err.kind(), "missing_input");
    }
}
