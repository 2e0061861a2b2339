//! Analysis orchestrator
//!
//! Drives one attempt from the three capture slots to a persisted result or a
//! reported, retryable error.
//!
//! # Phases
//! Idle -> Preparing -> Analyzing -> Complete, or Error from any non-terminal
//! phase. Missing captures fail straight from Idle without a network call.
//!
//! # Guarantees
//! - At most one attempt runs at a time.
//! - The analyze endpoint is called at most once per attempt; there is no
//!   automatic retry.
//! - Capture slots are cleared on every terminal path, before the terminal
//!   phase becomes observable. This holds when the caller drops `execute`
//!   mid-attempt.
//! - The result blob is written before the analysis-complete flag; the flag
//!   is the definitive success signal.

use crate::db::{keys, LocalStore};
use crate::error::{AnalysisError, SERVICE_FALLBACK_MESSAGE};
use crate::models::analysis_attempt::{
    AnalysisAttempt, STATUS_ANALYZING, STATUS_COMPLETE, STATUS_PREPARING, STATUS_PROCESSING,
};
use crate::models::backend_types::{AnalyzeErrorBody, AnalyzeRequest, IMAGE_VALIDATION_FAILED};
use crate::models::AnalysisResult;
use crate::services::capture_store::{CaptureError, CaptureStore, CapturedImageRef};
use crate::services::image_prep;
use crate::types::{AnalysisBackend, BackendError};
use crate::utils::clean_phone;
use chrono::Utc;
use sgc_common::events::{AnalysisPhase, CaptureSlot, EventBus, SgcEvent};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

const NETWORK_MESSAGE: &str =
    "Could not reach the analysis service. Please check your connection and try again.";

impl From<CaptureError> for AnalysisError {
    fn from(err: CaptureError) -> Self {
        AnalysisError::Storage(err.to_string())
    }
}

/// Clears the in-flight flag when the attempt ends, however it ends
struct InFlightGuard(Arc<AttemptRunner>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::SeqCst);
    }
}

pub struct AnalysisOrchestrator {
    runner: Arc<AttemptRunner>,
}

/// State shared with the task that drives an attempt
struct AttemptRunner {
    captures: CaptureStore,
    store: LocalStore,
    backend: Arc<dyn AnalysisBackend>,
    event_bus: EventBus,
    timeout: Duration,
    in_flight: AtomicBool,
    attempt: RwLock<AnalysisAttempt>,
}

impl AnalysisOrchestrator {
    /// # Arguments
    /// * `timeout` - Deadline for the analyze call; on expiry the request is
    ///   dropped and the attempt fails with [`AnalysisError::Timeout`]
    pub fn new(
        captures: CaptureStore,
        store: LocalStore,
        backend: Arc<dyn AnalysisBackend>,
        event_bus: EventBus,
        timeout: Duration,
    ) -> Self {
        Self {
            runner: Arc::new(AttemptRunner {
                captures,
                store,
                backend,
                event_bus,
                timeout,
                in_flight: AtomicBool::new(false),
                attempt: RwLock::new(AnalysisAttempt::new()),
            }),
        }
    }

    /// Snapshot of the current (or last) attempt
    pub async fn state(&self) -> AnalysisAttempt {
        self.runner.attempt.read().await.clone()
    }

    pub async fn phase(&self) -> AnalysisPhase {
        self.runner.attempt.read().await.phase
    }

    pub fn captures(&self) -> &CaptureStore {
        &self.runner.captures
    }

    /// Whether an attempt is running, including one whose caller stopped
    /// waiting for it
    pub fn is_running(&self) -> bool {
        self.runner.in_flight.load(Ordering::SeqCst)
    }

    /// Run one attempt
    ///
    /// Returns [`AnalysisError::AttemptInProgress`] without touching anything
    /// when another attempt is still running.
    ///
    /// The attempt runs on its own task. Dropping the returned future stops
    /// the wait, not the attempt: it still reaches a terminal phase and
    /// clears the capture slots.
    pub async fn execute(&self) -> Result<AnalysisResult, AnalysisError> {
        if self
            .runner
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("Analysis requested while an attempt is in flight");
            return Err(AnalysisError::AttemptInProgress);
        }
        let guard = InFlightGuard(Arc::clone(&self.runner));

        let task = tokio::spawn(async move {
            let outcome = guard.0.run().await;
            drop(guard);
            outcome
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Analysis task ended abnormally");
                Err(AnalysisError::Service {
                    status: None,
                    message: SERVICE_FALLBACK_MESSAGE.to_string(),
                })
            }
        }
    }

    /// Record a set of photos in the order given
    ///
    /// If one cannot be recorded, the slots filled so far are discarded with
    /// their files and the attempt returns to Idle.
    pub async fn record_captures(
        &self,
        photos: &[(CaptureSlot, PathBuf)],
    ) -> Result<(), CaptureError> {
        for (slot, path) in photos {
            if let Err(e) = self.runner.captures.record(*slot, path).await {
                if let Err(cleanup) = self.restart().await {
                    tracing::warn!(error = %cleanup, "Failed to discard partial captures");
                }
                return Err(CaptureError::Record {
                    slot: *slot,
                    path: path.clone(),
                    source: Box::new(e),
                });
            }
        }
        Ok(())
    }

    /// Discard captures and return to Idle; the next capture starts at the
    /// returned slot
    pub async fn restart(&self) -> Result<CaptureSlot, AnalysisError> {
        if self.is_running() {
            return Err(AnalysisError::AttemptInProgress);
        }

        let runner = &self.runner;
        runner.captures.clear().await?;

        let mut attempt = runner.attempt.write().await;
        if attempt.phase != AnalysisPhase::Idle {
            let transition = attempt.transition_to(AnalysisPhase::Idle);
            attempt.status_text.clear();
            attempt.error = None;
            runner.emit_phase_change(transition.attempt_id, transition.old_phase, transition.new_phase);
        }

        Ok(CaptureSlot::ALL[0])
    }
}

impl AttemptRunner {
    /// One attempt from a fresh record to its terminal phase
    async fn run(&self) -> Result<AnalysisResult, AnalysisError> {
        let attempt_id = {
            let mut attempt = self.attempt.write().await;
            *attempt = AnalysisAttempt::new();
            attempt.attempt_id
        };

        let outcome = self.run_attempt(attempt_id).await;

        if let Err(e) = self.captures.clear().await {
            tracing::error!(attempt_id = %attempt_id, error = %e, "Failed to clear capture slots");
        }

        match outcome {
            Ok(result) => {
                self.transition(attempt_id, AnalysisPhase::Complete, STATUS_COMPLETE)
                    .await;

                let identity = result.identity();
                self.event_bus.emit_lossy(SgcEvent::AnalysisCompleted {
                    attempt_id,
                    face_shape: identity.face_shape,
                    body_type: identity.body_type,
                    skin_tone: identity.skin_tone,
                    seasonal_palette: identity.seasonal_palette,
                    timestamp: Utc::now(),
                });

                tracing::info!(attempt_id = %attempt_id, "Analysis complete");
                Ok(result)
            }
            Err(err) => {
                self.fail(attempt_id, err.clone()).await;
                Err(err)
            }
        }
    }

    async fn run_attempt(&self, attempt_id: Uuid) -> Result<AnalysisResult, AnalysisError> {
        let refs = self.captures.load_all().await?;
        let missing: Vec<CaptureSlot> = CaptureSlot::ALL
            .into_iter()
            .filter(|slot| !refs.iter().any(|r| r.slot == *slot))
            .collect();
        if !missing.is_empty() {
            tracing::warn!(attempt_id = %attempt_id, ?missing, "Analysis started with missing captures");
            return Err(AnalysisError::MissingInput { missing });
        }

        // Phase 1: Preparing
        self.transition(attempt_id, AnalysisPhase::Preparing, STATUS_PREPARING)
            .await;
        self.event_bus.emit_lossy(SgcEvent::AnalysisStarted {
            attempt_id,
            timestamp: Utc::now(),
        });

        let phone = self
            .store
            .get_string(keys::PHONE)
            .await?
            .filter(|p| !p.trim().is_empty())
            .map(|p| clean_phone(&p));

        self.set_status(STATUS_PROCESSING).await;
        let images = encode_all(&refs).await?;

        // Phase 2: Analyzing
        self.transition(attempt_id, AnalysisPhase::Analyzing, STATUS_ANALYZING)
            .await;

        let request = AnalyzeRequest { images, phone };
        let body = match tokio::time::timeout(self.timeout, self.backend.analyze(&request)).await {
            Err(_) => {
                tracing::warn!(attempt_id = %attempt_id, timeout = ?self.timeout, "Analysis request timed out");
                return Err(AnalysisError::Timeout(self.timeout));
            }
            Ok(Err(e)) => {
                tracing::warn!(attempt_id = %attempt_id, error = %e, "Analysis request failed");
                return Err(classify_failure(e, self.timeout));
            }
            Ok(Ok(body)) => body,
        };

        let result = AnalysisResult::parse(&body).ok_or_else(|| {
            tracing::warn!(attempt_id = %attempt_id, body_len = body.len(), "Malformed analysis response");
            AnalysisError::Service {
                status: None,
                message: SERVICE_FALLBACK_MESSAGE.to_string(),
            }
        })?;

        // Phase 3: persist, flag last
        self.store
            .set_string(keys::ANALYSIS_RESULT, result.raw())
            .await?;
        self.store.set_flag(keys::ANALYSIS_COMPLETE, true).await?;

        tracing::debug!(attempt_id = %attempt_id, bytes = body.len(), "Stored analysis result");
        Ok(result)
    }

    async fn set_status(&self, text: &str) {
        self.attempt.write().await.status_text = text.to_string();
    }

    async fn transition(&self, attempt_id: Uuid, phase: AnalysisPhase, status_text: &str) {
        let transition = {
            let mut attempt = self.attempt.write().await;
            attempt.status_text = status_text.to_string();
            attempt.transition_to(phase)
        };
        tracing::info!(
            attempt_id = %attempt_id,
            from = %transition.old_phase,
            to = %transition.new_phase,
            "Analysis phase transition"
        );
        self.emit_phase_change(attempt_id, transition.old_phase, transition.new_phase);
    }

    async fn fail(&self, attempt_id: Uuid, err: AnalysisError) {
        let transition = self.attempt.write().await.fail(err.clone());
        self.emit_phase_change(attempt_id, transition.old_phase, transition.new_phase);

        let event = match &err {
            AnalysisError::ImageValidation { reasons } => SgcEvent::AnalysisFailedInvalidImage {
                attempt_id,
                slot: err.restart_slot(),
                message: reasons.join(" | "),
                timestamp: Utc::now(),
            },
            _ => SgcEvent::AnalysisFailed {
                attempt_id,
                kind: err.kind().to_string(),
                message: err.user_message(),
                timestamp: Utc::now(),
            },
        };
        self.event_bus.emit_lossy(event);

        tracing::warn!(attempt_id = %attempt_id, kind = err.kind(), error = %err, "Analysis failed");
    }

    fn emit_phase_change(&self, attempt_id: Uuid, old_phase: AnalysisPhase, new_phase: AnalysisPhase) {
        self.event_bus.emit_lossy(SgcEvent::AnalysisPhaseChanged {
            attempt_id,
            old_phase,
            new_phase,
            timestamp: Utc::now(),
        });
    }
}

/// Encode the three captures concurrently; `refs` is in capture order
async fn encode_all(refs: &[CapturedImageRef]) -> Result<[String; 3], AnalysisError> {
    let (face, body, skin) = tokio::try_join!(
        encode_slot(refs[0].slot, refs[0].path.clone()),
        encode_slot(refs[1].slot, refs[1].path.clone()),
        encode_slot(refs[2].slot, refs[2].path.clone()),
    )?;
    Ok([face, body, skin])
}

async fn encode_slot(slot: CaptureSlot, path: PathBuf) -> Result<String, AnalysisError> {
    let prep_error = |message: String| AnalysisError::ImagePreparation { slot, message };

    tokio::task::spawn_blocking(move || image_prep::encode_for_upload(&path))
        .await
        .map_err(|e| prep_error(e.to_string()))?
        .map_err(|e| prep_error(e.to_string()))
}

/// Map a failed analyze call onto the error taxonomy
///
/// A non-success body carrying `detail.error == IMAGE_VALIDATION_FAILED` is a
/// validation failure; anything else is a service error with the server's
/// `detail.message` (or `detail` itself when it is a string).
pub fn classify_failure(err: BackendError, timeout: Duration) -> AnalysisError {
    match err {
        BackendError::Timeout => AnalysisError::Timeout(timeout),
        BackendError::Network(_) => AnalysisError::Service {
            status: None,
            message: NETWORK_MESSAGE.to_string(),
        },
        BackendError::Parse(_) => AnalysisError::Service {
            status: None,
            message: SERVICE_FALLBACK_MESSAGE.to_string(),
        },
        BackendError::Api { status, body } => {
            let detail = serde_json::from_str::<AnalyzeErrorBody>(&body)
                .ok()
                .and_then(|b| b.detail);

            if let Some(detail) = &detail {
                if detail.get("error").and_then(|e| e.as_str()) == Some(IMAGE_VALIDATION_FAILED) {
                    let reasons = detail
                        .get("messages")
                        .and_then(|m| m.as_array())
                        .map(|msgs| {
                            msgs.iter()
                                .filter_map(|m| m.as_str().map(str::to_string))
                                .collect()
                        })
                        .unwrap_or_default();
                    return AnalysisError::ImageValidation { reasons };
                }
            }

            let message = detail
                .as_ref()
                .and_then(|d| {
                    d.get("message")
                        .and_then(|m| m.as_str())
                        .or_else(|| d.as_str())
                })
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(SERVICE_FALLBACK_MESSAGE)
                .to_string();

            AnalysisError::Service {
                status: Some(status),
                message,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_secs(30);

    fn api(status: u16, body: &str) -> BackendError {
        BackendError::Api {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_classify_validation_failure() {
        let err = classify_failure(
            api(
                422,
                r#"{"detail": {"error": "IMAGE_VALIDATION_FAILED", "messages": ["Face not clearly visible", "Too dark"]}}"#,
            ),
            T,
        );
        assert_eq!(
            err,
            AnalysisError::ImageValidation {
                reasons: vec!["Face not clearly visible".to_string(), "Too dark".to_string()]
            }
        );
    }

    #[test]
    fn test_classify_validation_without_messages() {
        let err = classify_failure(
            api(422, r#"{"detail": {"error": "IMAGE_VALIDATION_FAILED"}}"#),
            T,
        );
        assert_eq!(err.user_message(), crate::error::VALIDATION_FALLBACK_MESSAGE);
    }

    #[test]
    fn test_classify_service_messages() {
        let err = classify_failure(api(500, r#"{"detail": {"message": "Model overloaded"}}"#), T);
        assert_eq!(err.user_message(), "Model overloaded");

        let err = classify_failure(api(429, r#"{"detail": "Analysis limit reached"}"#), T);
        assert_eq!(err.user_message(), "Analysis limit reached");
        assert!(matches!(err, AnalysisError::Service { status: Some(429), .. }));

        let err = classify_failure(api(502, "<html>Bad Gateway</html>"), T);
        assert_eq!(err.user_message(), SERVICE_FALLBACK_MESSAGE);
    }

    #[test]
    fn test_classify_transport_failures() {
        assert_eq!(classify_failure(BackendError::Timeout, T), AnalysisError::Timeout(T));
        assert_eq!(
            classify_failure(BackendError::Network("refused".to_string()), T).kind(),
            "service"
        );
    }
}
