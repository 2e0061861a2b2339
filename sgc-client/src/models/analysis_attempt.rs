//! Analysis attempt state
//!
//! One attempt is one pass through Preparing -> Analyzing -> (Complete | Error).
//! The attempt is in-memory only; the persisted outcome is the result blob and
//! the analysis-complete flag.

use crate::error::AnalysisError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sgc_common::events::AnalysisPhase;
use uuid::Uuid;

pub const STATUS_PREPARING: &str = "Preparing your photos...";
pub const STATUS_PROCESSING: &str = "Processing images...";
pub const STATUS_ANALYZING: &str = "Analyzing your identity...";
pub const STATUS_COMPLETE: &str = "Identity unlocked!";

/// Phase change record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub attempt_id: Uuid,
    pub old_phase: AnalysisPhase,
    pub new_phase: AnalysisPhase,
    pub transitioned_at: DateTime<Utc>,
}

/// Observable state of the current (or last) analysis attempt
#[derive(Debug, Clone)]
pub struct AnalysisAttempt {
    pub attempt_id: Uuid,
    pub phase: AnalysisPhase,
    /// Progress text shown while the attempt runs
    pub status_text: String,
    /// Failure, set when the attempt enters Error
    pub error: Option<AnalysisError>,
    pub transitions: Vec<PhaseTransition>,
    pub started_at: DateTime<Utc>,
    /// Set on Complete or Error
    pub ended_at: Option<DateTime<Utc>>,
}

impl Default for AnalysisAttempt {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisAttempt {
    pub fn new() -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            phase: AnalysisPhase::Idle,
            status_text: String::new(),
            error: None,
            transitions: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Move to `new_phase`, recording the transition
    ///
    /// Illegal transitions are applied anyway and logged; the orchestrator is
    /// the only caller and drives phases in order.
    pub fn transition_to(&mut self, new_phase: AnalysisPhase) -> PhaseTransition {
        if !self.phase.can_transition_to(new_phase) {
            tracing::warn!(
                attempt_id = %self.attempt_id,
                from = %self.phase,
                to = %new_phase,
                "Unexpected analysis phase transition"
            );
        }

        let transition = PhaseTransition {
            attempt_id: self.attempt_id,
            old_phase: self.phase,
            new_phase,
            transitioned_at: Utc::now(),
        };
        self.phase = new_phase;

        if new_phase.is_terminal() {
            self.ended_at = Some(transition.transitioned_at);
        }

        self.transitions.push(transition.clone());
        transition
    }

    /// Enter Error with the given failure
    pub fn fail(&mut self, error: AnalysisError) -> PhaseTransition {
        self.status_text = error.user_message();
        self.error = Some(error);
        self.transition_to(AnalysisPhase::Error)
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self.phase,
            AnalysisPhase::Preparing | AnalysisPhase::Analyzing
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut attempt = AnalysisAttempt::new();
        attempt.transition_to(AnalysisPhase::Preparing);
        assert!(attempt.is_running());
        attempt.transition_to(AnalysisPhase::Analyzing);
        attempt.transition_to(AnalysisPhase::Complete);

        assert_eq!(attempt.phase, AnalysisPhase::Complete);
        assert!(attempt.ended_at.is_some());
        assert!(!attempt.is_running());

        let phases: Vec<_> = attempt.transitions.iter().map(|t| t.new_phase).collect();
        assert_eq!(
            phases,
            vec![
                AnalysisPhase::Preparing,
                AnalysisPhase::Analyzing,
                AnalysisPhase::Complete
            ]
        );
    }

    #[test]
    fn test_fail_records_error() {
        let mut attempt = AnalysisAttempt::new();
        attempt.transition_to(AnalysisPhase::Preparing);
        attempt.transition_to(AnalysisPhase::Analyzing);
        let t = attempt.fail(AnalysisError::Timeout(std::time::Duration::from_secs(30)));

        assert_eq!(t.old_phase, AnalysisPhase::Analyzing);
        assert_eq!(attempt.phase, AnalysisPhase::Error);
        assert_eq!(attempt.status_text, crate::error::TIMEOUT_MESSAGE);
        assert!(matches!(attempt.error, Some(AnalysisError::Timeout(_))));
    }
}
