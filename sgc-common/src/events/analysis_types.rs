//! Analysis pipeline type definitions
//!
//! Shared between the event bus and the client services.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three fixed capture categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSlot {
    Face,
    Body,
    Skin,
}

impl CaptureSlot {
    /// Capture order; a restart always re-enters at the first entry
    pub const ALL: [CaptureSlot; 3] = [CaptureSlot::Face, CaptureSlot::Body, CaptureSlot::Skin];

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureSlot::Face => "face",
            CaptureSlot::Body => "body",
            CaptureSlot::Skin => "skin",
        }
    }
}

impl fmt::Display for CaptureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "face" => Ok(CaptureSlot::Face),
            "body" => Ok(CaptureSlot::Body),
            "skin" => Ok(CaptureSlot::Skin),
            other => Err(format!("Unknown capture slot: {}", other)),
        }
    }
}

/// Analysis attempt phase
///
/// ```text
/// Idle -> Preparing -> Analyzing -> Complete
///   |        |             |
///   +--------+--> Error <--+
/// ```
///
/// Idle goes straight to Error when captures are missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisPhase {
    /// No attempt running (initial state, or after a manual restart)
    Idle,
    /// Converting the three captures into upload payloads
    Preparing,
    /// Waiting on the remote analysis call
    Analyzing,
    /// Result persisted (terminal)
    Complete,
    /// Attempt failed (terminal until restart)
    Error,
}

impl AnalysisPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisPhase::Complete | AnalysisPhase::Error)
    }

    /// Whether `next` is a legal successor of this phase
    pub fn can_transition_to(&self, next: AnalysisPhase) -> bool {
        use AnalysisPhase::*;
        matches!(
            (self, next),
            (Idle, Preparing)
                | (Idle, Error)
                | (Preparing, Analyzing)
                | (Preparing, Error)
                | (Analyzing, Complete)
                | (Analyzing, Error)
                | (Error, Idle)
                | (Complete, Idle)
        )
    }
}

impl fmt::Display for AnalysisPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnalysisPhase::Idle => "idle",
            AnalysisPhase::Preparing => "preparing",
            AnalysisPhase::Analyzing => "analyzing",
            AnalysisPhase::Complete => "complete",
            AnalysisPhase::Error => "error",
        };
        f.write_str(s)
    }
}
