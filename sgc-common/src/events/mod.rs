//! Telemetry event system
//!
//! Telemetry is one-way: producers call [`EventBus::emit_lossy`] and never
//! observe whether anyone received the event. Subscribers (analytics
//! forwarders, test probes) attach with [`EventBus::subscribe`].

mod analysis_types;

pub use analysis_types::{AnalysisPhase, CaptureSlot};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// SGC telemetry events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SgcEvent {
    /// Phone verification finished and the session was stored
    SignupCompleted {
        /// Phone number with all but the last four digits masked
        phone_masked: String,
        timestamp: DateTime<Utc>,
    },

    /// An analysis attempt left Idle
    AnalysisStarted {
        attempt_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// An analysis attempt moved between phases
    AnalysisPhaseChanged {
        attempt_id: Uuid,
        old_phase: AnalysisPhase,
        new_phase: AnalysisPhase,
        timestamp: DateTime<Utc>,
    },

    /// Result persisted
    AnalysisCompleted {
        attempt_id: Uuid,
        face_shape: Option<String>,
        body_type: Option<String>,
        skin_tone: Option<String>,
        seasonal_palette: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// The backend rejected the submitted photos
    AnalysisFailedInvalidImage {
        attempt_id: Uuid,
        slot: CaptureSlot,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Any other attempt failure
    AnalysisFailed {
        attempt_id: Uuid,
        /// Error kind (e.g. "timeout", "service")
        kind: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// A preview image was generated and cached
    PreviewGenerated {
        identifier: String,
        timestamp: DateTime<Utc>,
    },

    /// A stylist chat message was sent
    StylistMessageSent {
        message_length: usize,
        timestamp: DateTime<Utc>,
    },

    /// The user opened today's transformation task
    TaskStarted {
        day: i64,
        title: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Today's transformation task was marked done
    TaskCompleted {
        day: i64,
        timestamp: DateTime<Utc>,
    },

    /// Premium access unlocked through a membership email
    MembershipUnlocked {
        tier: String,
        timestamp: DateTime<Utc>,
    },
}

/// Mask a phone number for telemetry, keeping the last four digits
pub fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 4 {
        return "*".repeat(digits.len());
    }
    let visible: String = digits[digits.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(digits.len() - 4), visible)
}

/// Central event distribution (tokio broadcast)
///
/// Cloning is cheap; clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SgcEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// When a slow subscriber falls more than `capacity` events behind, the
    /// oldest events are dropped for that subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SgcEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscriber is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: SgcEvent) -> Result<usize, broadcast::error::SendError<SgcEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening
    pub fn emit_lossy(&self, event: SgcEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
