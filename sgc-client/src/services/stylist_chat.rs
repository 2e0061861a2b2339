//! Stylist chat
//!
//! Keeps the conversation and sends one turn at a time. A failed turn is
//! answered with an assistant error message instead of an error value, so the
//! conversation always stays usable.

use crate::db::{keys, LocalStore};
use crate::models::backend_types::ChatRequest;
use crate::models::chat::ChatMessage;
use crate::services::backend_client::HttpBackend;
use crate::utils::clean_phone;
use chrono::Utc;
use sgc_common::events::{EventBus, SgcEvent};
use std::time::Duration;
use tokio::sync::Mutex;

pub const CHAT_TIMEOUT_MESSAGE: &str =
    "The request took too long. The AI service may be temporarily unavailable. Please try again.";
pub const CHAT_FAILURE_MESSAGE: &str =
    "I apologize, but I'm having trouble connecting right now. Please try again in a moment.";

pub struct StylistChat {
    backend: HttpBackend,
    store: LocalStore,
    event_bus: EventBus,
    timeout: Duration,
    messages: Mutex<Vec<ChatMessage>>,
}

impl StylistChat {
    pub fn new(backend: HttpBackend, store: LocalStore, event_bus: EventBus, timeout: Duration) -> Self {
        Self {
            backend,
            store,
            event_bus,
            timeout,
            messages: Mutex::new(Vec::new()),
        }
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().await.clone()
    }

    /// Send `text` and return the assistant reply (or the error stand-in)
    ///
    /// Blank input is ignored and returns `None`. The turn lock is held for
    /// the whole exchange, so turns never interleave.
    pub async fn send(&self, text: &str) -> Option<ChatMessage> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let mut messages = self.messages.lock().await;
        let history = messages.iter().map(ChatMessage::to_turn).collect();
        messages.push(ChatMessage::user(text));

        self.event_bus.emit_lossy(SgcEvent::StylistMessageSent {
            message_length: text.chars().count(),
            timestamp: Utc::now(),
        });

        let phone = match self.store.get_string(keys::PHONE).await {
            Ok(phone) => phone.map(|p| clean_phone(&p)).filter(|p| !p.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read phone for chat");
                None
            }
        };

        let request = ChatRequest {
            message: text.to_string(),
            history,
            phone,
        };

        let reply = match tokio::time::timeout(self.timeout, self.backend.chat(&request)).await {
            Ok(Ok(response)) => ChatMessage::assistant(response.response),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Stylist chat failed");
                ChatMessage::assistant_error(CHAT_FAILURE_MESSAGE)
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "Stylist chat timed out");
                ChatMessage::assistant_error(CHAT_TIMEOUT_MESSAGE)
            }
        };

        messages.push(reply.clone());
        Some(reply)
    }

    pub async fn clear(&self) {
        self.messages.lock().await.clear();
    }
}
