//! Daily transformation task
//!
//! Background check: failures and timeouts read as "no task" and are only
//! logged.

use crate::models::backend_types::{TodayTaskResponse, TransformationTask};
use crate::services::backend_client::HttpBackend;
use crate::types::BackendError;
use crate::utils::clean_phone;
use chrono::Utc;
use sgc_common::events::{EventBus, SgcEvent};
use std::time::Duration;

pub struct DailyTaskService {
    backend: HttpBackend,
    event_bus: EventBus,
    timeout: Duration,
}

impl DailyTaskService {
    pub fn new(backend: HttpBackend, event_bus: EventBus, timeout: Duration) -> Self {
        Self {
            backend,
            event_bus,
            timeout,
        }
    }

    /// Today's task for `phone`, `None` when unavailable
    pub async fn today(&self, phone: &str) -> Option<TodayTaskResponse> {
        let phone = clean_phone(phone);
        match tokio::time::timeout(self.timeout, self.backend.today_task(&phone)).await {
            Ok(Ok(today)) => Some(today),
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Today task fetch failed");
                None
            }
            Err(_) => {
                tracing::debug!("Today task fetch timed out");
                None
            }
        }
    }

    /// Record that the user opened `task`
    pub fn start(&self, task: &TransformationTask) {
        self.event_bus.emit_lossy(SgcEvent::TaskStarted {
            day: task.day,
            title: Some(task.title.clone()).filter(|t| !t.is_empty()),
            timestamp: Utc::now(),
        });
    }

    /// Mark `task` done and return the refreshed state
    pub async fn complete(
        &self,
        phone: &str,
        task: &TransformationTask,
    ) -> Result<Option<TodayTaskResponse>, BackendError> {
        let phone = clean_phone(phone);
        self.backend.complete_task(&phone, task.day).await?;

        self.event_bus.emit_lossy(SgcEvent::TaskCompleted {
            day: task.day,
            timestamp: Utc::now(),
        });
        tracing::info!(day = task.day, "Transformation task completed");

        Ok(self.today(&phone).await)
    }
}
