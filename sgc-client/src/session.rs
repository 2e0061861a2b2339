//! Application session
//!
//! The session owns everything that lives for one app run: the local store,
//! the backend client, the event bus and the services built on them. It is
//! created at startup, passed explicitly to whoever needs it and torn down
//! with [`AppSession::close`].
//!
//! Sign-in state lives in the local store, so a new session picks up where the
//! previous one left off.

use crate::config::ClientConfig;
use crate::db::{keys, LocalStore};
use crate::models::{AnalysisResult, UserStatusSnapshot};
use crate::services::{
    select_phone_auth, AnalysisOrchestrator, AnalysisResetService, CaptureStore, DailyTaskService,
    HttpBackend, MembershipService, PhoneAuth, PreviewCache, StatusResolver, StylistChat,
    VerifiedUser,
};
use chrono::Utc;
use sgc_common::config::DataFolderInitializer;
use sgc_common::events::{mask_phone, EventBus, SgcEvent};
use sgc_common::{Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Telemetry channel capacity
const EVENT_BUS_CAPACITY: usize = 100;

pub struct AppSession {
    config: ClientConfig,
    store: LocalStore,
    event_bus: EventBus,
    backend: HttpBackend,
    phone_auth: Arc<dyn PhoneAuth>,
    orchestrator: AnalysisOrchestrator,
    status: StatusResolver,
    previews: PreviewCache,
    chat: StylistChat,
    tasks: DailyTaskService,
    membership: MembershipService,
    reset: AnalysisResetService,
}

impl AppSession {
    /// Create the data folder and local store, then build the services
    pub async fn start(config: ClientConfig) -> Result<Self> {
        let initializer = DataFolderInitializer::new(config.data_folder.clone());
        initializer.ensure_directory_exists()?;

        let db_path = initializer.database_path();
        tracing::info!(database = %db_path.display(), "Opening local store");
        let pool = sgc_common::db::init_database(&db_path).await?;

        Self::from_parts(config, pool)
    }

    /// Build a session on an already initialized pool
    pub fn from_parts(config: ClientConfig, pool: SqlitePool) -> Result<Self> {
        let store = LocalStore::new(pool);
        let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
        let backend = HttpBackend::new(config.backend_url.clone())
            .map_err(|e| Error::Config(format!("Backend client: {}", e)))?;

        let captures_dir = DataFolderInitializer::new(config.data_folder.clone()).captures_dir();
        let captures = CaptureStore::new(store.clone(), captures_dir);
        let shared_backend = Arc::new(backend.clone());

        let orchestrator = AnalysisOrchestrator::new(
            captures.clone(),
            store.clone(),
            shared_backend.clone(),
            event_bus.clone(),
            config.timeouts.analysis(),
        );
        let status = StatusResolver::new(
            store.clone(),
            shared_backend.clone(),
            config.timeouts.status(),
        );
        let previews = PreviewCache::new(store.clone(), shared_backend, event_bus.clone());
        let chat = StylistChat::new(
            backend.clone(),
            store.clone(),
            event_bus.clone(),
            config.timeouts.chat(),
        );
        let tasks = DailyTaskService::new(
            backend.clone(),
            event_bus.clone(),
            config.timeouts.status(),
        );
        let membership = MembershipService::new(backend.clone(), store.clone(), event_bus.clone());
        let reset = AnalysisResetService::new(
            backend.clone(),
            store.clone(),
            captures,
            previews.clone(),
        );
        let phone_auth = select_phone_auth(&config.auth, backend.clone());

        Ok(Self {
            config,
            store,
            event_bus,
            backend,
            phone_auth,
            orchestrator,
            status,
            previews,
            chat,
            tasks,
            membership,
            reset,
        })
    }

    /// Persist a verified sign-in
    pub async fn sign_in(&self, user: &VerifiedUser) -> Result<()> {
        self.store.set_flag(keys::AUTHENTICATED, true).await?;
        self.store.set_string(keys::PHONE, &user.phone).await?;
        self.store.set_flag(keys::IS_PREMIUM, user.is_premium).await?;
        self.store.set_flag(keys::VERIFIED, true).await?;
        self.store
            .set_flag(keys::ANALYSIS_COMPLETE, user.has_completed_analysis)
            .await?;

        self.event_bus.emit_lossy(SgcEvent::SignupCompleted {
            phone_masked: mask_phone(&user.phone),
            timestamp: Utc::now(),
        });
        tracing::info!(phone = %mask_phone(&user.phone), "Signed in");
        Ok(())
    }

    /// Forget the signed-in account; analysis data is kept
    pub async fn sign_out(&self) -> Result<()> {
        self.store.multi_remove(&keys::SESSION_KEYS).await?;
        self.chat.clear().await;
        tracing::info!("Signed out");
        Ok(())
    }

    pub async fn is_authenticated(&self) -> Result<bool> {
        self.store.get_flag(keys::AUTHENTICATED).await
    }

    /// Stored phone as entered at sign-in
    pub async fn phone(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .get_string(keys::PHONE)
            .await?
            .filter(|p| !p.trim().is_empty()))
    }

    pub async fn first_name(&self) -> Result<Option<String>> {
        self.store.get_string(keys::FIRST_NAME).await
    }

    pub async fn set_first_name(&self, name: &str) -> Result<()> {
        self.store.set_string(keys::FIRST_NAME, name.trim()).await
    }

    /// Merged premium/tier/analysis status for the signed-in user
    pub async fn resolve_status(&self) -> UserStatusSnapshot {
        let phone = match self.phone().await {
            Ok(phone) => phone,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read stored phone");
                None
            }
        };
        self.status.resolve(phone.as_deref()).await
    }

    /// Persisted analysis result; absent or unreadable blobs read as `None`
    pub async fn analysis_result(&self) -> Result<Option<AnalysisResult>> {
        let Some(raw) = self.store.get_string(keys::ANALYSIS_RESULT).await? else {
            return Ok(None);
        };
        let result = AnalysisResult::parse(&raw);
        if result.is_none() {
            tracing::warn!("Ignoring unreadable stored analysis result");
        }
        Ok(result)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn backend(&self) -> &HttpBackend {
        &self.backend
    }

    pub fn phone_auth(&self) -> &Arc<dyn PhoneAuth> {
        &self.phone_auth
    }

    pub fn analysis(&self) -> &AnalysisOrchestrator {
        &self.orchestrator
    }

    pub fn captures(&self) -> &CaptureStore {
        self.orchestrator.captures()
    }

    pub fn status(&self) -> &StatusResolver {
        &self.status
    }

    pub fn previews(&self) -> &PreviewCache {
        &self.previews
    }

    pub fn chat(&self) -> &StylistChat {
        &self.chat
    }

    pub fn tasks(&self) -> &DailyTaskService {
        &self.tasks
    }

    pub fn membership(&self) -> &MembershipService {
        &self.membership
    }

    pub fn reset(&self) -> &AnalysisResetService {
        &self.reset
    }

    /// Tear down: close the local store
    pub async fn close(self) {
        self.store.pool().close().await;
        tracing::debug!("Session closed");
    }
}
