//! Generated preview cache
//!
//! Memoizes server-side preview generations per stable identifier, in memory
//! and in the local store.
//!
//! - A cached identifier is returned without a network call.
//! - Concurrent requests for the same identifier share one backend call
//!   (single-flight via `futures::future::Shared`).
//! - Failures cache nothing; the identifier stays eligible for a later call.
//! - Persistence is a merge-write of the entries being added, serialized by
//!   a lock, so concurrent generations for other identifiers are not lost.
//! - [`PreviewCache::clear`] starts a new epoch; generations begun before it
//!   still answer their callers but are not cached.

use crate::db::{keys, LocalStore};
use crate::models::preview::PreviewRequest;
use crate::types::PreviewBackend;
use crate::utils::clean_phone;
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use sgc_common::events::{EventBus, SgcEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PreviewError {
    #[error("Preview backend error: {0}")]
    Backend(String),

    /// `success: false` or no image in the response
    #[error("Preview generation was rejected")]
    Rejected,
}

type SharedGeneration = Shared<BoxFuture<'static, Result<String, PreviewError>>>;

struct Inner {
    store: LocalStore,
    backend: Arc<dyn PreviewBackend>,
    event_bus: EventBus,
    memory: RwLock<HashMap<String, String>>,
    in_flight: Mutex<HashMap<String, SharedGeneration>>,
    persist_lock: Mutex<()>,
    epoch: AtomicU64,
}

/// Cloning is cheap; clones share the same cache
#[derive(Clone)]
pub struct PreviewCache {
    inner: Arc<Inner>,
}

impl PreviewCache {
    pub fn new(store: LocalStore, backend: Arc<dyn PreviewBackend>, event_bus: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                backend,
                event_bus,
                memory: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                persist_lock: Mutex::new(()),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Cached image for `identifier`, if any
    pub async fn get(&self, identifier: &str) -> Option<String> {
        self.inner.memory.read().await.get(identifier).cloned()
    }

    /// All cached previews
    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.inner.memory.read().await.clone()
    }

    /// Restore persisted previews and merge those the backend already has
    ///
    /// Returns the number of cached previews afterwards.
    pub async fn load(&self, phone: Option<&str>) -> usize {
        let epoch = self.inner.current_epoch();
        let persisted: HashMap<String, String> =
            match self.inner.store.get_json(keys::GENERATED_PREVIEWS).await {
                Ok(map) => map.unwrap_or_default(),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not read persisted previews");
                    HashMap::new()
                }
            };

        {
            let mut memory = self.inner.memory.write().await;
            for (id, image) in persisted {
                memory.entry(id).or_insert(image);
            }
        }

        if let Some(phone) = phone.map(clean_phone).filter(|p| !p.is_empty()) {
            match self.inner.backend.cached_previews(&phone).await {
                Ok(remote) if !remote.is_empty() => {
                    let entries: Vec<(String, String)> = remote
                        .into_iter()
                        .filter(|(_, image)| !image.is_empty())
                        .collect();
                    self.inner.commit(epoch, &entries).await;
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "Could not fetch backend preview cache"),
            }
        }

        self.inner.memory.read().await.len()
    }

    /// Return the preview for `request`, generating it at most once
    pub async fn generate(
        &self,
        request: PreviewRequest,
        phone: Option<&str>,
    ) -> Result<String, PreviewError> {
        let identifier = request.identifier();

        if let Some(image) = self.get(&identifier).await {
            tracing::debug!(identifier = %identifier, "Preview cache hit");
            return Ok(image);
        }

        let generation = {
            let mut in_flight = self.inner.in_flight.lock().await;

            // A generation may have finished while we waited for the lock
            if let Some(image) = self.get(&identifier).await {
                return Ok(image);
            }

            match in_flight.get(&identifier) {
                Some(existing) => {
                    tracing::debug!(identifier = %identifier, "Joining in-flight preview generation");
                    existing.clone()
                }
                None => {
                    let inner = self.inner.clone();
                    let id = identifier.clone();
                    let phone = phone.map(clean_phone).filter(|p| !p.is_empty());
                    let epoch = self.inner.current_epoch();
                    let generation = async move {
                        inner.run_generation(id, request, phone, epoch).await
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(identifier.clone(), generation.clone());
                    generation
                }
            }
        };

        let result = generation.clone().await;

        let mut in_flight = self.inner.in_flight.lock().await;
        if in_flight
            .get(&identifier)
            .is_some_and(|current| current.ptr_eq(&generation))
        {
            in_flight.remove(&identifier);
        }

        result
    }

    /// Forget every cached preview (memory and store)
    ///
    /// Generations still in flight finish for their callers without writing
    /// to the cache; the next request for their identifier starts afresh.
    pub async fn clear(&self) -> sgc_common::Result<()> {
        let _persist = self.inner.persist_lock.lock().await;
        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.in_flight.lock().await.clear();
        self.inner.memory.write().await.clear();
        tracing::debug!(epoch, "Preview cache cleared");
        self.inner.store.remove(keys::GENERATED_PREVIEWS).await
    }
}

impl Inner {
    async fn run_generation(
        self: Arc<Self>,
        identifier: String,
        request: PreviewRequest,
        phone: Option<String>,
        epoch: u64,
    ) -> Result<String, PreviewError> {
        tracing::info!(identifier = %identifier, "Generating preview");

        let response = self
            .backend
            .generate_preview(&request, phone)
            .await
            .map_err(|e| {
                tracing::warn!(identifier = %identifier, error = %e, "Preview generation failed");
                PreviewError::Backend(e.to_string())
            })?;

        let image = match response.image_base64 {
            Some(image) if response.success && !image.is_empty() => image,
            _ => {
                tracing::warn!(identifier = %identifier, "Preview generation rejected");
                return Err(PreviewError::Rejected);
            }
        };

        if !self.commit(epoch, &[(identifier.clone(), image.clone())]).await {
            tracing::debug!(identifier = %identifier, "Preview finished after a clear, not cached");
            return Ok(image);
        }

        self.event_bus.emit_lossy(SgcEvent::PreviewGenerated {
            identifier,
            timestamp: Utc::now(),
        });

        Ok(image)
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Cache `entries` in memory and the store unless a clear has happened
    /// since `epoch`; returns whether they were cached
    async fn commit(&self, epoch: u64, entries: &[(String, String)]) -> bool {
        let _guard = self.persist_lock.lock().await;
        if self.current_epoch() != epoch {
            return false;
        }

        {
            let mut memory = self.memory.write().await;
            for (id, image) in entries {
                memory.insert(id.clone(), image.clone());
            }
        }
        self.persist_locked(entries).await;
        true
    }

    /// Merge `entries` into the persisted map; caller holds `persist_lock`
    async fn persist_locked(&self, entries: &[(String, String)]) {
        let mut map: HashMap<String, String> = match self.store.get_json(keys::GENERATED_PREVIEWS).await
        {
            Ok(map) => map.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read persisted previews before merge");
                return;
            }
        };
        for (id, image) in entries {
            map.insert(id.clone(), image.clone());
        }

        if let Err(e) = self.store.set_json(keys::GENERATED_PREVIEWS, &map).await {
            tracing::warn!(error = %e, "Failed to persist generated previews");
        }
    }
}
