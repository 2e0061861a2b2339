//! Ephemeral capture slots
//!
//! Each slot (face, body, skin) holds at most one local file reference under a
//! fixed key. Recording a slot again replaces the previous reference. The
//! analysis orchestrator clears all three after every attempt.

use crate::db::{keys, LocalStore};
use crate::services::image_prep::{self, ImagePrepError};
use sgc_common::events::CaptureSlot;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Image preparation failed: {0}")]
    Prep(#[from] ImagePrepError),

    #[error(transparent)]
    Storage(#[from] sgc_common::Error),

    #[error("Capture task failed: {0}")]
    Task(String),

    /// One photo of a set could not be recorded
    #[error("Failed to capture {slot} photo {}: {source}", .path.display())]
    Record {
        slot: CaptureSlot,
        path: PathBuf,
        #[source]
        source: Box<CaptureError>,
    },
}

/// A populated slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImageRef {
    pub slot: CaptureSlot,
    pub path: PathBuf,
}

pub fn slot_key(slot: CaptureSlot) -> &'static str {
    match slot {
        CaptureSlot::Face => keys::CAPTURE_FACE_URI,
        CaptureSlot::Body => keys::CAPTURE_BODY_URI,
        CaptureSlot::Skin => keys::CAPTURE_SKIN_URI,
    }
}

#[derive(Clone)]
pub struct CaptureStore {
    store: LocalStore,
    captures_dir: PathBuf,
}

impl CaptureStore {
    pub fn new(store: LocalStore, captures_dir: PathBuf) -> Self {
        Self {
            store,
            captures_dir,
        }
    }

    pub fn captures_dir(&self) -> &Path {
        &self.captures_dir
    }

    /// Resize a freshly taken photo into the captures directory and store it
    /// in `slot`
    pub async fn record(&self, slot: CaptureSlot, source: &Path) -> Result<PathBuf, CaptureError> {
        let dest = self
            .captures_dir
            .join(format!("{}-{}.jpg", slot, Uuid::new_v4().simple()));
        let width = image_prep::target_width(slot);

        let src = source.to_path_buf();
        let out = dest.clone();
        tokio::task::spawn_blocking(move || image_prep::prepare_capture(&src, &out, width))
            .await
            .map_err(|e| CaptureError::Task(e.to_string()))??;

        let previous = self.get(slot).await?;
        self.set_uri(slot, &dest).await?;
        if let Some(old) = previous.filter(|p| p != &dest) {
            self.remove_owned_file(&old).await;
        }

        tracing::info!(slot = %slot, path = %dest.display(), "Capture recorded");
        Ok(dest)
    }

    /// Point `slot` at an existing file (last write wins)
    pub async fn set_uri(&self, slot: CaptureSlot, path: &Path) -> Result<(), CaptureError> {
        self.store
            .set_string(slot_key(slot), &path.to_string_lossy())
            .await?;
        Ok(())
    }

    pub async fn get(&self, slot: CaptureSlot) -> Result<Option<PathBuf>, CaptureError> {
        Ok(self
            .store
            .get_string(slot_key(slot))
            .await?
            .filter(|s| !s.is_empty())
            .map(PathBuf::from))
    }

    /// Populated slots, in capture order
    pub async fn load_all(&self) -> Result<Vec<CapturedImageRef>, CaptureError> {
        let mut refs = Vec::with_capacity(CaptureSlot::ALL.len());
        for slot in CaptureSlot::ALL {
            if let Some(path) = self.get(slot).await? {
                refs.push(CapturedImageRef { slot, path });
            }
        }
        Ok(refs)
    }

    /// First empty slot in capture order, `None` when all are filled
    pub async fn next_slot(&self) -> Result<Option<CaptureSlot>, CaptureError> {
        for slot in CaptureSlot::ALL {
            if self.get(slot).await?.is_none() {
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }

    pub async fn is_empty(&self) -> Result<bool, CaptureError> {
        Ok(self.load_all().await?.is_empty())
    }

    /// Drop all three references and delete the files this store created
    pub async fn clear(&self) -> Result<(), CaptureError> {
        let refs = self.load_all().await?;
        let slot_keys: Vec<&str> = CaptureSlot::ALL.iter().map(|s| slot_key(*s)).collect();
        self.store.multi_remove(&slot_keys).await?;

        for r in refs {
            self.remove_owned_file(&r.path).await;
        }
        Ok(())
    }

    /// Files outside the captures directory belong to the caller and are kept
    async fn remove_owned_file(&self, path: &Path) {
        if !path.starts_with(&self.captures_dir) {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::debug!(path = %path.display(), error = %e, "Could not remove capture file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    async fn setup() -> (CaptureStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = sgc_common::db::init_in_memory_database().await.unwrap();
        let store = CaptureStore::new(LocalStore::new(pool), dir.path().join("captures"));
        (store, dir)
    }

    fn photo(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(1000, 1000, Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();
        path
    }

    #[tokio::test]
    async fn test_record_and_next_slot() {
        let (store, dir) = setup().await;
        assert_eq!(store.next_slot().await.unwrap(), Some(CaptureSlot::Face));

        let face = store
            .record(CaptureSlot::Face, &photo(dir.path(), "face.png"))
            .await
            .unwrap();
        assert!(face.starts_with(store.captures_dir()));
        assert_eq!(image::open(&face).unwrap().width(), 800);
        assert_eq!(store.next_slot().await.unwrap(), Some(CaptureSlot::Body));

        let skin = store
            .record(CaptureSlot::Skin, &photo(dir.path(), "skin.png"))
            .await
            .unwrap();
        assert_eq!(image::open(&skin).unwrap().width(), 600);
        assert_eq!(store.next_slot().await.unwrap(), Some(CaptureSlot::Body));
    }

    #[tokio::test]
    async fn test_rerecord_replaces_previous_file() {
        let (store, dir) = setup().await;
        let src = photo(dir.path(), "face.png");

        let first = store.record(CaptureSlot::Face, &src).await.unwrap();
        let second = store.record(CaptureSlot::Face, &src).await.unwrap();

        assert_ne!(first, second);
        assert!(!first.exists());
        assert!(second.exists());
        assert_eq!(store.get(CaptureSlot::Face).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_clear_keeps_foreign_files() {
        let (store, dir) = setup().await;
        let own = store
            .record(CaptureSlot::Face, &photo(dir.path(), "face.png"))
            .await
            .unwrap();
        let foreign = photo(dir.path(), "body.png");
        store.set_uri(CaptureSlot::Body, &foreign).await.unwrap();

        store.clear().await.unwrap();

        assert!(store.is_empty().await.unwrap());
        assert!(!own.exists());
        assert!(foreign.exists());
    }
}
