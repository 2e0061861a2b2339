//! Test helpers shared by the integration tests

#![allow(dead_code)]

pub mod fake_backend;

use fake_backend::FakeBackend;
use image::{Rgb, RgbImage};
use sgc_client::{AppSession, ClientConfig};
use sgc_common::events::CaptureSlot;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Session wired to a fresh fake backend and an in-memory store
///
/// The data folder (captures) lives in `dir`; keep it alive for the test.
pub struct TestSession {
    pub session: AppSession,
    pub backend: FakeBackend,
    pub dir: TempDir,
}

/// Build a session with one-second deadlines
pub async fn test_session() -> TestSession {
    let backend = FakeBackend::start().await;
    let dir = TempDir::new().unwrap();

    let mut config = ClientConfig::new(backend.base_url(), dir.path().to_path_buf());
    config.timeouts.analysis_secs = 1;
    config.timeouts.chat_secs = 1;
    config.timeouts.status_secs = 1;

    let pool = sgc_common::db::init_in_memory_database().await.unwrap();
    let session = AppSession::from_parts(config, pool).unwrap();

    TestSession {
        session,
        backend,
        dir,
    }
}

/// Solid-color PNG standing in for a camera photo
pub fn write_photo(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(1200, 1600, Rgb([180, 140, 110]))
        .save(&path)
        .unwrap();
    path
}

/// Fill the given capture slots with fresh photos
pub async fn capture(ts: &TestSession, slots: &[CaptureSlot]) {
    let photos = ts.dir.path().join("camera");
    std::fs::create_dir_all(&photos).unwrap();

    for slot in slots {
        let photo = write_photo(&photos, &format!("{}.png", slot));
        ts.session.captures().record(*slot, &photo).await.unwrap();
    }
}

/// Minimal successful analysis body
pub fn analysis_body() -> serde_json::Value {
    serde_json::json!({
        "identity_snapshot_v1": {
            "face_shape": "Oval",
            "body_type": "Athletic",
            "skin_tone": "Medium",
            "seasonal_palette": "Autumn"
        },
        "outfit_catalog_v1": {
            "contexts": [
                {
                    "context_name": "Date Night",
                    "outfits": [
                        {
                            "title": "Smart Casual",
                            "head_to_toe": ["Navy blazer", "White tee"],
                            "why_it_works": "Contrast",
                            "visual_spec": "navy blazer over white tee"
                        }
                    ]
                }
            ],
            "total_outfits": 1
        }
    })
}

/// Number of files left in the session's captures directory
pub fn capture_files(ts: &TestSession) -> usize {
    match std::fs::read_dir(ts.session.captures().captures_dir()) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}
