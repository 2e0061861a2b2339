//! Preview cache integration tests
//!
//! Memoization, single-flight generation and merge-write persistence.

mod helpers;

use helpers::fake_backend::Reply;
use helpers::test_session;
use serde_json::json;
use sgc_client::db::keys;
use sgc_client::models::{HeadshotStyle, OutfitItem, PreviewRequest, StyleItem};
use sgc_client::services::backend_client::{
    CACHED_IMAGES_PATH, GENERATE_HEADSHOT_PATH, GENERATE_OUTFIT_PATH,
};
use sgc_client::services::PreviewError;
use std::collections::HashMap;
use std::time::Duration;

fn outfit(context: &str, index: usize) -> PreviewRequest {
    PreviewRequest::Outfit {
        context_name: context.to_string(),
        outfit_index: index,
        outfit: OutfitItem {
            title: "Smart Casual".to_string(),
            head_to_toe: vec!["Navy blazer".to_string()],
            visual_spec: "navy blazer".to_string(),
            ..Default::default()
        },
    }
}

fn hairstyle(index: usize) -> PreviewRequest {
    PreviewRequest::Headshot {
        style: HeadshotStyle::Hairstyle,
        index,
        item: StyleItem {
            name: "Textured Crop".to_string(),
            description: "Short sides".to_string(),
            ..Default::default()
        },
    }
}

fn image_reply(image: &str) -> Reply {
    Reply::json(json!({ "success": true, "image_base64": image }))
}

#[tokio::test]
async fn test_second_call_served_from_cache() {
    // Given
    let ts = test_session().await;
    ts.backend.reply(GENERATE_OUTFIT_PATH, image_reply("aW1hZ2Ux"));
    let cache = ts.session.previews();

    // When: the same preview is requested twice in sequence
    let first = cache.generate(outfit("Date Night", 0), None).await.unwrap();
    let second = cache.generate(outfit("Date Night", 0), None).await.unwrap();

    // Then: one network call, same payload
    assert_eq!(first, "aW1hZ2Ux");
    assert_eq!(first, second);
    assert_eq!(ts.backend.calls(GENERATE_OUTFIT_PATH), 1);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_generation() {
    let ts = test_session().await;
    ts.backend.reply(
        GENERATE_OUTFIT_PATH,
        image_reply("c2hhcmVk").delayed(Duration::from_millis(200)),
    );
    let cache = ts.session.previews();

    let results = futures::future::join_all(
        (0..5).map(|_| cache.generate(outfit("Work", 1), None)),
    )
    .await;

    assert_eq!(ts.backend.calls(GENERATE_OUTFIT_PATH), 1);
    for result in results {
        assert_eq!(result.unwrap(), "c2hhcmVk");
    }
}

#[tokio::test]
async fn test_failure_caches_nothing() {
    // Given: the first generation is rejected
    let ts = test_session().await;
    ts.backend.reply(
        GENERATE_HEADSHOT_PATH,
        Reply::json(json!({ "success": false })),
    );
    let cache = ts.session.previews();

    let err = cache.generate(hairstyle(0), None).await.unwrap_err();
    assert_eq!(err, PreviewError::Rejected);
    assert!(cache.get("hairstyle-0").await.is_none());

    // When: the backend recovers
    ts.backend.reply(GENERATE_HEADSHOT_PATH, image_reply("aGFpcg=="));
    let image = cache.generate(hairstyle(0), None).await.unwrap();

    // Then: the identifier was still eligible
    assert_eq!(image, "aGFpcg==");
    assert_eq!(ts.backend.calls(GENERATE_HEADSHOT_PATH), 2);
}

#[tokio::test]
async fn test_backend_error_is_reported() {
    let ts = test_session().await;
    ts.backend
        .reply(GENERATE_OUTFIT_PATH, Reply::with_status(500, json!({})));

    let err = ts
        .session
        .previews()
        .generate(outfit("Weekend", 0), None)
        .await
        .unwrap_err();

    assert!(matches!(err, PreviewError::Backend(_)));
    assert!(ts.session.previews().snapshot().await.is_empty());
}

#[tokio::test]
async fn test_concurrent_generations_are_all_persisted() {
    let ts = test_session().await;
    ts.backend.reply(
        GENERATE_OUTFIT_PATH,
        image_reply("b3V0Zml0").delayed(Duration::from_millis(50)),
    );
    ts.backend.reply(
        GENERATE_HEADSHOT_PATH,
        image_reply("aGVhZA==").delayed(Duration::from_millis(50)),
    );
    let cache = ts.session.previews();

    let (a, b, c) = tokio::join!(
        cache.generate(outfit("Date Night", 0), None),
        cache.generate(outfit("Date Night", 1), None),
        cache.generate(hairstyle(2), None),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    let persisted: HashMap<String, String> = ts
        .session
        .store()
        .get_json(keys::GENERATED_PREVIEWS)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(persisted.len(), 3);
    assert_eq!(persisted["date-night-0"], "b3V0Zml0");
    assert_eq!(persisted["date-night-1"], "b3V0Zml0");
    assert_eq!(persisted["hairstyle-2"], "aGVhZA==");
}

#[tokio::test]
async fn test_load_restores_and_merges_backend_cache() {
    // Given: one preview persisted locally, another known to the backend
    let ts = test_session().await;
    let mut persisted = HashMap::new();
    persisted.insert("work-0".to_string(), "bG9jYWw=".to_string());
    ts.session
        .store()
        .set_json(keys::GENERATED_PREVIEWS, &persisted)
        .await
        .unwrap();
    ts.backend.reply(
        CACHED_IMAGES_PATH,
        Reply::json(json!({ "images": { "beard-0": "cmVtb3Rl" } })),
    );

    // When
    let count = ts.session.previews().load(Some("+15550001111")).await;

    // Then: both are cached and the backend entry was persisted
    assert_eq!(count, 2);
    let cache = ts.session.previews();
    assert_eq!(cache.get("work-0").await.as_deref(), Some("bG9jYWw="));
    assert_eq!(cache.get("beard-0").await.as_deref(), Some("cmVtb3Rl"));

    let stored: HashMap<String, String> = ts
        .session
        .store()
        .get_json(keys::GENERATED_PREVIEWS)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.len(), 2);

    let request = &ts.backend.requests(CACHED_IMAGES_PATH)[0];
    assert_eq!(request.json()["phone"], "5550001111");

    // A cached identifier never reaches the network
    cache
        .generate(
            PreviewRequest::Headshot {
                style: HeadshotStyle::Beard,
                index: 0,
                item: StyleItem::default(),
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(ts.backend.calls(GENERATE_HEADSHOT_PATH), 0);
}

#[tokio::test]
async fn test_clear_forgets_everything() {
    let ts = test_session().await;
    ts.backend.reply(GENERATE_OUTFIT_PATH, image_reply("eA=="));
    let cache = ts.session.previews();
    cache.generate(outfit("Work", 0), None).await.unwrap();

    cache.clear().await.unwrap();

    assert!(cache.snapshot().await.is_empty());
    assert!(!ts
        .session
        .store()
        .contains(keys::GENERATED_PREVIEWS)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_generation_finishing_after_clear_is_not_cached() {
    // Given: a slow generation already in flight
    let ts = test_session().await;
    ts.backend.reply(
        GENERATE_OUTFIT_PATH,
        image_reply("c3RhbGU=").delayed(Duration::from_millis(300)),
    );
    let cache = ts.session.previews();

    // When: the cache is cleared while it runs
    let (generated, cleared) = tokio::join!(cache.generate(outfit("Work", 0), None), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.clear().await
    });
    cleared.unwrap();

    // Then: the caller still gets its image, but nothing was written back
    assert_eq!(generated.unwrap(), "c3RhbGU=");
    assert!(cache.get("work-0").await.is_none());
    assert!(!ts
        .session
        .store()
        .contains(keys::GENERATED_PREVIEWS)
        .await
        .unwrap());

    // A fresh request goes back to the backend
    ts.backend.reply(GENERATE_OUTFIT_PATH, image_reply("ZnJlc2g="));
    let fresh = cache.generate(outfit("Work", 0), None).await.unwrap();
    assert_eq!(fresh, "ZnJlc2g=");
    assert_eq!(ts.backend.calls(GENERATE_OUTFIT_PATH), 2);
    assert_eq!(cache.get("work-0").await.as_deref(), Some("ZnJlc2g="));
}
