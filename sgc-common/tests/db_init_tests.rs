//! Local store initialization tests

use sgc_common::db::init::{init_database, init_in_memory_database};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("data").join("sgc.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Store initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing_and_keeps_values() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("sgc.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO kv_store (key, value, updated_at) VALUES ('k', 'v', '2026-01-01')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await.unwrap();
    let value: String = sqlx::query_scalar("SELECT value FROM kv_store WHERE key = 'k'")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(value, "v");
}

#[tokio::test]
async fn test_in_memory_store_has_table() {
    let pool = init_in_memory_database().await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_store")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}
