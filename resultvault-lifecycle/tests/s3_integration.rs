//! Integration tests for S3BlobStorage against real MinIO.
//!
//! Requires: `docker compose -f docker-compose.test.yml up -d`, then
//! `cargo test -- --ignored`.

mod support;

use pretty_assertions::assert_eq;
use resultvault_lifecycle::{
    BlobStorage, DeleteOutcome, DocumentLifecycleCoordinator, DownloadService, MemoryRecordStore,
    S3BlobStorage,
};
use serial_test::serial;
use std::sync::Arc;

fn storage() -> S3BlobStorage {
    S3BlobStorage::new(&support::minio_config()).unwrap()
}

#[tokio::test]
#[serial]
#[ignore = "requires MinIO"]
async fn put_get_roundtrip() {
    let s3 = storage();
    let key = format!("{}/roundtrip.bin", support::unique_prefix());

    s3.put(&key, b"hello integration test".to_vec(), "application/octet-stream")
        .await
        .unwrap();
    assert_eq!(s3.get(&key).await.unwrap(), Some(b"hello integration test".to_vec()));
}

#[tokio::test]
#[serial]
#[ignore = "requires MinIO"]
async fn missing_key_reads_as_none() {
    let s3 = storage();
    let key = format!("{}/does-not-exist.bin", support::unique_prefix());
    assert_eq!(s3.get(&key).await.unwrap(), None);
}

#[tokio::test]
#[serial]
#[ignore = "requires MinIO"]
async fn delete_reports_outcome() {
    let s3 = storage();
    let key = format!("{}/delete.bin", support::unique_prefix());

    s3.put(&key, b"data".to_vec(), "application/octet-stream").await.unwrap();
    assert_eq!(s3.delete(&key).await.unwrap(), DeleteOutcome::Deleted);
    assert_eq!(s3.delete(&key).await.unwrap(), DeleteOutcome::NotFound);
    assert_eq!(s3.get(&key).await.unwrap(), None);
}

#[tokio::test]
#[serial]
#[ignore = "requires MinIO"]
async fn overwrite_returns_latest_data() {
    let s3 = storage();
    let key = format!("{}/overwrite.bin", support::unique_prefix());

    s3.put(&key, b"version-1".to_vec(), "text/plain").await.unwrap();
    s3.put(&key, b"version-2".to_vec(), "text/plain").await.unwrap();
    assert_eq!(s3.get(&key).await.unwrap(), Some(b"version-2".to_vec()));
}

#[tokio::test]
#[serial]
#[ignore = "requires MinIO"]
async fn replace_and_download_through_s3() {
    let config = resultvault_lifecycle::LifecycleConfig {
        storage_prefix: support::unique_prefix(),
        ..support::test_config()
    };
    let s3: Arc<S3BlobStorage> = Arc::new(storage());
    let records = Arc::new(MemoryRecordStore::new());
    let coordinator =
        DocumentLifecycleCoordinator::new(&config, s3.clone(), records.clone()).unwrap();
    let downloads = DownloadService::new(&config, s3.clone(), records.clone()).unwrap();

    let first = coordinator.replace_result("ORD-42", b"v1").await.unwrap();
    let second = coordinator.replace_result("ORD-42", support::REPORT).await.unwrap();
    assert_eq!(s3.get(&first.path).await.unwrap(), None);

    let token = downloads.issue_customer_link("ORD-42").unwrap();
    let result = downloads.open(&token, Some(&second.password)).await.unwrap();
    assert_eq!(result.bytes, support::REPORT);
}

#[test]
fn empty_bucket_rejected() {
    let mut config = support::minio_config();
    config.bucket.clear();
    assert!(S3BlobStorage::new(&config).is_err());
}
