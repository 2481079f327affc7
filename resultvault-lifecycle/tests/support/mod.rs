//! Shared helpers for lifecycle integration tests.
#![allow(dead_code)]

use resultvault_lifecycle::{
    DocumentLifecycleCoordinator, DownloadService, LifecycleConfig, MemoryBlobStorage,
    MemoryRecordStore, ReconciliationSweep, S3Config,
};
use std::sync::Arc;
use uuid::Uuid;

pub const MASTER_SECRET: &str = "master-secret";
pub const PASSWORD_SECRET: &str = "s1";
pub const TOKEN_SECRET: &str = "t1";

pub const REPORT: &[u8] = b"%PDF-1.7 lab report for ORD-42";

/// Encrypted config with fast backoff.
pub fn test_config() -> LifecycleConfig {
    LifecycleConfig {
        encryption_key: Some(MASTER_SECRET.into()),
        password_secret: PASSWORD_SECRET.into(),
        token_secret: TOKEN_SECRET.into(),
        upload_base_backoff_ms: 10,
        pending_upload_timeout_secs: 60,
        ..LifecycleConfig::default()
    }
}

pub fn plaintext_config() -> LifecycleConfig {
    LifecycleConfig {
        encryption_key: None,
        encryption_enabled: false,
        ..test_config()
    }
}

/// Coordinator, download service and sweep over shared in-memory backends.
pub struct Harness {
    pub storage: Arc<MemoryBlobStorage>,
    pub records: Arc<MemoryRecordStore>,
    pub coordinator: DocumentLifecycleCoordinator,
    pub downloads: DownloadService,
    pub sweep: ReconciliationSweep,
}

impl Harness {
    pub fn new(config: LifecycleConfig) -> Self {
        resultvault_lifecycle::telemetry::init_tracing();
        let storage = Arc::new(MemoryBlobStorage::new());
        let records = Arc::new(MemoryRecordStore::new());
        let coordinator =
            DocumentLifecycleCoordinator::new(&config, storage.clone(), records.clone())
                .expect("valid config");
        let downloads = DownloadService::new(&config, storage.clone(), records.clone())
            .expect("valid config");
        let sweep = ReconciliationSweep::new(&config, storage.clone(), records.clone());
        Self {
            storage,
            records,
            coordinator,
            downloads,
            sweep,
        }
    }

    pub fn encrypted() -> Self {
        Self::new(test_config())
    }
}

/// MinIO started by `docker compose -f docker-compose.test.yml up -d`.
pub fn minio_config() -> S3Config {
    S3Config {
        bucket: "resultvault-test".into(),
        region: "us-east-1".into(),
        endpoint_override: Some("http://localhost:9000".into()),
        access_key_id: "resultvault-test".into(),
        secret_access_key: "resultvault-test-secret".into(),
    }
}

/// Per-test unique prefix to prevent collisions.
pub fn unique_prefix() -> String {
    format!("test-runs/{}", Uuid::new_v4())
}
