//! Result-document lifecycle.
//!
//! Stores one current result document per order and serves it back through
//! signed, expiring links:
//! - [`DocumentLifecycleCoordinator`] replaces an order's result: encrypt,
//!   upload with retry, commit the order's pointer, verify the commit
//! - [`DownloadService`] turns a link token (and password) back into plaintext
//! - [`ReconciliationSweep`] deletes uploads orphaned by crashes or failed
//!   rollbacks
//!
//! Storage and the order record are reached through the [`BlobStorage`] and
//! [`RecordStore`] traits. In-memory implementations ship alongside
//! [`S3BlobStorage`].

pub mod config;
pub mod coordinator;
pub mod download;
pub mod error;
pub mod paths;
pub mod reconcile;
pub mod record_store;
pub mod retry;
pub mod s3_storage;
pub mod storage;
pub mod telemetry;
pub mod types;

pub use config::{LifecycleConfig, S3Config};
pub use coordinator::{DocumentLifecycleCoordinator, ENCRYPTED_CONTENT_TYPE};
pub use download::DownloadService;
pub use error::{INVALID_LINK_MESSAGE, LifecycleError, LifecycleResult};
pub use reconcile::ReconciliationSweep;
pub use record_store::{MemoryRecordStore, RecordStore, RecordStoreError};
pub use retry::RetryPolicy;
pub use s3_storage::S3BlobStorage;
pub use storage::{BlobStorage, DeleteOutcome, MemoryBlobStorage, StorageError};
pub use types::*;
