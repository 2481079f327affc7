//! Object storage seam.
//!
//! `BlobStorage` is what the coordinator uploads to and deletes from.
//! `MemoryBlobStorage` is the in-process backend used by tests and local
//! runs; it can be told to fail so retry and rollback paths are reachable.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors from an object storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// What a delete found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Writes `bytes` at `path`, replacing any existing object.
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()>;

    /// Reads the object at `path`; `None` if absent.
    async fn get(&self, path: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Deletes the object at `path`. A missing object is not an error.
    async fn delete(&self, path: &str) -> StorageResult<DeleteOutcome>;
}

#[derive(Clone, Debug)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

/// In-memory object store.
#[derive(Default)]
pub struct MemoryBlobStorage {
    objects: RwLock<HashMap<String, StoredObject>>,
    fail_puts: AtomicU32,
    fail_deletes: AtomicBool,
    fail_gets: AtomicBool,
    put_attempts: AtomicU32,
    delete_log: RwLock<Vec<String>>,
}

impl MemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` puts fail with a backend error.
    pub fn fail_next_puts(&self, n: u32) {
        self.fail_puts.store(n, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    /// Every put call seen, including failed ones.
    pub fn put_attempts(&self) -> u32 {
        self.put_attempts.load(Ordering::SeqCst)
    }

    /// Paths passed to `delete`, in call order, including failed calls.
    pub async fn delete_attempts(&self) -> Vec<String> {
        self.delete_log.read().await.clone()
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.objects.read().await.contains_key(path)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.objects.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub async fn content_type(&self, path: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(path)
            .map(|o| o.content_type.clone())
    }

    /// Reads an object directly, bypassing failure injection.
    pub async fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(path).map(|o| o.bytes.clone())
    }

    /// Removes an object directly, bypassing failure injection and the
    /// delete log.
    pub async fn remove(&self, path: &str) -> bool {
        self.objects.write().await.remove(path).is_some()
    }

    /// Stores an object directly, bypassing failure injection.
    pub async fn insert(&self, path: &str, bytes: Vec<u8>, content_type: &str) {
        self.objects.write().await.insert(
            path.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()> {
        self.put_attempts.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .fail_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StorageError::Backend(format!("injected put failure for {path}")));
        }
        self.insert(path, bytes, content_type).await;
        Ok(())
    }

    async fn get(&self, path: &str) -> StorageResult<Option<Vec<u8>>> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("injected get failure for {path}")));
        }
        Ok(self.objects.read().await.get(path).map(|o| o.bytes.clone()))
    }

    async fn delete(&self, path: &str) -> StorageResult<DeleteOutcome> {
        self.delete_log.write().await.push(path.to_string());
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("injected delete failure for {path}")));
        }
        match self.objects.write().await.remove(path) {
            Some(_) => Ok(DeleteOutcome::Deleted),
            None => Ok(DeleteOutcome::NotFound),
        }
    }
}
