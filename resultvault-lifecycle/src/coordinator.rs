//! Replace-result state machine.
//!
//! ```text
//! Encrypting -> CleaningOldArtifact -> Uploading -> UpdatingRecord -> Verifying -> Done
//!     |                                    |              |                |
//!     v                                    v              v                v
//! EncryptionFailed                     Storage-     RecordUpdate-   ConsistencyCheck-
//!                                      Unavailable  Failed          Failed
//!                                                   (rollback)
//! ```
//!
//! Encryption is pure and runs first, so an encryption failure happens
//! before any storage mutation. The pointer write is the commit point.
//! Before it, a failure leaves the order's pointer untouched.
//!
//! Every upload is preceded by a [`PendingUpload`] marker in the record
//! store. A rollback clears it. A committed upload keeps its marker, because
//! a concurrent replace may overwrite the pointer after this one verified;
//! [`ReconciliationSweep`](crate::reconcile::ReconciliationSweep) later keeps
//! whichever upload the pointer still names and deletes the rest. The next
//! replace clears the marker of the artifact it cleans up.
//!
//! Once the upload begins, the rest of the operation runs on a spawned task,
//! so dropping the caller's future cannot strand an uploaded object halfway.

use crate::config::LifecycleConfig;
use crate::error::{LifecycleError, LifecycleResult};
use crate::paths::ObjectPathBuilder;
use crate::record_store::RecordStore;
use crate::retry::RetryPolicy;
use crate::storage::{BlobStorage, DeleteOutcome};
use crate::types::{PendingUpload, ReplaceOutcome, ReplaceStage, ResultPointer, ResultStatus};
use chrono::Utc;
use resultvault_crypto::{AeadCipher, EncryptionMetadata, PasswordDeriver};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Content type of stored encrypted objects.
pub const ENCRYPTED_CONTENT_TYPE: &str = "application/octet-stream";

/// Replaces an order's result document.
#[derive(Clone)]
pub struct DocumentLifecycleCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    storage: Arc<dyn BlobStorage>,
    records: Arc<dyn RecordStore>,
    cipher: Option<AeadCipher>,
    passwords: PasswordDeriver,
    retry: RetryPolicy,
    paths: ObjectPathBuilder,
    content_type: String,
}

/// Output of the encrypting stage.
struct PreparedUpload {
    body: Vec<u8>,
    metadata: Option<EncryptionMetadata>,
    content_type: String,
}

impl DocumentLifecycleCoordinator {
    pub fn new(
        config: &LifecycleConfig,
        storage: Arc<dyn BlobStorage>,
        records: Arc<dyn RecordStore>,
    ) -> LifecycleResult<Self> {
        let secrets = config.master_secrets()?;
        let cipher = if config.encryption_enabled {
            Some(AeadCipher::from_secrets(&secrets)?)
        } else {
            warn!("result encryption is disabled; documents will be stored as plaintext");
            None
        };

        Ok(Self {
            inner: Arc::new(Inner {
                storage,
                records,
                cipher,
                passwords: PasswordDeriver::from_secrets(&secrets)?,
                retry: config.retry_policy(),
                paths: ObjectPathBuilder::new(&config.storage_prefix),
                content_type: config.content_type.clone(),
            }),
        })
    }

    pub fn encryption_enabled(&self) -> bool {
        self.inner.cipher.is_some()
    }

    /// The download password for `order_id`.
    pub fn password_for(&self, order_id: &str) -> String {
        self.inner.passwords.derive(order_id)
    }

    pub async fn current_result(&self, order_id: &str) -> LifecycleResult<Option<ResultPointer>> {
        self.inner
            .records
            .read_result_pointer(order_id)
            .await
            .map_err(|e| LifecycleError::RecordUnavailable(e.to_string()))
    }

    /// Stores `document` as the order's current result, replacing any
    /// previous one.
    ///
    /// On success the order's pointer names a freshly uploaded object and the
    /// password it carries is the one derived for `order_id`. Failures before
    /// the pointer write leave the pointer as it was.
    pub async fn replace_result(
        &self,
        order_id: &str,
        document: &[u8],
    ) -> LifecycleResult<ReplaceOutcome> {
        if order_id.trim().is_empty() {
            return Err(LifecycleError::InvalidInput("order id is empty".into()));
        }
        info!(order_id, bytes = document.len(), "replacing result document");

        stage(order_id, ReplaceStage::Encrypting);
        let prepared = self.inner.prepare(order_id, document)?;

        stage(order_id, ReplaceStage::CleaningOldArtifact);
        let replaced_path = self.inner.clean_previous(order_id).await;

        let inner = Arc::clone(&self.inner);
        let order = order_id.to_string();
        let task = tokio::spawn(async move { inner.commit(order, prepared).await });

        let mut outcome = task
            .await
            .map_err(|e| LifecycleError::TaskFailed(e.to_string()))??;
        outcome.replaced_path = replaced_path;
        Ok(outcome)
    }
}

impl Inner {
    /// Best-effort delete of the current artifact. Never fails the operation.
    async fn clean_previous(&self, order_id: &str) -> Option<String> {
        let current = match self.records.read_result_pointer(order_id).await {
            Ok(current) => current,
            Err(e) => {
                warn!(order_id, error = %e, "could not read current result; skipping cleanup");
                return None;
            }
        };
        let previous = current?.path;

        match self.storage.delete(&previous).await {
            Ok(outcome) => {
                if outcome == DeleteOutcome::NotFound {
                    debug!(order_id, path = %previous, "previous result object already gone");
                } else {
                    debug!(order_id, path = %previous, "deleted previous result object");
                }
                self.clear_pending(order_id, &previous).await;
            }
            Err(e) => {
                warn!(
                    order_id,
                    path = %previous,
                    error = %e,
                    "failed to delete previous result object, continuing"
                );
            }
        }
        Some(previous)
    }

    fn prepare(&self, order_id: &str, document: &[u8]) -> LifecycleResult<PreparedUpload> {
        match &self.cipher {
            Some(cipher) => {
                let blob = cipher.encrypt(document, order_id)?;
                Ok(PreparedUpload {
                    body: blob.to_bytes()?,
                    metadata: Some(blob.metadata()),
                    content_type: ENCRYPTED_CONTENT_TYPE.to_string(),
                })
            }
            None => Ok(PreparedUpload {
                body: document.to_vec(),
                metadata: None,
                content_type: self.content_type.clone(),
            }),
        }
    }

    async fn commit(
        &self,
        order_id: String,
        prepared: PreparedUpload,
    ) -> LifecycleResult<ReplaceOutcome> {
        let order_id = order_id.as_str();
        let encrypted = prepared.metadata.is_some();
        let started_at_ms = Utc::now().timestamp_millis();
        let path = self.paths.build(order_id, encrypted, started_at_ms)?;

        stage(order_id, ReplaceStage::Uploading);
        let pending = PendingUpload {
            path: path.clone(),
            started_at_ms,
        };
        if let Err(e) = self.records.add_pending_upload(order_id, &pending).await {
            warn!(order_id, path = %path, error = %e, "failed to record pending upload");
        }

        let storage = self.storage.as_ref();
        let body = &prepared.body;
        let object_path = path.as_str();
        let content_type = prepared.content_type.as_str();
        let (_, attempts) = self
            .retry
            .run("result upload", move |attempt| {
                let bytes = body.clone();
                async move {
                    debug!(attempt, path = object_path, "uploading result object");
                    storage.put(object_path, bytes, content_type).await
                }
            })
            .await
            .map_err(|e| {
                error!(
                    order_id,
                    path = %path,
                    attempts = e.attempts,
                    error = %e.last_error,
                    "result upload failed"
                );
                LifecycleError::StorageUnavailable {
                    attempts: e.attempts,
                    message: e.last_error.to_string(),
                }
            })?;

        stage(order_id, ReplaceStage::UpdatingRecord);
        let password = self.passwords.derive(order_id);
        let pointer = ResultPointer {
            path: path.clone(),
            password: password.clone(),
            status: ResultStatus::Completed,
            encryption_metadata: prepared.metadata,
            uploaded_at: Utc::now(),
        };
        if let Err(e) = self.records.write_result_pointer(order_id, &pointer).await {
            error!(
                order_id,
                path = %path,
                error = %e,
                "result record update failed, rolling back upload"
            );
            let rollback_error = self.rollback(order_id, &path).await;
            return Err(LifecycleError::RecordUpdateFailed {
                message: e.to_string(),
                rollback_error,
            });
        }

        stage(order_id, ReplaceStage::Verifying);
        match self.records.read_result_pointer(order_id).await {
            Ok(Some(current)) if current.path == path && current.password == password => {}
            Ok(found) => {
                let found_path = found.map(|p| p.path);
                warn!(
                    order_id,
                    path = %path,
                    found = ?found_path,
                    "result record changed concurrently"
                );
                if found_path.as_deref() != Some(path.as_str()) {
                    self.rollback(order_id, &path).await;
                }
                return Err(LifecycleError::ConsistencyCheckFailed {
                    order_id: order_id.to_string(),
                    expected_path: path,
                    found_path,
                });
            }
            Err(e) => {
                warn!(order_id, path = %path, error = %e, "could not read back result record");
                return Err(LifecycleError::ConsistencyCheckFailed {
                    order_id: order_id.to_string(),
                    expected_path: path,
                    found_path: None,
                });
            }
        }

        stage(order_id, ReplaceStage::Done);
        info!(order_id, path = %path, attempts, encrypted, "result document replaced");

        Ok(ReplaceOutcome {
            order_id: order_id.to_string(),
            path,
            encrypted,
            password,
            replaced_path: None,
            upload_attempts: attempts,
        })
    }

    /// Deletes an uploaded object that no pointer references. Returns the
    /// delete error, if any; the pending marker is kept in that case.
    async fn rollback(&self, order_id: &str, path: &str) -> Option<String> {
        match self.storage.delete(path).await {
            Ok(outcome) => {
                debug!(order_id, path = %path, ?outcome, "rolled back result upload");
                self.clear_pending(order_id, path).await;
                None
            }
            Err(e) => {
                warn!(
                    order_id,
                    path = %path,
                    error = %e,
                    "rollback failed, object left for reconciliation"
                );
                Some(e.to_string())
            }
        }
    }

    async fn clear_pending(&self, order_id: &str, path: &str) {
        if let Err(e) = self.records.remove_pending_upload(order_id, path).await {
            warn!(order_id, path = %path, error = %e, "failed to clear pending upload marker");
        }
    }
}

fn stage(order_id: &str, stage: ReplaceStage) {
    debug!(order_id, %stage, "replace stage");
}
