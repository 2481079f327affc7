//! Orphan cleanup.
//!
//! Walks pending-upload markers older than the configured timeout. Objects
//! still named by their order's pointer are kept; everything else is deleted
//! and its marker cleared.

use crate::config::LifecycleConfig;
use crate::error::{LifecycleError, LifecycleResult};
use crate::record_store::RecordStore;
use crate::storage::BlobStorage;
use crate::types::SweepReport;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct ReconciliationSweep {
    storage: Arc<dyn BlobStorage>,
    records: Arc<dyn RecordStore>,
    timeout: Duration,
}

impl ReconciliationSweep {
    pub fn new(
        config: &LifecycleConfig,
        storage: Arc<dyn BlobStorage>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            storage,
            records,
            timeout: config.pending_upload_timeout(),
        }
    }

    pub async fn run_once(&self) -> LifecycleResult<SweepReport> {
        self.run_at(Utc::now().timestamp_millis()).await
    }

    pub async fn run_at(&self, now_ms: i64) -> LifecycleResult<SweepReport> {
        let timeout_ms = i64::try_from(self.timeout.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now_ms.saturating_sub(timeout_ms);
        let stale = self
            .records
            .list_pending_uploads(cutoff)
            .await
            .map_err(|e| LifecycleError::RecordUnavailable(e.to_string()))?;

        let mut report = SweepReport::default();
        for (order_id, pending) in stale {
            report.examined += 1;
            let path = pending.path.as_str();

            let current = match self.records.read_result_pointer(&order_id).await {
                Ok(current) => current,
                Err(e) => {
                    warn!(
                        order_id = %order_id,
                        path,
                        error = %e,
                        "sweep could not read result pointer"
                    );
                    report.failed += 1;
                    continue;
                }
            };

            if current.is_some_and(|p| p.path == path) {
                debug!(order_id = %order_id, path, "pending upload is the current result, keeping");
                report.kept_referenced += 1;
            } else {
                match self.storage.delete(path).await {
                    Ok(outcome) => {
                        debug!(order_id = %order_id, path, ?outcome, "deleted orphaned upload");
                        report.deleted += 1;
                    }
                    Err(e) => {
                        warn!(
                            order_id = %order_id,
                            path,
                            error = %e,
                            "failed to delete orphaned upload"
                        );
                        report.failed += 1;
                        continue;
                    }
                }
            }

            if let Err(e) = self.records.remove_pending_upload(&order_id, path).await {
                warn!(
                    order_id = %order_id,
                    path,
                    error = %e,
                    "failed to clear pending upload marker"
                );
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                deleted = report.deleted,
                kept = report.kept_referenced,
                failed = report.failed,
                "reconciliation sweep finished"
            );
        }
        Ok(report)
    }
}
