//! Order record seam.
//!
//! Each order has at most one current [`ResultPointer`] plus any number of
//! [`PendingUpload`] markers for uploads the sweep has not yet confirmed.

use crate::types::{PendingUpload, ResultPointer};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum RecordStoreError {
    #[error("record store backend error: {0}")]
    Backend(String),
}

pub type RecordStoreResult<T> = Result<T, RecordStoreError>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn read_result_pointer(&self, order_id: &str) -> RecordStoreResult<Option<ResultPointer>>;

    /// Replaces the order's pointer. Last writer wins.
    async fn write_result_pointer(
        &self,
        order_id: &str,
        pointer: &ResultPointer,
    ) -> RecordStoreResult<()>;

    async fn add_pending_upload(
        &self,
        order_id: &str,
        pending: &PendingUpload,
    ) -> RecordStoreResult<()>;

    /// Removes the marker for `path`. Removing an absent marker succeeds.
    async fn remove_pending_upload(&self, order_id: &str, path: &str) -> RecordStoreResult<()>;

    /// Markers started strictly before `started_before_ms`, across all orders.
    async fn list_pending_uploads(
        &self,
        started_before_ms: i64,
    ) -> RecordStoreResult<Vec<(String, PendingUpload)>>;
}

#[derive(Default)]
struct OrderRecord {
    current: Option<ResultPointer>,
    pending: Vec<PendingUpload>,
}

/// In-memory record store.
#[derive(Default)]
pub struct MemoryRecordStore {
    orders: RwLock<HashMap<String, OrderRecord>>,
    fail_writes: AtomicU32,
    fail_reads: AtomicU32,
    interleaved: RwLock<HashMap<String, ResultPointer>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` pointer writes fail.
    pub fn fail_next_writes(&self, n: u32) {
        self.fail_writes.store(n, Ordering::SeqCst);
    }

    /// The next `n` pointer reads fail.
    pub fn fail_next_reads(&self, n: u32) {
        self.fail_reads.store(n, Ordering::SeqCst);
    }

    /// After the next successful pointer write for `order_id`, `pointer`
    /// replaces it, as if another writer landed immediately afterwards.
    pub async fn interleave_write(&self, order_id: &str, pointer: ResultPointer) {
        self.interleaved
            .write()
            .await
            .insert(order_id.to_string(), pointer);
    }

    pub async fn pending_uploads(&self, order_id: &str) -> Vec<PendingUpload> {
        self.orders
            .read()
            .await
            .get(order_id)
            .map(|r| r.pending.clone())
            .unwrap_or_default()
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn read_result_pointer(
        &self,
        order_id: &str,
    ) -> RecordStoreResult<Option<ResultPointer>> {
        if Self::take_failure(&self.fail_reads) {
            return Err(RecordStoreError::Backend(format!(
                "injected read failure for {order_id}"
            )));
        }
        Ok(self
            .orders
            .read()
            .await
            .get(order_id)
            .and_then(|r| r.current.clone()))
    }

    async fn write_result_pointer(
        &self,
        order_id: &str,
        pointer: &ResultPointer,
    ) -> RecordStoreResult<()> {
        if Self::take_failure(&self.fail_writes) {
            return Err(RecordStoreError::Backend(format!(
                "injected write failure for {order_id}"
            )));
        }
        let racer = self.interleaved.write().await.remove(order_id);
        let mut orders = self.orders.write().await;
        let record = orders.entry(order_id.to_string()).or_default();
        record.current = Some(racer.unwrap_or_else(|| pointer.clone()));
        Ok(())
    }

    async fn add_pending_upload(
        &self,
        order_id: &str,
        pending: &PendingUpload,
    ) -> RecordStoreResult<()> {
        let mut orders = self.orders.write().await;
        let record = orders.entry(order_id.to_string()).or_default();
        record.pending.retain(|p| p.path != pending.path);
        record.pending.push(pending.clone());
        Ok(())
    }

    async fn remove_pending_upload(&self, order_id: &str, path: &str) -> RecordStoreResult<()> {
        if let Some(record) = self.orders.write().await.get_mut(order_id) {
            record.pending.retain(|p| p.path != path);
        }
        Ok(())
    }

    async fn list_pending_uploads(
        &self,
        started_before_ms: i64,
    ) -> RecordStoreResult<Vec<(String, PendingUpload)>> {
        let orders = self.orders.read().await;
        let mut stale: Vec<(String, PendingUpload)> = orders
            .iter()
            .flat_map(|(order_id, record)| {
                record
                    .pending
                    .iter()
                    .filter(|p| p.started_at_ms < started_before_ms)
                    .map(move |p| (order_id.clone(), p.clone()))
            })
            .collect();
        stale.sort_by(|a, b| a.1.started_at_ms.cmp(&b.1.started_at_ms));
        Ok(stale)
    }
}
