//! Object path generation.
//!
//! Paths look like `{prefix}/{order}/{millis}-{random}.{ext}`. Millis are
//! strictly increasing per builder and the random part is a v4 UUID, so two
//! uploads never share a path.

use crate::error::{LifecycleError, LifecycleResult};
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

pub struct ObjectPathBuilder {
    prefix: String,
    last_ms: AtomicI64,
}

impl ObjectPathBuilder {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_matches('/').to_string(),
            last_ms: AtomicI64::new(0),
        }
    }

    pub fn build(&self, order_id: &str, encrypted: bool, now_ms: i64) -> LifecycleResult<String> {
        let segment = sanitize_segment(order_id)?;
        let millis = self.next_millis(now_ms);
        let ext = if encrypted { "enc" } else { "bin" };
        Ok(format!(
            "{}/{segment}/{millis}-{}.{ext}",
            self.prefix,
            Uuid::new_v4().simple()
        ))
    }

    fn next_millis(&self, now_ms: i64) -> i64 {
        let prev = self
            .last_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now_ms.max(last + 1))
            })
            .unwrap_or(now_ms);
        now_ms.max(prev + 1)
    }
}

/// Order ids become a single path segment: anything outside
/// `[A-Za-z0-9_-]` is replaced with `_`.
fn sanitize_segment(order_id: &str) -> LifecycleResult<String> {
    if order_id.trim().is_empty() {
        return Err(LifecycleError::InvalidInput("order id is empty".into()));
    }
    let segment: String = order_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    Ok(segment)
}
