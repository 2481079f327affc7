mod support;

use chrono::Utc;
use pretty_assertions::assert_eq;
use resultvault_lifecycle::SweepReport;
use support::{Harness, REPORT};

const ORDER: &str = "ORD-42";

/// Past the 60s timeout used by `test_config`.
fn after_timeout() -> i64 {
    Utc::now().timestamp_millis() + 61_000
}

/// Leaves one orphaned upload behind: record write and rollback both fail.
async fn orphaned_upload(h: &Harness) {
    h.records.fail_next_writes(1);
    h.storage.set_fail_deletes(true);
    assert!(h.coordinator.replace_result(ORDER, REPORT).await.is_err());
    h.storage.set_fail_deletes(false);
    assert_eq!(h.storage.len().await, 1);
}

#[tokio::test]
async fn stale_orphan_is_deleted() {
    let h = Harness::encrypted();
    orphaned_upload(&h).await;

    let report = h.sweep.run_at(after_timeout()).await.unwrap();
    assert_eq!(
        report,
        SweepReport {
            examined: 1,
            deleted: 1,
            kept_referenced: 0,
            failed: 0,
        }
    );
    assert!(h.storage.is_empty().await);
    assert!(h.records.pending_uploads(ORDER).await.is_empty());
}

#[tokio::test]
async fn fresh_markers_are_left_alone() {
    let h = Harness::encrypted();
    orphaned_upload(&h).await;

    let report = h.sweep.run_once().await.unwrap();
    assert_eq!(report, SweepReport::default());
    assert_eq!(h.storage.len().await, 1);
    assert_eq!(h.records.pending_uploads(ORDER).await.len(), 1);
}

#[tokio::test]
async fn referenced_object_is_kept() {
    let h = Harness::encrypted();
    let outcome = h.coordinator.replace_result(ORDER, REPORT).await.unwrap();
    assert_eq!(h.records.pending_uploads(ORDER).await.len(), 1);

    let report = h.sweep.run_at(after_timeout()).await.unwrap();
    assert_eq!(report.kept_referenced, 1);
    assert_eq!(report.deleted, 0);
    assert!(h.storage.contains(&outcome.path).await);
    assert!(h.records.pending_uploads(ORDER).await.is_empty());
}

#[tokio::test]
async fn delete_failure_keeps_marker_for_next_sweep() {
    let h = Harness::encrypted();
    orphaned_upload(&h).await;
    h.storage.set_fail_deletes(true);

    let report = h.sweep.run_at(after_timeout()).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(h.records.pending_uploads(ORDER).await.len(), 1);

    h.storage.set_fail_deletes(false);
    let report = h.sweep.run_at(after_timeout()).await.unwrap();
    assert_eq!(report.deleted, 1);
    assert!(h.storage.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn marker_from_failed_upload_is_cleared() {
    let h = Harness::encrypted();
    h.storage.fail_next_puts(3);
    assert!(h.coordinator.replace_result(ORDER, REPORT).await.is_err());
    assert_eq!(h.records.pending_uploads(ORDER).await.len(), 1);

    let report = h.sweep.run_at(after_timeout()).await.unwrap();
    assert_eq!(report.deleted, 1);
    assert!(h.records.pending_uploads(ORDER).await.is_empty());
}

#[tokio::test]
async fn unreadable_record_counts_as_failure() {
    let h = Harness::encrypted();
    orphaned_upload(&h).await;
    h.records.fail_next_reads(1);

    let report = h.sweep.run_at(after_timeout()).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(h.storage.len().await, 1);
}
