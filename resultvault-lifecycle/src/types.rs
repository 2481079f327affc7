//! Shared types for the result-document lifecycle.

use chrono::{DateTime, Utc};
use resultvault_crypto::EncryptionMetadata;
use serde::{Deserialize, Serialize};

/// Status of an order's result pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Pending,
    Completed,
}

/// The order's single record of truth for its current result artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPointer {
    pub path: String,
    /// Cached copy of the derived download password, for display.
    pub password: String,
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_metadata: Option<EncryptionMetadata>,
    pub uploaded_at: DateTime<Utc>,
}

/// Write-ahead marker for an upload whose record update has not completed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpload {
    pub path: String,
    pub started_at_ms: i64,
}

/// Stages of the replace operation, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplaceStage {
    Encrypting,
    CleaningOldArtifact,
    Uploading,
    UpdatingRecord,
    Verifying,
    Done,
}

impl std::fmt::Display for ReplaceStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReplaceStage::CleaningOldArtifact => "cleaning_old_artifact",
            ReplaceStage::Encrypting => "encrypting",
            ReplaceStage::Uploading => "uploading",
            ReplaceStage::UpdatingRecord => "updating_record",
            ReplaceStage::Verifying => "verifying",
            ReplaceStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Result of a successful replace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub order_id: String,
    pub path: String,
    pub encrypted: bool,
    pub password: String,
    /// The artifact that was current before this call, if any.
    pub replaced_path: Option<String>,
    pub upload_attempts: u32,
}

/// A decrypted result served to a download request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadedResult {
    pub order_id: String,
    pub bytes: Vec<u8>,
    pub was_encrypted: bool,
    pub admin_access: bool,
}

/// Counts from one reconciliation sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub deleted: usize,
    pub kept_referenced: usize,
    pub failed: usize,
}
