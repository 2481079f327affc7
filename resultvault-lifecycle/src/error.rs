//! Lifecycle error types.

use resultvault_crypto::CryptoError;
use thiserror::Error;

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Message shown for any rejected download, whatever the cause.
pub const INVALID_LINK_MESSAGE: &str = "This link or password is invalid or has expired.";

const UNAVAILABLE_MESSAGE: &str = "The result could not be retrieved. Please try again later.";

/// Errors that can occur while replacing or serving a result document.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("authentication failed (wrong key or tampered data)")]
    AuthenticationFailed,

    /// Token malformed, forged or expired, or password wrong. Deliberately
    /// carries no detail.
    #[error("invalid or expired link or password")]
    InvalidLink,

    #[error("storage unavailable after {attempts} attempt(s): {message}")]
    StorageUnavailable { attempts: u32, message: String },

    /// The record write failed after the object was uploaded. `rollback_error`
    /// is set when deleting the orphaned object also failed.
    #[error("result record update failed: {message}")]
    RecordUpdateFailed {
        message: String,
        rollback_error: Option<String>,
    },

    #[error("record store unavailable: {0}")]
    RecordUnavailable(String),

    /// The record read back after the write is not the one this call wrote.
    /// Data is persisted; the caller should retry the whole operation.
    #[error(
        "consistency check failed for order {order_id}: expected {expected_path}, found {}",
        found_path.as_deref().unwrap_or("nothing")
    )]
    ConsistencyCheckFailed {
        order_id: String,
        expected_path: String,
        found_path: Option<String>,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("background task failed: {0}")]
    TaskFailed(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LifecycleError {
    /// True when retrying the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LifecycleError::StorageUnavailable { .. }
                | LifecycleError::ConsistencyCheckFailed { .. }
        )
    }

    /// Text safe to show to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            LifecycleError::InvalidLink => INVALID_LINK_MESSAGE,
            _ => UNAVAILABLE_MESSAGE,
        }
    }
}

impl From<CryptoError> for LifecycleError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Configuration(msg) => LifecycleError::Configuration(msg),
            CryptoError::Encryption(msg) => LifecycleError::EncryptionFailed(msg),
            CryptoError::AuthenticationFailed => LifecycleError::AuthenticationFailed,
            CryptoError::InvalidToken => LifecycleError::InvalidLink,
            CryptoError::InvalidInput(msg) => LifecycleError::InvalidInput(msg),
            CryptoError::Serialization(e) => LifecycleError::Serialization(e),
        }
    }
}
