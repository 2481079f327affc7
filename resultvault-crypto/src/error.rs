//! Crypto error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in the crypto layer.
///
/// Verification failures are deliberately coarse: `AuthenticationFailed` and
/// `InvalidToken` never say which check rejected the input.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("authentication failed (wrong key or tampered data)")]
    AuthenticationFailed,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
