//! Per-document key derivation.

use crate::error::{CryptoError, CryptoResult};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a derived document key in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// PBKDF2 iteration count. Changing this makes every stored blob unreadable.
pub const KDF_ITERATIONS: u32 = 10_000;

/// A 256-bit key derived for a single document. Never persisted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DocumentKey([u8; KEY_SIZE]);

impl DocumentKey {
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DocumentKey([REDACTED])")
    }
}

/// Derives the key for `document_id` from the encryption master secret.
///
/// PBKDF2-HMAC-SHA256 with the document id as salt. Identical inputs always
/// yield the identical key.
pub fn derive_document_key(master_secret: &[u8], document_id: &str) -> CryptoResult<DocumentKey> {
    if master_secret.is_empty() {
        return Err(CryptoError::Configuration(
            "encryption master secret is empty".to_string(),
        ));
    }
    if document_id.is_empty() {
        return Err(CryptoError::InvalidInput(
            "document id must not be empty".to_string(),
        ));
    }

    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(master_secret, document_id.as_bytes(), KDF_ITERATIONS, &mut key);
    Ok(DocumentKey(key))
}
