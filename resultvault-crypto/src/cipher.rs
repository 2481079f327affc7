//! AES-256-GCM encryption of result documents.
//!
//! Wire format (JSON, camelCase):
//! `{"iv": base64(16 bytes), "data": base64(ciphertext), "authTag": base64(16 bytes)}`
//!
//! The tag is kept detached from the ciphertext so the record store can hold
//! the iv/tag pair as metadata next to the object path.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{KDF_ITERATIONS, derive_document_key};
use crate::secrets::MasterSecrets;
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce, Tag};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// IV size in bytes.
pub const IV_SIZE: usize = 16;

/// GCM authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Algorithm label recorded in encryption metadata.
pub const ALGORITHM: &str = "aes-256-gcm";

/// AES-256-GCM with a 128-bit nonce.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// An encrypted document: IV, ciphertext and detached auth tag, all base64.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedBlob {
    pub iv: String,
    pub data: String,
    pub auth_tag: String,
}

impl EncryptedBlob {
    /// Serializes to the JSON bytes stored as the object body.
    pub fn to_bytes(&self) -> CryptoResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses a stored object body. Malformed input fails closed.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        serde_json::from_slice(bytes).map_err(|_| CryptoError::AuthenticationFailed)
    }

    /// Encodes as a single base64 string for co-location with text fields.
    pub fn to_base64(&self) -> CryptoResult<String> {
        Ok(STANDARD.encode(self.to_bytes()?))
    }

    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|_| CryptoError::AuthenticationFailed)?;
        Self::from_bytes(&bytes)
    }

    /// Metadata recorded alongside the stored object.
    pub fn metadata(&self) -> EncryptionMetadata {
        EncryptionMetadata {
            algorithm: ALGORITHM.to_string(),
            iv: self.iv.clone(),
            auth_tag: self.auth_tag.clone(),
            kdf_iterations: KDF_ITERATIONS,
        }
    }
}

/// Encryption metadata kept in the order's result pointer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionMetadata {
    pub algorithm: String,
    pub iv: String,
    pub auth_tag: String,
    pub kdf_iterations: u32,
}

impl EncryptionMetadata {
    /// Returns true if `blob` is the object this metadata was recorded for.
    pub fn matches(&self, blob: &EncryptedBlob) -> bool {
        self.algorithm == ALGORITHM && self.iv == blob.iv && self.auth_tag == blob.auth_tag
    }
}

/// Authenticated encryption keyed per document.
///
/// Holds only the master secret; the document key is re-derived on every call.
pub struct AeadCipher {
    master_secret: Zeroizing<Vec<u8>>,
}

impl AeadCipher {
    pub fn new(master_secret: &[u8]) -> CryptoResult<Self> {
        if master_secret.is_empty() {
            return Err(CryptoError::Configuration(
                "encryption master secret is empty".to_string(),
            ));
        }
        Ok(Self {
            master_secret: Zeroizing::new(master_secret.to_vec()),
        })
    }

    /// Builds a cipher from the encryption secret of `secrets`.
    pub fn from_secrets(secrets: &MasterSecrets) -> CryptoResult<Self> {
        let key = secrets.encryption_key().ok_or_else(|| {
            CryptoError::Configuration("encryptionKey is not configured".to_string())
        })?;
        Self::new(key)
    }

    /// Encrypts `plaintext` for `document_id` under a fresh random IV.
    pub fn encrypt(&self, plaintext: &[u8], document_id: &str) -> CryptoResult<EncryptedBlob> {
        let key = derive_document_key(&self.master_secret, document_id)?;
        let cipher = Aes256Gcm16::new_from_slice(key.as_bytes())
            .map_err(|e| CryptoError::Encryption(format!("cipher init failed: {e}")))?;

        let mut iv = [0u8; IV_SIZE];
        rand::rng().fill_bytes(&mut iv);

        let mut buffer = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(Nonce::<U16>::from_slice(&iv), b"", &mut buffer)
            .map_err(|e| CryptoError::Encryption(format!("AES-GCM seal failed: {e}")))?;

        Ok(EncryptedBlob {
            iv: STANDARD.encode(iv),
            data: STANDARD.encode(&buffer),
            auth_tag: STANDARD.encode(tag),
        })
    }

    /// Decrypts a blob produced by [`encrypt`](Self::encrypt) for the same document.
    ///
    /// Any decoding problem, length mismatch or tag mismatch yields
    /// `AuthenticationFailed`; no plaintext is ever returned in that case.
    pub fn decrypt(&self, blob: &EncryptedBlob, document_id: &str) -> CryptoResult<Vec<u8>> {
        let iv = decode_exact(&blob.iv, IV_SIZE)?;
        let tag = decode_exact(&blob.auth_tag, TAG_SIZE)?;
        let mut buffer = STANDARD
            .decode(&blob.data)
            .map_err(|_| CryptoError::AuthenticationFailed)?;

        let key = derive_document_key(&self.master_secret, document_id)?;
        let cipher = Aes256Gcm16::new_from_slice(key.as_bytes())
            .map_err(|e| CryptoError::Encryption(format!("cipher init failed: {e}")))?;

        cipher
            .decrypt_in_place_detached(
                Nonce::<U16>::from_slice(&iv),
                b"",
                &mut buffer,
                Tag::<U16>::from_slice(&tag),
            )
            .map_err(|_| CryptoError::AuthenticationFailed)?;

        Ok(buffer)
    }
}

fn decode_exact(encoded: &str, len: usize) -> CryptoResult<Vec<u8>> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| CryptoError::AuthenticationFailed)?;
    if bytes.len() != len {
        return Err(CryptoError::AuthenticationFailed);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_world_roundtrip() {
        let cipher = AeadCipher::new(b"k1").unwrap();
        let blob = cipher.encrypt(b"hello world", "ORD-42").unwrap();
        let plaintext = cipher.decrypt(&blob, "ORD-42").unwrap();
        assert_eq!(plaintext, b"hello world");
    }

    #[test]
    fn iv_and_tag_have_fixed_sizes() {
        let cipher = AeadCipher::new(b"k1").unwrap();
        let blob = cipher.encrypt(b"payload", "ORD-1").unwrap();
        assert_eq!(STANDARD.decode(&blob.iv).unwrap().len(), IV_SIZE);
        assert_eq!(STANDARD.decode(&blob.auth_tag).unwrap().len(), TAG_SIZE);
        assert_eq!(STANDARD.decode(&blob.data).unwrap().len(), b"payload".len());
    }

    #[test]
    fn fresh_iv_per_call() {
        let cipher = AeadCipher::new(b"k1").unwrap();
        let a = cipher.encrypt(b"same", "ORD-1").unwrap();
        let b = cipher.encrypt(b"same", "ORD-1").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn wire_format_uses_camel_case() {
        let cipher = AeadCipher::new(b"k1").unwrap();
        let blob = cipher.encrypt(b"x", "ORD-1").unwrap();
        let json: serde_json::Value = serde_json::from_slice(&blob.to_bytes().unwrap()).unwrap();
        assert!(json.get("iv").is_some());
        assert!(json.get("data").is_some());
        assert!(json.get("authTag").is_some());
    }

    #[test]
    fn metadata_matches_its_blob_only() {
        let cipher = AeadCipher::new(b"k1").unwrap();
        let a = cipher.encrypt(b"x", "ORD-1").unwrap();
        let b = cipher.encrypt(b"x", "ORD-1").unwrap();
        let meta = a.metadata();
        assert!(meta.matches(&a));
        assert!(!meta.matches(&b));
        assert_eq!(meta.kdf_iterations, KDF_ITERATIONS);
    }

    #[test]
    fn from_secrets_requires_encryption_key() {
        let secrets = MasterSecrets::new(None, "t1", "s1").unwrap();
        assert!(matches!(
            AeadCipher::from_secrets(&secrets),
            Err(CryptoError::Configuration(_))
        ));
    }
}
