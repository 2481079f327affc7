//! Cryptographic primitives for the result-document lifecycle.
//!
//! Provides:
//! - PBKDF2-HMAC-SHA256 derivation of per-document keys
//! - AES-256-GCM authenticated encryption with 16-byte IVs
//! - HMAC-signed, time-bounded access tokens
//! - Deterministic, human-typable download passwords
//!
//! # Architecture
//!
//! Three independent master secrets drive everything, one per purpose:
//!
//! 1. **Encryption key**: never used directly. Every encrypt/decrypt call
//!    re-derives a document key from it, salted with the document id, so only
//!    the document id has to travel with the ciphertext.
//!
//! 2. **Token secret**: signs access tokens. Tokens are stateless and verified
//!    from their own bytes.
//!
//! 3. **Password secret**: keys the HMAC that yields download passwords. The
//!    same order id always maps to the same password, with no stored state.
//!
//! Secrets are never shared between the token and password protocols.

mod cipher;
mod error;
mod key;
mod password;
mod secrets;
mod token;

pub use cipher::{
    ALGORITHM, AeadCipher, EncryptedBlob, EncryptionMetadata, IV_SIZE, TAG_SIZE,
};
pub use error::{CryptoError, CryptoResult};
pub use key::{DocumentKey, KDF_ITERATIONS, KEY_SIZE, derive_document_key};
pub use password::{PASSWORD_ALPHABET, PASSWORD_SYMBOLS, PasswordDeriver, normalize_candidate};
pub use secrets::MasterSecrets;
pub use token::{
    AccessTokenService, DEFAULT_ADMIN_TTL_SECS, DEFAULT_CUSTOMER_TTL_SECS, TokenClaims,
    TokenPayload, TokenProfile, TokenTtls,
};
