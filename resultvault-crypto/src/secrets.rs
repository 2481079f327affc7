//! Process-wide master secrets.

use crate::error::{CryptoError, CryptoResult};
use zeroize::Zeroizing;

/// The three independent master secrets, loaded once at startup.
///
/// Immutable after construction. Each component receives the one secret it
/// needs; no secret serves two purposes.
#[derive(Clone)]
pub struct MasterSecrets {
    encryption_key: Option<Zeroizing<Vec<u8>>>,
    token_secret: Zeroizing<Vec<u8>>,
    password_secret: Zeroizing<Vec<u8>>,
}

impl MasterSecrets {
    /// Builds the secret set, rejecting empty or reused secrets.
    ///
    /// `encryption_key` may be `None` when result encryption is disabled.
    pub fn new(
        encryption_key: Option<&str>,
        token_secret: &str,
        password_secret: &str,
    ) -> CryptoResult<Self> {
        if token_secret.is_empty() {
            return Err(CryptoError::Configuration("tokenSecret is empty".to_string()));
        }
        if password_secret.is_empty() {
            return Err(CryptoError::Configuration(
                "passwordSecret is empty".to_string(),
            ));
        }
        if token_secret == password_secret {
            return Err(CryptoError::Configuration(
                "tokenSecret and passwordSecret must differ".to_string(),
            ));
        }

        let encryption_key = match encryption_key {
            Some("") => {
                return Err(CryptoError::Configuration(
                    "encryptionKey is empty".to_string(),
                ));
            }
            Some(k) => Some(Zeroizing::new(k.as_bytes().to_vec())),
            None => None,
        };

        Ok(Self {
            encryption_key,
            token_secret: Zeroizing::new(token_secret.as_bytes().to_vec()),
            password_secret: Zeroizing::new(password_secret.as_bytes().to_vec()),
        })
    }

    /// Returns the encryption master secret, if configured.
    pub fn encryption_key(&self) -> Option<&[u8]> {
        self.encryption_key.as_ref().map(|k| k.as_slice())
    }

    pub fn token_secret(&self) -> &[u8] {
        &self.token_secret
    }

    pub fn password_secret(&self) -> &[u8] {
        &self.password_secret
    }
}

impl std::fmt::Debug for MasterSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterSecrets")
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "[REDACTED]"))
            .field("token_secret", &"[REDACTED]")
            .field("password_secret", &"[REDACTED]")
            .finish()
    }
}
