//! Deterministic download passwords.
//!
//! `derive(order_id)` is a pure function of the order id and the password
//! secret. The password emailed to a customer and the one accepted at
//! download time are the same value forever, without any stored state.

use crate::error::{CryptoError, CryptoResult};
use crate::secrets::MasterSecrets;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Symbols used in passwords. `0`, `O`, `1` and `I` are excluded.
pub const PASSWORD_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of symbols in a password, excluding the separator.
pub const PASSWORD_SYMBOLS: usize = 8;

const GROUP_LEN: usize = PASSWORD_SYMBOLS / 2;

/// Derives and checks `XXXX-XXXX` download passwords.
pub struct PasswordDeriver {
    keyed: HmacSha256,
}

impl PasswordDeriver {
    /// Keys the deriver. An empty secret would make every password public.
    pub fn new(password_secret: &[u8]) -> CryptoResult<Self> {
        if password_secret.is_empty() {
            return Err(CryptoError::Configuration(
                "passwordSecret is empty".to_string(),
            ));
        }
        let keyed = HmacSha256::new_from_slice(password_secret)
            .map_err(|e| CryptoError::Configuration(format!("invalid password secret: {e}")))?;
        Ok(Self { keyed })
    }

    pub fn from_secrets(secrets: &MasterSecrets) -> CryptoResult<Self> {
        Self::new(secrets.password_secret())
    }

    /// Derives the password for `order_id`.
    pub fn derive(&self, order_id: &str) -> String {
        let mut mac = self.keyed.clone();
        mac.update(order_id.as_bytes());
        let digest = mac.finalize().into_bytes();

        let mut password = String::with_capacity(PASSWORD_SYMBOLS + 1);
        for (i, byte) in digest.iter().take(PASSWORD_SYMBOLS).enumerate() {
            if i == GROUP_LEN {
                password.push('-');
            }
            let idx = usize::from(*byte) % PASSWORD_ALPHABET.len();
            password.push(char::from(PASSWORD_ALPHABET[idx]));
        }
        password
    }

    /// Checks a user-supplied password in constant time.
    pub fn verify(&self, order_id: &str, candidate: &str) -> bool {
        let Some(normalized) = normalize_candidate(candidate) else {
            return false;
        };
        let expected = self.derive(order_id);
        expected.as_bytes().ct_eq(normalized.as_bytes()).into()
    }
}

/// Normalizes user input to the canonical `XXXX-XXXX` form.
///
/// Whitespace is dropped and letters are uppercased; the hyphen is optional.
/// Returns `None` if the result cannot be a password.
pub fn normalize_candidate(candidate: &str) -> Option<String> {
    let compact: String = candidate
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if compact.len() != PASSWORD_SYMBOLS || !compact.is_ascii() {
        return None;
    }

    let (head, tail) = compact.split_at(GROUP_LEN);
    Some(format!("{head}-{tail}"))
}
