//! Stateless signed access tokens.
//!
//! Token format: `base64(JSON{payload, signature})` where `signature` is
//! `base64(HMAC-SHA256(tokenSecret, JSON(payload)))`. Nothing is stored
//! server-side; a token is valid iff its signature checks out and it has not
//! expired.

use crate::error::{CryptoError, CryptoResult};
use crate::secrets::MasterSecrets;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Default lifetime of customer download tokens (7 days).
pub const DEFAULT_CUSTOMER_TTL_SECS: u64 = 604_800;

/// Default lifetime of admin download tokens (1 hour).
pub const DEFAULT_ADMIN_TTL_SECS: u64 = 3_600;

/// Upper bound on accepted token length; anything longer is rejected unparsed.
const MAX_TOKEN_LEN: usize = 4096;

/// The signed part of a token. Timestamps are Unix milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TokenPayload {
    pub document_id: String,
    pub timestamp: i64,
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_access: Option<bool>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SignedToken {
    payload: TokenPayload,
    signature: String,
}

/// What a verified token grants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenClaims {
    pub document_id: String,
    pub is_admin: bool,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Issuance policy. Admin tokens are short-lived and skip the password check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenProfile {
    Customer,
    Admin,
}

impl TokenProfile {
    pub fn is_admin(self) -> bool {
        matches!(self, TokenProfile::Admin)
    }
}

/// Lifetimes for the two token profiles, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenTtls {
    pub customer_secs: u64,
    pub admin_secs: u64,
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            customer_secs: DEFAULT_CUSTOMER_TTL_SECS,
            admin_secs: DEFAULT_ADMIN_TTL_SECS,
        }
    }
}

impl TokenTtls {
    pub fn for_profile(&self, profile: TokenProfile) -> u64 {
        match profile {
            TokenProfile::Customer => self.customer_secs,
            TokenProfile::Admin => self.admin_secs,
        }
    }
}

/// Issues and verifies access tokens.
pub struct AccessTokenService {
    secret: Zeroizing<Vec<u8>>,
    ttls: TokenTtls,
}

impl AccessTokenService {
    pub fn new(token_secret: &[u8], ttls: TokenTtls) -> CryptoResult<Self> {
        if token_secret.is_empty() {
            return Err(CryptoError::Configuration("tokenSecret is empty".to_string()));
        }
        Ok(Self {
            secret: Zeroizing::new(token_secret.to_vec()),
            ttls,
        })
    }

    pub fn from_secrets(secrets: &MasterSecrets, ttls: TokenTtls) -> CryptoResult<Self> {
        Self::new(secrets.token_secret(), ttls)
    }

    pub fn ttls(&self) -> TokenTtls {
        self.ttls
    }

    /// Issues a token for `document_id` valid for `ttl_secs` from now.
    pub fn issue(&self, document_id: &str, ttl_secs: u64, is_admin: bool) -> CryptoResult<String> {
        self.issue_at(document_id, ttl_secs, is_admin, Utc::now().timestamp_millis())
    }

    /// Issues a token using the lifetime and admin flag of `profile`.
    pub fn issue_for(&self, document_id: &str, profile: TokenProfile) -> CryptoResult<String> {
        self.issue(
            document_id,
            self.ttls.for_profile(profile),
            profile.is_admin(),
        )
    }

    /// Issues a token as if the current time were `now_ms`.
    pub fn issue_at(
        &self,
        document_id: &str,
        ttl_secs: u64,
        is_admin: bool,
        now_ms: i64,
    ) -> CryptoResult<String> {
        if document_id.is_empty() {
            return Err(CryptoError::InvalidInput(
                "document id must not be empty".to_string(),
            ));
        }
        let expires_at = i64::try_from(ttl_secs)
            .ok()
            .and_then(|secs| secs.checked_mul(1000))
            .and_then(|ms| now_ms.checked_add(ms))
            .ok_or_else(|| CryptoError::InvalidInput(format!("ttl out of range: {ttl_secs}")))?;

        let payload = TokenPayload {
            document_id: document_id.to_string(),
            timestamp: now_ms,
            expires_at,
            admin_access: is_admin.then_some(true),
        };
        let signature = STANDARD.encode(self.sign(&payload)?);
        let token = STANDARD.encode(serde_json::to_vec(&SignedToken { payload, signature })?);
        if token.len() > MAX_TOKEN_LEN {
            return Err(CryptoError::InvalidInput(format!(
                "document id too long: token would be {} bytes (max {MAX_TOKEN_LEN})",
                token.len()
            )));
        }
        Ok(token)
    }

    /// Verifies `token` against the current time.
    pub fn verify(&self, token: &str) -> CryptoResult<TokenClaims> {
        self.verify_at(token, Utc::now().timestamp_millis())
    }

    /// Verifies `token` as if the current time were `now_ms`.
    ///
    /// Every failure, whatever its cause, is `CryptoError::InvalidToken`.
    pub fn verify_at(&self, token: &str, now_ms: i64) -> CryptoResult<TokenClaims> {
        self.check(token, now_ms).ok_or(CryptoError::InvalidToken)
    }

    fn check(&self, token: &str, now_ms: i64) -> Option<TokenClaims> {
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return None;
        }
        let raw = STANDARD.decode(token.trim()).ok()?;
        let signed: SignedToken = serde_json::from_slice(&raw).ok()?;
        let signature = STANDARD.decode(&signed.signature).ok()?;

        let canonical = serde_json::to_vec(&signed.payload).ok()?;
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(&canonical);
        mac.verify_slice(&signature).ok()?;

        let payload = signed.payload;
        if payload.document_id.is_empty()
            || payload.expires_at < payload.timestamp
            || now_ms > payload.expires_at
        {
            return None;
        }

        Some(TokenClaims {
            document_id: payload.document_id,
            is_admin: payload.admin_access.unwrap_or(false),
            issued_at: DateTime::from_timestamp_millis(payload.timestamp)?,
            expires_at: DateTime::from_timestamp_millis(payload.expires_at)?,
        })
    }

    fn sign(&self, payload: &TokenPayload) -> CryptoResult<Vec<u8>> {
        let canonical = serde_json::to_vec(payload)?;
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| CryptoError::Configuration(format!("invalid token secret: {e}")))?;
        mac.update(&canonical);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}
