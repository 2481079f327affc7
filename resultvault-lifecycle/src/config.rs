//! Lifecycle configuration.
//!
//! Loaded from a JSON file or from `RESULTVAULT_*` environment variables.
//! Secrets are validated once here so that no component ever runs with an
//! empty or shared secret.

use crate::error::{LifecycleError, LifecycleResult};
use crate::retry::RetryPolicy;
use resultvault_crypto::{
    DEFAULT_ADMIN_TTL_SECS, DEFAULT_CUSTOMER_TTL_SECS, MasterSecrets, TokenTtls,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "RESULTVAULT_";

/// S3 storage settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Optional endpoint override (for MinIO in testing).
    #[serde(default)]
    pub endpoint_override: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint_override", &self.endpoint_override)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

/// Configuration for the document lifecycle.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LifecycleConfig {
    /// Master secret for per-document key derivation. Required when
    /// `encryption_enabled` is set.
    pub encryption_key: Option<String>,

    /// Secret for download password derivation.
    pub password_secret: String,

    /// Secret for signing access tokens. Must differ from `password_secret`.
    pub token_secret: String,

    /// When false, documents are stored as plaintext.
    pub encryption_enabled: bool,

    pub customer_token_ttl_seconds: u64,
    pub admin_token_ttl_seconds: u64,

    /// Upload attempts before giving up.
    pub upload_max_attempts: u32,

    /// Backoff before the second attempt; doubles on each retry.
    pub upload_base_backoff_ms: u64,

    /// Age after which an unfinished upload is treated as orphaned.
    pub pending_upload_timeout_secs: u64,

    pub storage_prefix: String,

    /// Content type for unencrypted uploads.
    pub content_type: String,

    pub s3: Option<S3Config>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            encryption_key: None,
            password_secret: String::new(),
            token_secret: String::new(),
            encryption_enabled: true,
            customer_token_ttl_seconds: DEFAULT_CUSTOMER_TTL_SECS,
            admin_token_ttl_seconds: DEFAULT_ADMIN_TTL_SECS,
            upload_max_attempts: 3,
            upload_base_backoff_ms: 500,
            pending_upload_timeout_secs: 3600, // 1 hour
            storage_prefix: "results".to_string(),
            content_type: "application/pdf".to_string(),
            s3: None,
        }
    }
}

impl std::fmt::Debug for LifecycleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleConfig")
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "[REDACTED]"))
            .field("password_secret", &"[REDACTED]")
            .field("token_secret", &"[REDACTED]")
            .field("encryption_enabled", &self.encryption_enabled)
            .field("customer_token_ttl_seconds", &self.customer_token_ttl_seconds)
            .field("admin_token_ttl_seconds", &self.admin_token_ttl_seconds)
            .field("upload_max_attempts", &self.upload_max_attempts)
            .field("upload_base_backoff_ms", &self.upload_base_backoff_ms)
            .field("pending_upload_timeout_secs", &self.pending_upload_timeout_secs)
            .field("storage_prefix", &self.storage_prefix)
            .field("content_type", &self.content_type)
            .field("s3", &self.s3)
            .finish()
    }
}

impl LifecycleConfig {
    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> LifecycleResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LifecycleError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Reads `RESULTVAULT_*` environment variables over the defaults.
    pub fn from_env() -> LifecycleResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> LifecycleResult<Self> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut config = Self::default();

        if let Some(v) = var("ENCRYPTION_KEY") {
            config.encryption_key = Some(v);
        }
        if let Some(v) = var("PASSWORD_SECRET") {
            config.password_secret = v;
        }
        if let Some(v) = var("TOKEN_SECRET") {
            config.token_secret = v;
        }
        if let Some(v) = var("ENCRYPTION_ENABLED") {
            config.encryption_enabled = parse_bool("ENCRYPTION_ENABLED", &v)?;
        }
        if let Some(v) = var("CUSTOMER_TOKEN_TTL_SECONDS") {
            config.customer_token_ttl_seconds = parse_num("CUSTOMER_TOKEN_TTL_SECONDS", &v)?;
        }
        if let Some(v) = var("ADMIN_TOKEN_TTL_SECONDS") {
            config.admin_token_ttl_seconds = parse_num("ADMIN_TOKEN_TTL_SECONDS", &v)?;
        }
        if let Some(v) = var("UPLOAD_MAX_ATTEMPTS") {
            config.upload_max_attempts = parse_num("UPLOAD_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = var("UPLOAD_BASE_BACKOFF_MS") {
            config.upload_base_backoff_ms = parse_num("UPLOAD_BASE_BACKOFF_MS", &v)?;
        }
        if let Some(v) = var("PENDING_UPLOAD_TIMEOUT_SECS") {
            config.pending_upload_timeout_secs = parse_num("PENDING_UPLOAD_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("STORAGE_PREFIX") {
            config.storage_prefix = v;
        }
        if let Some(v) = var("CONTENT_TYPE") {
            config.content_type = v;
        }

        if let Some(bucket) = var("S3_BUCKET") {
            config.s3 = Some(S3Config {
                bucket,
                region: var("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                endpoint_override: var("S3_ENDPOINT"),
                access_key_id: var("S3_ACCESS_KEY_ID").unwrap_or_default(),
                secret_access_key: var("S3_SECRET_ACCESS_KEY").unwrap_or_default(),
            });
        }

        Ok(config)
    }

    /// Checks secrets and limits. Called by every constructor that consumes
    /// the config.
    pub fn validate(&self) -> LifecycleResult<()> {
        if self.encryption_enabled
            && self.encryption_key.as_deref().is_none_or(str::is_empty)
        {
            return Err(LifecycleError::Configuration(
                "encryption is enabled but no encryption key is configured".into(),
            ));
        }
        if self.password_secret.is_empty() {
            return Err(LifecycleError::Configuration(
                "password secret is not configured".into(),
            ));
        }
        if self.token_secret.is_empty() {
            return Err(LifecycleError::Configuration(
                "token secret is not configured".into(),
            ));
        }
        if self.token_secret == self.password_secret {
            return Err(LifecycleError::Configuration(
                "token secret and password secret must differ".into(),
            ));
        }
        if self.upload_max_attempts == 0 {
            return Err(LifecycleError::Configuration(
                "upload_max_attempts must be at least 1".into(),
            ));
        }
        if self.storage_prefix.trim_matches('/').is_empty() {
            return Err(LifecycleError::Configuration(
                "storage prefix must not be empty".into(),
            ));
        }
        if let Some(s3) = &self.s3 {
            if s3.bucket.is_empty() || s3.region.is_empty() {
                return Err(LifecycleError::Configuration(
                    "s3 bucket and region are required".into(),
                ));
            }
        }
        Ok(())
    }

    /// Validates the config and builds the secret set for the crypto layer.
    /// The key is carried even when encryption is disabled, so results
    /// stored while it was enabled stay downloadable.
    pub fn master_secrets(&self) -> LifecycleResult<MasterSecrets> {
        self.validate()?;
        let encryption_key = self.encryption_key.as_deref().filter(|k| !k.is_empty());
        Ok(MasterSecrets::new(
            encryption_key,
            &self.token_secret,
            &self.password_secret,
        )?)
    }

    pub fn token_ttls(&self) -> TokenTtls {
        TokenTtls {
            customer_secs: self.customer_token_ttl_seconds,
            admin_secs: self.admin_token_ttl_seconds,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.upload_max_attempts,
            Duration::from_millis(self.upload_base_backoff_ms),
        )
    }

    pub fn pending_upload_timeout(&self) -> Duration {
        Duration::from_secs(self.pending_upload_timeout_secs)
    }
}

fn parse_num<T: std::str::FromStr>(name: &str, value: &str) -> LifecycleResult<T> {
    value.trim().parse().map_err(|_| {
        LifecycleError::Configuration(format!("{ENV_PREFIX}{name} is not a valid number: {value}"))
    })
}

fn parse_bool(name: &str, value: &str) -> LifecycleResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(LifecycleError::Configuration(format!(
            "{ENV_PREFIX}{name} is not a valid boolean: {value}"
        ))),
    }
}
