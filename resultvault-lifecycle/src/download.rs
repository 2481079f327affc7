//! Serving result documents to token holders.
//!
//! Every token or password failure surfaces as the same
//! [`LifecycleError::InvalidLink`]; the cause is only logged at debug level.

use crate::config::LifecycleConfig;
use crate::error::{LifecycleError, LifecycleResult};
use crate::record_store::RecordStore;
use crate::storage::BlobStorage;
use crate::types::{DownloadedResult, ResultStatus};
use resultvault_crypto::{
    AccessTokenService, AeadCipher, EncryptedBlob, PasswordDeriver, TokenProfile,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct DownloadService {
    tokens: AccessTokenService,
    passwords: PasswordDeriver,
    cipher: Option<AeadCipher>,
    storage: Arc<dyn BlobStorage>,
    records: Arc<dyn RecordStore>,
}

impl DownloadService {
    pub fn new(
        config: &LifecycleConfig,
        storage: Arc<dyn BlobStorage>,
        records: Arc<dyn RecordStore>,
    ) -> LifecycleResult<Self> {
        let secrets = config.master_secrets()?;
        let cipher = match secrets.encryption_key() {
            Some(_) => Some(AeadCipher::from_secrets(&secrets)?),
            None => None,
        };
        Ok(Self {
            tokens: AccessTokenService::from_secrets(&secrets, config.token_ttls())?,
            passwords: PasswordDeriver::from_secrets(&secrets)?,
            cipher,
            storage,
            records,
        })
    }

    /// Link token for the customer. Requires the order password to open.
    pub fn issue_customer_link(&self, order_id: &str) -> LifecycleResult<String> {
        Ok(self.tokens.issue_for(order_id, TokenProfile::Customer)?)
    }

    /// Short-lived link token that skips the password check.
    pub fn issue_admin_link(&self, order_id: &str) -> LifecycleResult<String> {
        Ok(self.tokens.issue_for(order_id, TokenProfile::Admin)?)
    }

    /// Resolves a token (and password, for customer tokens) to the plaintext
    /// of the order's current result.
    pub async fn open(
        &self,
        token: &str,
        password: Option<&str>,
    ) -> LifecycleResult<DownloadedResult> {
        let claims = self.tokens.verify(token).map_err(|_| {
            debug!("download rejected: token did not verify");
            LifecycleError::InvalidLink
        })?;
        let order_id = claims.document_id.as_str();

        if !claims.is_admin {
            let accepted = password.is_some_and(|p| self.passwords.verify(order_id, p));
            if !accepted {
                debug!(order_id, "download rejected: password mismatch");
                return Err(LifecycleError::InvalidLink);
            }
        }

        let pointer = self
            .records
            .read_result_pointer(order_id)
            .await
            .map_err(|e| LifecycleError::RecordUnavailable(e.to_string()))?;
        let Some(pointer) = pointer.filter(|p| p.status == ResultStatus::Completed) else {
            debug!(order_id, "download rejected: no completed result");
            return Err(LifecycleError::InvalidLink);
        };

        let stored = self
            .storage
            .get(&pointer.path)
            .await
            .map_err(|e| LifecycleError::StorageUnavailable {
                attempts: 1,
                message: e.to_string(),
            })?
            .ok_or_else(|| {
                warn!(order_id, path = %pointer.path, "result pointer names a missing object");
                LifecycleError::NotFound(pointer.path.clone())
            })?;

        let (bytes, was_encrypted) = match &pointer.encryption_metadata {
            Some(metadata) => {
                let cipher = self.cipher.as_ref().ok_or_else(|| {
                    LifecycleError::Configuration(
                        "result is encrypted but no encryption key is configured".into(),
                    )
                })?;
                let blob = EncryptedBlob::from_bytes(&stored)?;
                if !metadata.matches(&blob) {
                    warn!(
                        order_id,
                        path = %pointer.path,
                        "stored object does not match recorded metadata"
                    );
                    return Err(LifecycleError::AuthenticationFailed);
                }
                (cipher.decrypt(&blob, order_id)?, true)
            }
            None => (stored, false),
        };

        info!(order_id, admin = claims.is_admin, encrypted = was_encrypted, "result downloaded");
        Ok(DownloadedResult {
            order_id: order_id.to_string(),
            bytes,
            was_encrypted,
            admin_access: claims.is_admin,
        })
    }
}
