//! S3-backed [`BlobStorage`].
//!
//! Uses static credentials from [`S3Config`]. An endpoint override switches
//! to path-style addressing for MinIO.

use crate::config::S3Config;
use crate::error::{LifecycleError, LifecycleResult};
use crate::storage::{BlobStorage, DeleteOutcome, StorageError, StorageResult};
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::primitives::ByteStream;
use tracing::debug;

pub struct S3BlobStorage {
    client: S3Client,
    bucket: String,
}

impl S3BlobStorage {
    pub fn new(config: &S3Config) -> LifecycleResult<Self> {
        if config.bucket.is_empty() || config.region.is_empty() {
            return Err(LifecycleError::Configuration(
                "s3 bucket and region are required".into(),
            ));
        }

        let credentials = aws_credential_types::Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "resultvault-static",
        );

        let mut config_builder = aws_sdk_s3::Config::builder()
            .region(aws_types::region::Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .behavior_version_latest();

        if let Some(ref endpoint) = config.endpoint_override {
            config_builder = config_builder
                .endpoint_url(endpoint)
                .force_path_style(true);
        }

        Ok(Self {
            client: S3Client::from_conf(config_builder.build()),
            bucket: config.bucket.clone(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(StorageError::Backend(format!(
                        "head object failed for {key}: {service_err}"
                    )))
                }
            }
        }
    }
}

#[async_trait]
impl BlobStorage for S3BlobStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("upload failed for {key}: {e}")))?;

        debug!("uploaded {size} bytes to s3://{}/{key}", self.bucket);
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    return Ok(None);
                }
                return Err(StorageError::Backend(format!(
                    "download failed for {key}: {service_err}"
                )));
            }
        };

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(format!("failed to read body for {key}: {e}")))?;

        let bytes = body.into_bytes().to_vec();
        debug!("downloaded {} bytes from s3://{}/{key}", bytes.len(), self.bucket);
        Ok(Some(bytes))
    }

    /// S3 deletes succeed for missing keys, so a HEAD probe decides the
    /// outcome first.
    async fn delete(&self, key: &str) -> StorageResult<DeleteOutcome> {
        if !self.exists(key).await? {
            debug!("s3://{}/{key} already absent", self.bucket);
            return Ok(DeleteOutcome::NotFound);
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("delete failed for {key}: {e}")))?;

        debug!("deleted s3://{}/{key}", self.bucket);
        Ok(DeleteOutcome::Deleted)
    }
}
