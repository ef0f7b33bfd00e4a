//! S3 cache tier.
//!
//! Objects live at `<folder>/<digest[0:2]>/<digest[2:]>` inside the
//! configured bucket, mirroring the local shard layout. The tier is
//! presence-only: stored objects carry the digest string as their body
//! and are never read back, only `HEAD`-probed. In anonymous mode
//! (unsigned requests) reads work against public buckets and writes
//! are silently skipped.

use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;

use crate::config::BucketConfig;
use crate::constants;

use super::{CacheBackend, CacheError};

pub struct S3Cache {
    client: aws_sdk_s3::Client,
    bucket: String,
    folder: Option<String>,
    read_only: bool,
}

impl S3Cache {
    /// Build the client from the default AWS credential/region chain,
    /// or with signing disabled in anonymous mode.
    pub async fn connect(config: BucketConfig) -> Self {
        let timeouts = TimeoutConfig::builder()
            .operation_timeout(constants::REMOTE_TIMEOUT)
            .build();
        let loader = aws_config::defaults(BehaviorVersion::latest()).timeout_config(timeouts);
        let loader = if config.no_credentials {
            loader.no_credentials()
        } else {
            loader
        };
        let sdk_config = loader.load().await;

        Self {
            client: aws_sdk_s3::Client::new(&sdk_config),
            bucket: config.bucket,
            folder: config.folder,
            read_only: config.no_credentials,
        }
    }

    fn key(&self, digest: &str) -> String {
        let sharded = format!("{}/{}", &digest[..2], &digest[2..]);
        match &self.folder {
            Some(folder) => format!("{folder}/{sharded}"),
            None => sharded,
        }
    }
}

#[async_trait]
impl CacheBackend for S3Cache {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn is_cached(&self, digest: &str) -> Result<bool, CacheError> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.key(digest))
            .send()
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(CacheError::S3(service_err.to_string()))
                }
            }
        }
    }

    async fn store_in_cache(&self, digest: &str) -> Result<(), CacheError> {
        if self.read_only {
            return Ok(());
        }
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.key(digest))
            .body(ByteStream::from(digest.as_bytes().to_vec()))
            .send()
            .await
            .map_err(|e| CacheError::S3(e.into_service_error().to_string()))?;
        Ok(())
    }
}
