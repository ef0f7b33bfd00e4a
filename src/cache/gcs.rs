//! Google Cloud Storage cache tier.
//!
//! Same object layout as the S3 tier (`<folder>/<digest[0:2]>/
//! <digest[2:]>`), but payload-capable: stored objects are downloaded
//! back in payload mode. Anonymous-client mode serves reads from
//! public buckets and silently skips writes.

use async_trait::async_trait;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};

use crate::config::BucketConfig;
use crate::constants;

use super::{CacheBackend, CacheError};

pub struct GcsCache {
    client: Client,
    bucket: String,
    folder: Option<String>,
    read_only: bool,
}

impl GcsCache {
    /// Build the client from application-default credentials, or as an
    /// anonymous client when requested.
    pub async fn connect(config: BucketConfig) -> Result<Self, CacheError> {
        let client_config = if config.no_credentials {
            ClientConfig::default().anonymous()
        } else {
            ClientConfig::default()
                .with_auth()
                .await
                .map_err(|e| CacheError::Gcs(e.to_string()))?
        };
        Ok(Self {
            client: Client::new(client_config),
            bucket: config.bucket,
            folder: config.folder,
            read_only: config.no_credentials,
        })
    }

    fn object_name(&self, digest: &str) -> String {
        let sharded = format!("{}/{}", &digest[..2], &digest[2..]);
        match &self.folder {
            Some(folder) => format!("{folder}/{sharded}"),
            None => sharded,
        }
    }

    fn get_request(&self, digest: &str) -> GetObjectRequest {
        GetObjectRequest {
            bucket: self.bucket.clone(),
            object: self.object_name(digest),
            ..Default::default()
        }
    }

    async fn upload(&self, digest: &str, data: Vec<u8>) -> Result<(), CacheError> {
        if self.read_only {
            return Ok(());
        }
        let request = UploadObjectRequest {
            bucket: self.bucket.clone(),
            ..Default::default()
        };
        let media = UploadType::Simple(Media::new(self.object_name(digest)));
        tokio::time::timeout(
            constants::REMOTE_TIMEOUT,
            self.client.upload_object(&request, data, &media),
        )
        .await
        .map_err(|_| CacheError::Timeout { tier: "gcs" })?
        .map_err(|e| CacheError::Gcs(e.to_string()))?;
        Ok(())
    }
}

fn is_not_found(err: &google_cloud_storage::http::Error) -> bool {
    use google_cloud_storage::http::Error;
    match err {
        Error::Response(response) => response.code == 404,
        Error::HttpClient(e) => e.status().map(|s| s.as_u16() == 404).unwrap_or(false),
        _ => false,
    }
}

#[async_trait]
impl CacheBackend for GcsCache {
    fn name(&self) -> &'static str {
        "gcs"
    }

    fn stores_data(&self) -> bool {
        true
    }

    async fn is_cached(&self, digest: &str) -> Result<bool, CacheError> {
        let result = tokio::time::timeout(
            constants::REMOTE_TIMEOUT,
            self.client.get_object(&self.get_request(digest)),
        )
        .await
        .map_err(|_| CacheError::Timeout { tier: "gcs" })?;
        match result {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(CacheError::Gcs(e.to_string())),
        }
    }

    async fn get_cache_data(&self, digest: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let result = tokio::time::timeout(
            constants::REMOTE_TIMEOUT,
            self.client
                .download_object(&self.get_request(digest), &Range::default()),
        )
        .await
        .map_err(|_| CacheError::Timeout { tier: "gcs" })?;
        match result {
            Ok(data) => Ok(Some(data)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(CacheError::Gcs(e.to_string())),
        }
    }

    async fn store_in_cache(&self, digest: &str) -> Result<(), CacheError> {
        // Presence-only entries carry the digest string, like S3.
        self.upload(digest, digest.as_bytes().to_vec()).await
    }

    async fn store_in_cache_with_data(
        &self,
        digest: &str,
        data: &[u8],
    ) -> Result<(), CacheError> {
        self.upload(digest, data.to_vec()).await
    }
}
