//! HTTP key/value cache tier.
//!
//! Talks to the companion cache server over three GET endpoints:
//! `/is_cached/<digest>` returns a JSON boolean, `/cache/<digest>`
//! records the digest, and `/stats` returns the enriched statistics
//! object. The tier is presence-only; payloads never travel over this
//! transport.

use async_trait::async_trait;
use reqwest::Client;

use crate::config::HttpConfig;
use crate::constants;

use super::stats::StatsReport;
use super::{CacheBackend, CacheError};

pub struct HttpCache {
    client: Client,
    base_url: String,
}

impl HttpCache {
    pub fn new(config: HttpConfig) -> Result<Self, CacheError> {
        let client = Client::builder()
            .timeout(constants::REMOTE_TIMEOUT)
            .connect_timeout(constants::REMOTE_TIMEOUT)
            .build()
            .map_err(|e| CacheError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url(),
        })
    }

    /// Fetch the server's statistics object.
    pub async fn query_stats(&self) -> Result<StatsReport, CacheError> {
        let url = format!("{}/stats", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CacheError::Http(e.to_string()))?;
        response
            .json()
            .await
            .map_err(|e| CacheError::Http(e.to_string()))
    }
}

#[async_trait]
impl CacheBackend for HttpCache {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn is_cached(&self, digest: &str) -> Result<bool, CacheError> {
        let url = format!("{}/is_cached/{digest}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CacheError::Http(e.to_string()))?;
        response
            .json()
            .await
            .map_err(|e| CacheError::Http(e.to_string()))
    }

    async fn store_in_cache(&self, digest: &str) -> Result<(), CacheError> {
        let url = format!("{}/cache/{digest}", self.base_url);
        self.client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CacheError::Http(e.to_string()))?;
        Ok(())
    }
}
