//! Multi-tier cache: trait, backends, and the coordinator.
//!
//! Every tier implements [`CacheBackend`]. Presence-only tiers (HTTP
//! server, S3) answer `is_cached`; payload-capable tiers (local, GCS,
//! Redis) additionally serve the captured analyzer output. The
//! [`CacheEngine`] holds the tiers in a fixed order and implements the
//! read/write policies:
//!
//! - `is_cached` probes local → HTTP → S3 → GCS → Redis and stops at
//!   the first hit — presence-only tiers are cheaper, so they go first;
//! - `get_cache_data` probes only payload-capable tiers, local → GCS →
//!   Redis;
//! - stores fan out to every configured tier, best effort.

pub mod http;
pub mod local;
pub mod redis;
pub mod stats;

#[cfg(feature = "gcs")]
pub mod gcs;
#[cfg(feature = "s3")]
pub mod s3;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;

use self::local::LocalCache;
use self::stats::StatsReport;

/// Errors from cache tiers.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP cache error: {0}")]
    Http(String),

    #[error("redis cache error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("S3 cache error: {0}")]
    S3(String),

    #[error("GCS cache error: {0}")]
    Gcs(String),

    #[error("request to {tier} cache timed out")]
    Timeout { tier: &'static str },

    #[error("timed out waiting for stats lock {}; a crashed process may have left it behind", path.display())]
    LockTimeout { path: PathBuf },
}

/// One cache tier.
///
/// `store_in_cache_with_data` falls back to a presence store so tiers
/// that cannot hold payloads still participate in payload-mode writes.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short tier name for log messages.
    fn name(&self) -> &'static str;

    /// Whether this tier can return stored payload bytes.
    fn stores_data(&self) -> bool {
        false
    }

    async fn is_cached(&self, digest: &str) -> Result<bool, CacheError>;

    async fn get_cache_data(&self, _digest: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    async fn store_in_cache(&self, digest: &str) -> Result<(), CacheError>;

    async fn store_in_cache_with_data(
        &self,
        digest: &str,
        _data: &[u8],
    ) -> Result<(), CacheError> {
        self.store_in_cache(digest).await
    }
}

/// The layered cache.
pub struct CacheEngine {
    local: Arc<LocalCache>,
    http: Option<Arc<http::HttpCache>>,
    /// All tiers in `is_cached` probe order, local first.
    tiers: Vec<Arc<dyn CacheBackend>>,
}

impl CacheEngine {
    /// Construct the local tier plus every remote tier whose
    /// environment is configured. Remote construction failures are
    /// logged and the tier is skipped — a broken tier must not break
    /// the analyzer run.
    pub async fn from_config(config: &Config) -> Self {
        let local = Arc::new(LocalCache::new(config.cache_dir.clone()));
        let mut tiers: Vec<Arc<dyn CacheBackend>> = vec![local.clone()];

        let http = config.http.as_ref().and_then(|http_config| {
            match http::HttpCache::new(http_config.clone()) {
                Ok(tier) => Some(Arc::new(tier)),
                Err(e) => {
                    eprintln!("Warning: disabling HTTP cache tier: {e}");
                    None
                }
            }
        });
        if let Some(tier) = &http {
            tiers.push(tier.clone());
        }

        #[cfg(feature = "s3")]
        if let Some(s3_config) = &config.s3 {
            tiers.push(Arc::new(s3::S3Cache::connect(s3_config.clone()).await));
        }

        #[cfg(feature = "gcs")]
        if let Some(gcs_config) = &config.gcs {
            match gcs::GcsCache::connect(gcs_config.clone()).await {
                Ok(tier) => tiers.push(Arc::new(tier)),
                Err(e) => eprintln!("Warning: disabling GCS cache tier: {e}"),
            }
        }

        if let Some(redis_config) = &config.redis {
            match redis::RedisCache::connect(redis_config) {
                Ok(tier) => tiers.push(Arc::new(tier)),
                Err(e) => eprintln!("Warning: disabling redis cache tier: {e}"),
            }
        }

        Self { local, http, tiers }
    }

    /// A purely local engine, used by the management commands that must
    /// not touch the network.
    pub fn local_only(config: &Config) -> Self {
        let local = Arc::new(LocalCache::new(config.cache_dir.clone()));
        Self {
            tiers: vec![local.clone()],
            http: None,
            local,
        }
    }

    pub fn local(&self) -> &LocalCache {
        &self.local
    }

    /// Probe tiers in order, short-circuiting on the first hit.
    ///
    /// Tier failures degrade to a miss; only a stats-lock timeout is
    /// loud, since it usually means a stale lock that needs an
    /// operator.
    pub async fn is_cached(&self, digest: &str) -> Result<bool, CacheError> {
        for tier in &self.tiers {
            match tier.is_cached(digest).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e @ CacheError::LockTimeout { .. }) => return Err(e),
                Err(e) => eprintln!("Warning: {} cache lookup failed: {e}", tier.name()),
            }
        }
        Ok(false)
    }

    /// Probe payload-capable tiers in order for stored output bytes.
    pub async fn get_cache_data(&self, digest: &str) -> Result<Option<Vec<u8>>, CacheError> {
        for tier in self.tiers.iter().filter(|t| t.stores_data()) {
            match tier.get_cache_data(digest).await {
                Ok(Some(data)) => return Ok(Some(data)),
                Ok(None) => {}
                Err(e @ CacheError::LockTimeout { .. }) => return Err(e),
                Err(e) => eprintln!("Warning: {} cache read failed: {e}", tier.name()),
            }
        }
        Ok(None)
    }

    /// Record presence of a digest in every configured tier.
    pub async fn store_in_cache(&self, digest: &str) {
        for tier in &self.tiers {
            if let Err(e) = tier.store_in_cache(digest).await {
                eprintln!("Warning: {} cache store failed: {e}", tier.name());
            }
        }
    }

    /// Record a digest with its payload in every configured tier.
    /// Presence-only tiers fall back to a presence store.
    pub async fn store_in_cache_with_data(&self, digest: &str, data: &[u8]) {
        for tier in &self.tiers {
            if let Err(e) = tier.store_in_cache_with_data(digest, data).await {
                eprintln!("Warning: {} cache store failed: {e}", tier.name());
            }
        }
    }

    /// Fetch statistics: the HTTP server's enriched report when one is
    /// configured, else the local counters.
    pub async fn query_stats(&self) -> StatsReport {
        if let Some(http) = &self.http {
            match http.query_stats().await {
                Ok(report) => return report,
                Err(e) => eprintln!("Warning: stats query failed, using local stats: {e}"),
            }
        }
        self.local.stats_report()
    }
}
