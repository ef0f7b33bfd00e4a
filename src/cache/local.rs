//! Local filesystem cache tier.
//!
//! Entries live at `<cache-dir>/<digest[0:2]>/<digest[2:]>` — the
//! two-character shard prefix bounds per-directory entry counts. An
//! empty file records presence; a non-empty file carries the captured
//! analyzer output. Entry mtimes are refreshed on every hit so an
//! external job can evict by age.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use filetime::FileTime;
use regex::Regex;

use super::stats::{StatsFile, StatsReport};
use super::{CacheBackend, CacheError};

/// Filenames under a shard directory: the digest minus its prefix.
const ENTRY_PATTERN: &str = "^[0-9a-f]{38}$";

#[derive(Debug)]
pub struct LocalCache {
    cache_dir: PathBuf,
    stats: StatsFile,
}

impl LocalCache {
    pub fn new(cache_dir: PathBuf) -> Self {
        let stats = StatsFile::new(&cache_dir);
        Self { cache_dir, stats }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn entry_path(&self, digest: &str) -> PathBuf {
        self.cache_dir.join(&digest[..2]).join(&digest[2..])
    }

    /// Presence check. Hits refresh the entry mtime; both outcomes are
    /// recorded in the stats counters.
    pub fn lookup(&self, digest: &str) -> Result<bool, CacheError> {
        let path = self.entry_path(digest);
        let hit = path.is_file();
        if hit {
            if let Err(e) = filetime::set_file_mtime(&path, FileTime::now()) {
                eprintln!("Warning: failed to touch {}: {e}", path.display());
            }
        }
        self.stats.update(hit)?;
        Ok(hit)
    }

    /// Payload read. Counts and touches like [`lookup`](Self::lookup);
    /// read failures degrade to a miss.
    pub fn read_data(&self, digest: &str) -> Result<Option<Vec<u8>>, CacheError> {
        if !self.lookup(digest)? {
            return Ok(None);
        }
        match std::fs::read(self.entry_path(digest)) {
            Ok(data) => Ok(Some(data)),
            Err(e) => {
                eprintln!("Warning: failed to read cache entry {digest}: {e}");
                Ok(None)
            }
        }
    }

    /// Record presence of a digest (empty entry file).
    pub fn write(&self, digest: &str) -> Result<(), CacheError> {
        self.write_data(digest, &[])
    }

    /// Record a digest together with the captured analyzer output.
    pub fn write_data(&self, digest: &str, data: &[u8]) -> Result<(), CacheError> {
        let path = self.entry_path(digest);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, data)?;
        Ok(())
    }

    /// Recursively remove the cache directory. Missing is not an error.
    pub fn clean(&self) -> Result<(), CacheError> {
        match std::fs::remove_dir_all(&self.cache_dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the stats counters.
    pub fn zero_stats(&self) -> Result<(), CacheError> {
        self.stats.zero()
    }

    /// Count stored entries by walking the shard directories.
    pub fn cached_count(&self) -> u64 {
        let entry_re = Regex::new(ENTRY_PATTERN).expect("entry pattern is valid");
        let Ok(shards) = std::fs::read_dir(&self.cache_dir) else {
            return 0;
        };
        let mut count = 0;
        for shard in shards.flatten() {
            let Ok(entries) = std::fs::read_dir(shard.path()) else {
                continue;
            };
            count += entries
                .flatten()
                .filter(|e| {
                    e.file_name()
                        .to_str()
                        .is_some_and(|name| entry_re.is_match(name))
                })
                .count() as u64;
        }
        count
    }

    /// Statistics computed purely from the local directory.
    pub fn stats_report(&self) -> StatsReport {
        let (hits, misses) = self.stats.read();
        StatsReport::local(hits, misses, self.cached_count())
    }
}

#[async_trait]
impl CacheBackend for LocalCache {
    fn name(&self) -> &'static str {
        "local"
    }

    fn stores_data(&self) -> bool {
        true
    }

    async fn is_cached(&self, digest: &str) -> Result<bool, CacheError> {
        self.lookup(digest)
    }

    async fn get_cache_data(&self, digest: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.read_data(digest)
    }

    async fn store_in_cache(&self, digest: &str) -> Result<(), CacheError> {
        self.write(digest)
    }

    async fn store_in_cache_with_data(
        &self,
        digest: &str,
        data: &[u8],
    ) -> Result<(), CacheError> {
        self.write_data(digest, data)
    }
}
