//! Hit/miss counters and the statistics report.
//!
//! The counters live in `<cache-dir>/stats` as two whitespace-separated
//! integers. Parallel builds run many wrapper processes at once, so
//! every increment happens under an advisory lock file created with
//! `O_EXCL` semantics and removed on release. A crashed process can
//! leave the lock behind; the next writer times out loudly rather than
//! corrupting the counters.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use colored::Colorize;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::constants;

use super::CacheError;

/// RAII guard over `<stats>.lock`.
///
/// Acquisition creates the lock file exclusively, retrying every 100 ms
/// up to a 3 second deadline. Dropping the guard unlinks the file, on
/// every exit path from the guarded block.
#[derive(Debug)]
pub struct StatsLock {
    path: PathBuf,
}

impl StatsLock {
    /// Acquire the lock, blocking up to the configured timeout.
    pub fn acquire(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let deadline = Instant::now() + constants::STATS_LOCK_TIMEOUT;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(_) => {
                    return Ok(Self {
                        path: path.to_path_buf(),
                    })
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(CacheError::LockTimeout {
                            path: path.to_path_buf(),
                        });
                    }
                    std::thread::sleep(constants::STATS_LOCK_RETRY);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for StatsLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// The on-disk hit/miss counter pair.
#[derive(Debug)]
pub struct StatsFile {
    path: PathBuf,
    lock_path: PathBuf,
}

impl StatsFile {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join("stats"),
            lock_path: cache_dir.join("stats.lock"),
        }
    }

    /// Read the counters. Missing or invalid files read as `(0, 0)`.
    pub fn read(&self) -> (u64, u64) {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return (0, 0);
        };
        let mut fields = content.split_whitespace();
        let hits = fields.next().and_then(|f| f.parse().ok());
        let misses = fields.next().and_then(|f| f.parse().ok());
        match (hits, misses) {
            (Some(hits), Some(misses)) => (hits, misses),
            _ => (0, 0),
        }
    }

    /// Record one lookup outcome, serialized by the advisory lock.
    pub fn update(&self, hit: bool) -> Result<(), CacheError> {
        let _lock = StatsLock::acquire(&self.lock_path)?;
        let (mut hits, mut misses) = self.read();
        if hit {
            hits += 1;
        } else {
            misses += 1;
        }
        let mut file = std::fs::File::create(&self.path)?;
        writeln!(file, "{hits} {misses}")?;
        Ok(())
    }

    /// Delete the counters. A missing file is not an error.
    pub fn zero(&self) -> Result<(), CacheError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Statistics report, either computed locally or fetched from the
/// companion HTTP server. The server returns an enriched object; every
/// field is optional so a leaner producer never breaks the consumer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsReport {
    pub hit_count: Option<u64>,
    pub miss_count: Option<u64>,
    pub hit_rate: Option<f64>,
    pub miss_rate: Option<f64>,
    pub total_hit_rate: Option<f64>,
    pub cached_count: Option<u64>,
    pub cleaned_count: Option<u64>,
    pub cleaned_seconds_ago: Option<f64>,
    pub saved_seconds_ago: Option<f64>,
    pub saved_size_bytes: Option<u64>,
    pub uptime_seconds: Option<f64>,
    pub age_days_histogram: Option<IndexMap<String, u64>>,
    pub hit_count_histogram: Option<IndexMap<String, u64>>,
}

impl StatsReport {
    /// Build a local report from the counters and entry count.
    pub fn local(hits: u64, misses: u64, cached_count: u64) -> Self {
        let total = hits + misses;
        let (hit_rate, miss_rate) = if total > 0 {
            (
                Some(hits as f64 / total as f64),
                Some(misses as f64 / total as f64),
            )
        } else {
            (None, None)
        };
        Self {
            hit_count: Some(hits),
            miss_count: Some(misses),
            hit_rate,
            miss_rate,
            cached_count: Some(cached_count),
            ..Self::default()
        }
    }

    /// Render the report as a printable table. Missing fields render
    /// as `N/A` — a leaner producer is not an error.
    pub fn render(&self) -> String {
        let mut out = String::new();
        row(&mut out, "Hits", self.hit_count.map(fmt_count));
        row(&mut out, "Misses", self.miss_count.map(fmt_count));
        row(&mut out, "Hit rate", self.hit_rate.map(fmt_rate));
        row(&mut out, "Miss rate", self.miss_rate.map(fmt_rate));
        row(&mut out, "Total hit rate", self.total_hit_rate.map(fmt_rate));
        row(&mut out, "Cached entries", self.cached_count.map(fmt_count));
        row(&mut out, "Cleaned entries", self.cleaned_count.map(fmt_count));
        row(
            &mut out,
            "Cleaned ago",
            self.cleaned_seconds_ago.map(fmt_seconds),
        );
        row(&mut out, "Saved ago", self.saved_seconds_ago.map(fmt_seconds));
        row(
            &mut out,
            "Saved size",
            self.saved_size_bytes.map(fmt_bytes),
        );
        row(&mut out, "Uptime", self.uptime_seconds.map(fmt_seconds));
        histogram(&mut out, "Age histogram (days)", &self.age_days_histogram);
        histogram(&mut out, "Hit histogram", &self.hit_count_histogram);
        out
    }
}

fn row(out: &mut String, label: &str, value: Option<String>) {
    let value = value.unwrap_or_else(|| "N/A".to_string());
    out.push_str(&format!("  {:<22}{value}\n", format!("{label}:").cyan()));
}

fn histogram(out: &mut String, label: &str, map: &Option<IndexMap<String, u64>>) {
    let Some(map) = map else {
        return row(out, label, None);
    };
    row(out, label, Some(String::new()));
    for (bucket, count) in map {
        out.push_str(&format!("    {bucket:>8}  {count}\n"));
    }
}

fn fmt_count(n: u64) -> String {
    n.to_string()
}

fn fmt_rate(rate: f64) -> String {
    format!("{:.1} %", rate * 100.0)
}

fn fmt_seconds(s: f64) -> String {
    format!("{s:.0} s")
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    if bytes >= MB {
        format!("{:.1} MiB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KiB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
