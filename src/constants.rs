//! App-wide constants.
//!
//! Centralises the tool name, environment variable names, and protocol
//! defaults so a rename only requires changing this file.

use std::time::Duration;

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "ctcache";

/// Database filename looked up under the `-p` directory.
pub const COMPILE_DB_FILENAME: &str = "compile_commands.json";

/// Per-directory analyzer configuration filename.
pub const CLANG_TIDY_FILENAME: &str = ".clang-tidy";

/// Hasher audit-log filename (appended under the dump directory).
pub const DUMP_FILENAME: &str = "ctcache.dump";

/// Per-request timeout applied to every remote cache tier.
pub const REMOTE_TIMEOUT: Duration = Duration::from_secs(3);

/// How long to keep retrying the stats lock before failing loudly.
pub const STATS_LOCK_TIMEOUT: Duration = Duration::from_secs(3);

/// Pause between stats lock acquisition attempts.
pub const STATS_LOCK_RETRY: Duration = Duration::from_millis(100);

/// Separator for `--directories_with_clang_tidy` values. An asterisk
/// cannot appear in a path on the platforms we care about.
pub const CONFIG_DIR_SEPARATOR: char = '*';

/// The synthetic flag carrying the allowed `.clang-tidy` directories.
pub const CONFIG_DIRS_FLAG: &str = "--directories_with_clang_tidy=";

// ── Environment variable names ──────────────────────────────────────

pub const ENV_DIR: &str = "CTCACHE_DIR";
pub const ENV_STRIP: &str = "CTCACHE_STRIP";
pub const ENV_SAVE_OUTPUT: &str = "CTCACHE_SAVE_OUTPUT";
pub const ENV_IGNORE_OUTPUT: &str = "CTCACHE_IGNORE_OUTPUT";
pub const ENV_EXCLUDE_HASH_REGEX: &str = "CTCACHE_EXCLUDE_HASH_REGEX";
pub const ENV_DEBUG: &str = "CTCACHE_DEBUG";
pub const ENV_DUMP: &str = "CTCACHE_DUMP";
pub const ENV_DUMP_DIR: &str = "CTCACHE_DUMP_DIR";

pub const ENV_HOST: &str = "CTCACHE_HOST";
pub const ENV_PROTO: &str = "CTCACHE_PROTO";
pub const ENV_PORT: &str = "CTCACHE_PORT";

pub const ENV_REDIS_HOST: &str = "CTCACHE_REDIS_HOST";
pub const ENV_REDIS_PORT: &str = "CTCACHE_REDIS_PORT";
pub const ENV_REDIS_USERNAME: &str = "CTCACHE_REDIS_USERNAME";
pub const ENV_REDIS_PASSWORD: &str = "CTCACHE_REDIS_PASSWORD";
pub const ENV_REDIS_NAMESPACE: &str = "CTCACHE_REDIS_NAMESPACE";

pub const ENV_S3_BUCKET: &str = "CTCACHE_S3_BUCKET";
pub const ENV_S3_FOLDER: &str = "CTCACHE_S3_FOLDER";
pub const ENV_S3_NO_CREDENTIALS: &str = "CTCACHE_S3_NO_CREDENTIALS";

pub const ENV_GCS_BUCKET: &str = "CTCACHE_GCS_BUCKET";
pub const ENV_GCS_FOLDER: &str = "CTCACHE_GCS_FOLDER";
pub const ENV_GCS_NO_CREDENTIALS: &str = "CTCACHE_GCS_NO_CREDENTIALS";

// ── Defaults ────────────────────────────────────────────────────────

pub const DEFAULT_PROTO: &str = "http";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_REDIS_PORT: u16 = 6379;
pub const DEFAULT_REDIS_NAMESPACE: &str = "ctcache/";
