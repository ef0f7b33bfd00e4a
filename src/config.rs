//! Wrapper configuration snapshot.
//!
//! Every knob comes from `CTCACHE_*` environment variables; there is no
//! config file. [`Config::from_env`] reads the environment once at
//! startup into typed, read-only sections. Invalid values are reported
//! with a warning and replaced by their defaults — a bad environment
//! must never break the wrapped analyzer invocation.

use std::path::PathBuf;

use regex::Regex;

use crate::constants;
use crate::env::Env;

/// Top-level configuration, immutable after construction.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the local filesystem cache.
    pub cache_dir: PathBuf,
    /// Substrings deleted from every hashed token.
    pub strip_list: Vec<String>,
    /// Store and replay the analyzer's stdout (payload mode).
    pub save_output: bool,
    /// Cache results even when the analyzer produced diagnostics.
    pub ignore_output: bool,
    /// Propagate internal errors with full detail instead of a one-line log.
    pub debug: bool,
    /// Mirror every hashed byte into the audit dump file.
    pub dump: bool,
    /// Directory holding the audit dump file.
    pub dump_dir: PathBuf,
    /// Arg tokens matching this pattern are excluded from the digest.
    pub exclude_hash_regex: Option<Regex>,
    pub http: Option<HttpConfig>,
    pub redis: Option<RedisConfig>,
    pub s3: Option<BucketConfig>,
    pub gcs: Option<BucketConfig>,
}

/// Endpoint of the companion HTTP cache server.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub proto: String,
    pub host: String,
    pub port: u16,
}

impl HttpConfig {
    /// Base URL without a trailing slash, e.g. `http://cache.lan:5000`.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.proto, self.host, self.port)
    }
}

/// Redis tier connection settings.
#[derive(Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Key prefix; every cache key is `<namespace><digest>`.
    pub namespace: String,
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// Object-store tier settings, shared by the S3 and GCS adapters.
#[derive(Debug, Clone)]
pub struct BucketConfig {
    pub bucket: String,
    /// Optional key prefix inside the bucket.
    pub folder: Option<String>,
    /// Unsigned/anonymous access: reads allowed, writes silently skipped.
    pub no_credentials: bool,
}

impl Config {
    /// Snapshot the process environment into a configuration.
    pub fn from_env(env: &Env) -> Self {
        let cache_dir = match env.var(constants::ENV_DIR) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => default_cache_dir(env),
        };

        let strip_list = env
            .var(constants::ENV_STRIP)
            .map(|v| {
                v.split(':')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let exclude_hash_regex = env
            .var(constants::ENV_EXCLUDE_HASH_REGEX)
            .ok()
            .and_then(|pattern| match Regex::new(&pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    eprintln!(
                        "Warning: ignoring invalid {} value: {e}",
                        constants::ENV_EXCLUDE_HASH_REGEX
                    );
                    None
                }
            });

        let dump_dir = env
            .var(constants::ENV_DUMP_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir());

        Self {
            cache_dir,
            strip_list,
            save_output: env.flag(constants::ENV_SAVE_OUTPUT),
            ignore_output: env.is_set(constants::ENV_IGNORE_OUTPUT),
            debug: env.is_set(constants::ENV_DEBUG),
            dump: env.is_set(constants::ENV_DUMP),
            dump_dir,
            exclude_hash_regex,
            http: http_from_env(env),
            redis: redis_from_env(env),
            s3: bucket_from_env(
                env,
                constants::ENV_S3_BUCKET,
                constants::ENV_S3_FOLDER,
                constants::ENV_S3_NO_CREDENTIALS,
            ),
            gcs: bucket_from_env(
                env,
                constants::ENV_GCS_BUCKET,
                constants::ENV_GCS_FOLDER,
                constants::ENV_GCS_NO_CREDENTIALS,
            ),
        }
    }
}

/// `<tmp>/ctcache-<username>`, with `unknown` when the username cannot
/// be resolved.
fn default_cache_dir(env: &Env) -> PathBuf {
    let user = env
        .var("USER")
        .or_else(|_| env.var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    std::env::temp_dir().join(format!("{}-{user}", constants::APP_NAME))
}

fn http_from_env(env: &Env) -> Option<HttpConfig> {
    let host = env.var(constants::ENV_HOST).ok()?;
    let proto = env
        .var(constants::ENV_PROTO)
        .unwrap_or_else(|_| constants::DEFAULT_PROTO.to_string());
    let port = parse_port(env, constants::ENV_PORT, constants::DEFAULT_PORT);
    Some(HttpConfig { proto, host, port })
}

fn redis_from_env(env: &Env) -> Option<RedisConfig> {
    let host = env.var(constants::ENV_REDIS_HOST).ok()?;
    Some(RedisConfig {
        host,
        port: parse_port(env, constants::ENV_REDIS_PORT, constants::DEFAULT_REDIS_PORT),
        username: env.var(constants::ENV_REDIS_USERNAME).ok(),
        password: env.var(constants::ENV_REDIS_PASSWORD).ok(),
        namespace: env
            .var(constants::ENV_REDIS_NAMESPACE)
            .unwrap_or_else(|_| constants::DEFAULT_REDIS_NAMESPACE.to_string()),
    })
}

fn bucket_from_env(
    env: &Env,
    bucket_var: &str,
    folder_var: &str,
    no_credentials_var: &str,
) -> Option<BucketConfig> {
    let bucket = env.var(bucket_var).ok()?;
    Some(BucketConfig {
        bucket,
        folder: env.var(folder_var).ok().filter(|f| !f.is_empty()),
        no_credentials: env.flag(no_credentials_var),
    })
}

fn parse_port(env: &Env, var: &str, default: u16) -> u16 {
    match env.var(var) {
        Ok(raw) => match raw.parse() {
            Ok(port) => port,
            Err(_) => {
                eprintln!("Warning: ignoring invalid {var} value: {raw}");
                default
            }
        },
        Err(_) => default,
    }
}
