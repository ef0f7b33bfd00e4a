//! Fingerprint builder.
//!
//! Folds everything that can influence the analyzer's output into one
//! SHA-1 digest: the preprocessed translation unit, the applicable
//! `.clang-tidy` configuration, and the analyzer/compiler argument
//! sets. Strict normalization makes cosmetically-different but
//! semantically-identical invocations collide:
//!
//! - tokens are trimmed, unquoted, real-pathed, and run through the
//!   operator strip list;
//! - argument sets are deduplicated and sorted, so reorderings and
//!   duplicates do not cause misses;
//! - `-export-fixes <path>` is dropped entirely — it changes file
//!   system side effects, not diagnostics.

pub mod hasher;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::Config;
use crate::constants;
use crate::options::{self, WrapOptions};
use crate::preprocess::{self, PreprocessError};

use self::hasher::Hasher;

/// Source-file extensions eligible for translation-unit detection.
const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx", "h", "hpp"];

/// Reasons the fingerprint was abandoned. All of them downgrade the
/// invocation to an uncached analyzer run.
#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("no compiler command could be recovered")]
    NoCompilerCommand,

    #[error("no source file found among analyzer arguments")]
    NoSourceFile,

    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error("failed to read {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Compute the cache digest for one analyzer invocation.
///
/// `compiler_args` is the recovered (un-rewritten) compiler command.
/// The feeding order is fixed: preprocessed bytes, configuration
/// files, analyzer args, compiler args.
pub async fn compute_digest(
    opts: &WrapOptions,
    compiler_args: &[String],
    config: &Config,
) -> Result<String, FingerprintError> {
    let (_, compiler_rest) = compiler_args
        .split_first()
        .ok_or(FingerprintError::NoCompilerCommand)?;
    let source =
        find_source_file(&opts.analyzer_args).ok_or(FingerprintError::NoSourceFile)?;

    let rewritten = options::rewrite_for_preprocessing(compiler_args);
    let preprocessed = preprocess::run_preprocessor(&rewritten).await?;

    let mut hasher = Hasher::new(config);
    hasher.update(&preprocessed);

    for path in active_config_files(&source, &opts.config_dirs) {
        hash_config_file(&mut hasher, &path, &config.strip_list)?;
    }

    let analyzer_rest = opts.analyzer_args.get(1..).unwrap_or_default();
    hash_arg_set(&mut hasher, &drop_export_fixes(analyzer_rest), config);
    hash_arg_set(&mut hasher, compiler_rest, config);

    Ok(hasher.hexdigest())
}

/// The translation unit is the first analyzer argument (past the
/// executable) that exists on disk and carries a C/C++ extension.
pub fn find_source_file(analyzer_args: &[String]) -> Option<PathBuf> {
    analyzer_args.iter().skip(1).find_map(|arg| {
        let path = Path::new(arg);
        if !path.is_file() {
            return None;
        }
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        SOURCE_EXTENSIONS
            .contains(&extension.as_str())
            .then(|| path.to_path_buf())
    })
}

/// `.clang-tidy` files that apply to `source`: one per configured
/// directory that is an ancestor (inclusive) of the source file,
/// visited in lexicographic path order.
pub fn active_config_files(source: &Path, config_dirs: &[PathBuf]) -> Vec<PathBuf> {
    let Ok(source) = std::fs::canonicalize(source) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = config_dirs
        .iter()
        .filter_map(|dir| {
            let dir = std::fs::canonicalize(dir).ok()?;
            source.starts_with(&dir).then(|| dir.join(constants::CLANG_TIDY_FILENAME))
        })
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files.dedup();
    files
}

/// Drop `-export-fixes` together with its value.
fn drop_export_fixes(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "-export-fixes" {
            skip_next = true;
            continue;
        }
        out.push(arg.clone());
    }
    out
}

/// Feed a normalized, deduplicated, sorted argument set.
fn hash_arg_set(hasher: &mut Hasher, args: &[String], config: &Config) {
    let normalized: BTreeSet<String> = args
        .iter()
        .filter(|arg| {
            config
                .exclude_hash_regex
                .as_ref()
                .map(|re| !re.is_match(arg))
                .unwrap_or(true)
        })
        .filter_map(|arg| normalize_token(arg, &config.strip_list))
        .collect();
    for token in normalized {
        hasher.update(token.as_bytes());
    }
}

/// Feed one `.clang-tidy` file: comment lines are skipped, every other
/// line is whitespace-tokenized and each token normalized.
fn hash_config_file(
    hasher: &mut Hasher,
    path: &Path,
    strip_list: &[String],
) -> Result<(), FingerprintError> {
    let content = std::fs::read_to_string(path).map_err(|source| {
        FingerprintError::ConfigRead {
            path: path.to_path_buf(),
            source,
        }
    })?;
    for line in content.lines() {
        if line.starts_with("# ") {
            continue;
        }
        for token in line.split_whitespace() {
            if let Some(normalized) = normalize_token(token, strip_list) {
                hasher.update(normalized.as_bytes());
            }
        }
    }
    Ok(())
}

/// Normalize one token contributing to the digest.
///
/// Trims whitespace and surrounding double quotes, resolves existing
/// paths to their real path, deletes every strip-list substring, and
/// discards tokens that end up empty.
pub fn normalize_token(token: &str, strip_list: &[String]) -> Option<String> {
    let trimmed = token.trim().trim_matches('"');

    let mut normalized = match std::fs::canonicalize(trimmed) {
        Ok(real) => real.to_string_lossy().into_owned(),
        Err(_) => trimmed.to_string(),
    };

    for strip in strip_list {
        if !strip.is_empty() {
            normalized = normalized.replace(strip, "");
        }
    }

    (!normalized.is_empty()).then_some(normalized)
}
