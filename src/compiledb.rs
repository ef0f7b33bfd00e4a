//! `compile_commands.json` resolver.
//!
//! Recovers the compiler command for a source file from the build
//! database named by `-p <dir>`. The database is loaded and parsed once
//! per process; a missing or malformed database logs a warning and
//! resolves nothing, which downstream turns into an uncached analyzer
//! run.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::constants;

/// Errors while loading the build database.
#[derive(Debug, Error)]
pub enum CompileDbError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// One translation unit in the database. Exactly one of `command` and
/// `arguments` is usually present.
#[derive(Debug, Deserialize)]
struct Entry {
    file: PathBuf,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    arguments: Option<Vec<String>>,
}

/// A parsed compile database.
#[derive(Debug)]
pub struct CompileDb {
    entries: Vec<Entry>,
}

impl CompileDb {
    /// Load `compile_commands.json` from `dir`. Failures are logged and
    /// produce an empty database.
    pub fn load(dir: &Path) -> Self {
        match Self::try_load(dir) {
            Ok(db) => db,
            Err(e) => {
                eprintln!("Warning: {e}");
                Self {
                    entries: Vec::new(),
                }
            }
        }
    }

    fn try_load(dir: &Path) -> Result<Self, CompileDbError> {
        let path = dir.join(constants::COMPILE_DB_FILENAME);
        let raw = std::fs::read_to_string(&path).map_err(|source| CompileDbError::Read {
            path: path.clone(),
            source,
        })?;
        let entries = serde_json::from_str(&sanitize(&raw))
            .map_err(|source| CompileDbError::Parse { path, source })?;
        Ok(Self { entries })
    }

    /// Recover the shell-split compiler command for `source`.
    ///
    /// Entries match by real-path equality; entries whose `file` no
    /// longer exists are skipped. `command` is preferred over
    /// `arguments[0]`; at most the first match is used.
    pub fn command_for(&self, source: &Path) -> Option<Vec<String>> {
        let wanted = std::fs::canonicalize(source).ok()?;
        self.entries
            .iter()
            .filter(|entry| {
                std::fs::canonicalize(&entry.file)
                    .map(|real| real == wanted)
                    .unwrap_or(false)
            })
            .find_map(|entry| {
                if let Some(command) = &entry.command {
                    return shlex::split(command);
                }
                entry
                    .arguments
                    .as_ref()
                    .and_then(|arguments| arguments.first())
                    .and_then(|first| shlex::split(first))
            })
    }
}

/// Work around malformed databases emitted by some generators: turn
/// escaped quotes into harmless apostrophes, then double every
/// backslash so the text parses as JSON again. A well-formed database
/// round-trips through the parser untouched apart from this rewrite.
fn sanitize(raw: &str) -> String {
    raw.replace("\\\"", "'").replace('\\', "\\\\")
}
