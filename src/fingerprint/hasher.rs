//! Streaming SHA-1 accumulator with an optional audit dump.
//!
//! The dump file lets operators diff two digest computations
//! byte-for-byte: when enabled, every byte fed to the hasher is also
//! appended to `<dump-dir>/ctcache.dump`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use sha1::{Digest, Sha1};

use crate::config::Config;
use crate::constants;

/// Streaming fingerprint accumulator.
///
/// The dump file is owned by the hasher: opened on construction,
/// flushed when the digest is taken or the hasher is dropped.
pub struct Hasher {
    inner: Sha1,
    dump: Option<File>,
}

impl Hasher {
    /// Create a hasher, opening the audit dump when configured.
    pub fn new(config: &Config) -> Self {
        let dump = config
            .dump
            .then(|| open_dump(&config.dump_dir))
            .flatten();
        Self {
            inner: Sha1::new(),
            dump,
        }
    }

    /// Create a hasher with no dump, regardless of configuration.
    pub fn without_dump() -> Self {
        Self {
            inner: Sha1::new(),
            dump: None,
        }
    }

    /// Feed bytes into the fingerprint.
    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
        if let Some(dump) = &mut self.dump {
            if let Err(e) = dump.write_all(bytes) {
                eprintln!("Warning: failed to write hasher dump: {e}");
                self.dump = None;
            }
        }
    }

    /// Finish the digest, returning 40 lowercase hex characters.
    pub fn hexdigest(mut self) -> String {
        if let Some(dump) = &mut self.dump {
            let _ = dump.flush();
        }
        hex::encode(self.inner.finalize())
    }
}

fn open_dump(dir: &Path) -> Option<File> {
    let path = dir.join(constants::DUMP_FILENAME);
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!(
                "Warning: failed to open hasher dump {}: {e}",
                path.display()
            );
            None
        }
    }
}
