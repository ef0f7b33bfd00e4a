//! Invocation parsing.
//!
//! The wrapper is argv-transparent: apart from four management flags
//! recognised in the first position and one synthetic flag of our own,
//! every argument belongs to the wrapped analyzer and must reach it
//! verbatim on a cache miss. A derive-style CLI parser cannot provide
//! that pass-through guarantee, so parsing is done by hand here.

use std::path::PathBuf;

use crate::constants;

/// Management commands, recognised by inspecting `args[0]` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagementMode {
    /// Print the resolved cache directory.
    CacheDir,
    /// Print cache statistics.
    ShowStats,
    /// Recursively remove the cache directory.
    Clean,
    /// Delete the local stats counters.
    ZeroStats,
}

/// Detect a management invocation. Anything else wraps an analyzer run.
pub fn management_mode(args: &[String]) -> Option<ManagementMode> {
    match args.first().map(String::as_str) {
        Some("--cache-dir") => Some(ManagementMode::CacheDir),
        Some("--show-stats") => Some(ManagementMode::ShowStats),
        Some("--clean") => Some(ManagementMode::Clean),
        Some("--zero-stats") => Some(ManagementMode::ZeroStats),
        _ => None,
    }
}

/// Where the compiler command for the translation unit comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilerSource {
    /// Inline `-- <compiler args>` tail.
    Inline(Vec<String>),
    /// `-p <dir>` pointing at a `compile_commands.json` database.
    CompileDb { dir: PathBuf, source: PathBuf },
    /// No compiler command is recoverable; run the analyzer uncached.
    None,
}

/// A parsed analyzer-wrapping invocation.
#[derive(Debug, Clone)]
pub struct WrapOptions {
    /// The verbatim argument vector (synthetic flag removed), used to
    /// invoke the analyzer on a miss. `original_args[0]` is the
    /// analyzer executable.
    pub original_args: Vec<String>,
    /// The analyzer-arg slice contributing to the fingerprint,
    /// including the executable at index 0.
    pub analyzer_args: Vec<String>,
    /// How to recover the compiler command.
    pub compiler: CompilerSource,
    /// Directories whose `.clang-tidy` files may contribute to the
    /// fingerprint.
    pub config_dirs: Vec<PathBuf>,
}

impl WrapOptions {
    /// Parse an analyzer-wrapping argument vector.
    pub fn from_args(args: Vec<String>) -> Self {
        let (args, config_dirs) = extract_config_dirs(args);

        if let Some(split) = args.iter().position(|a| a == "--") {
            // Inline mode: `[analyzer args] -- [compiler args]`.
            let analyzer_args = args[..split].to_vec();
            let compiler_args = args[split + 1..].to_vec();
            let compiler = if compiler_args.is_empty() {
                CompilerSource::None
            } else {
                CompilerSource::Inline(compiler_args)
            };
            return Self {
                original_args: args,
                analyzer_args,
                compiler,
                config_dirs,
            };
        }

        let compiler = find_compile_db(&args);
        Self {
            analyzer_args: args.clone(),
            original_args: args,
            compiler,
            config_dirs,
        }
    }
}

/// Pull the `--directories_with_clang_tidy=a*b*c` flag out of the
/// vector before anything else looks at it.
fn extract_config_dirs(args: Vec<String>) -> (Vec<String>, Vec<PathBuf>) {
    let mut dirs = Vec::new();
    let remaining = args
        .into_iter()
        .filter(|arg| {
            if let Some(value) = arg.strip_prefix(constants::CONFIG_DIRS_FLAG) {
                dirs.extend(
                    value
                        .split(constants::CONFIG_DIR_SEPARATOR)
                        .filter(|d| !d.is_empty())
                        .map(PathBuf::from),
                );
                false
            } else {
                true
            }
        })
        .collect();
    (remaining, dirs)
}

/// Locate the compile database directory and source file in compile-DB
/// mode: `-p <dir>` (or `-p=<dir>`), then the first non-flag token.
fn find_compile_db(args: &[String]) -> CompilerSource {
    // Normalize `-p=DIR` to `-p DIR` so both spellings match below.
    let args: Vec<String> = args
        .iter()
        .flat_map(|arg| match arg.strip_prefix("-p=") {
            Some(value) => vec!["-p".to_string(), value.to_string()],
            None => vec![arg.clone()],
        })
        .collect();

    let Some(flag_pos) = args.iter().position(|a| a == "-p") else {
        return CompilerSource::None;
    };
    let Some(dir) = args.get(flag_pos + 1) else {
        return CompilerSource::None;
    };

    let source = args[flag_pos + 2..]
        .iter()
        .find(|a| !a.starts_with('-'))
        .map(PathBuf::from);

    match source {
        Some(source) => CompilerSource::CompileDb {
            dir: PathBuf::from(dir),
            source,
        },
        None => CompilerSource::None,
    }
}

/// Rewrite a recovered compiler command so it emits canonical
/// preprocessed output on stdout. Expressed as successive pure
/// transforms over the vector.
pub fn rewrite_for_preprocessing(args: &[String]) -> Vec<String> {
    let args = insert_analyzer_define(args);
    let args = redirect_output_to_stdout(&args);
    let args = preprocess_instead_of_compile(&args);
    suppress_line_markers(&args)
}

/// Insert `-D__clang_analyzer__=1` immediately after the compiler
/// executable, matching what the analyzer itself defines.
fn insert_analyzer_define(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len() + 1);
    let mut it = args.iter();
    if let Some(exe) = it.next() {
        out.push(exe.clone());
        out.push("-D__clang_analyzer__=1".to_string());
    }
    out.extend(it.cloned());
    out
}

/// Replace the argument following `-o` / `--output` with `-`.
fn redirect_output_to_stdout(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut redirect_next = false;
    for arg in args {
        if redirect_next {
            out.push("-".to_string());
            redirect_next = false;
            continue;
        }
        if arg == "-o" || arg == "--output" {
            redirect_next = true;
        }
        out.push(arg.clone());
    }
    out
}

/// Map `-c` to `-E` (preprocess only).
fn preprocess_instead_of_compile(args: &[String]) -> Vec<String> {
    args.iter()
        .map(|a| if a == "-c" { "-E".to_string() } else { a.clone() })
        .collect()
}

/// Insert `-P` after every `-E` to suppress line markers, keeping the
/// preprocessed text stable across file moves.
fn suppress_line_markers(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len() + 1);
    for arg in args {
        let is_preprocess = arg == "-E";
        out.push(arg.clone());
        if is_preprocess {
            out.push("-P".to_string());
        }
    }
    out
}
