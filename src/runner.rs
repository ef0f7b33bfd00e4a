//! Hit/miss decision and analyzer execution.
//!
//! The wrapper's contract: a cache hit returns 0 without running the
//! analyzer (replaying stored output in payload mode); a miss runs the
//! analyzer with the verbatim original arguments, forwards its output
//! and exit code, and stores the result only when the run was clean.
//! Cache trouble degrades the wrapper to a pass-through — it never
//! masks an analyzer result.

use std::io::Write;

use thiserror::Error;

use crate::cache::{CacheEngine, CacheError};
use crate::compiledb::CompileDb;
use crate::config::Config;
use crate::fingerprint;
use crate::options::{CompilerSource, WrapOptions};

/// Errors that abort the wrapper itself (exit 1), as opposed to the
/// many conditions that merely disable caching.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("empty analyzer command")]
    EmptyCommand,

    #[error("failed to run analyzer `{command}`: {source}")]
    Analyzer {
        command: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Outcome of one wrapped invocation, for logging and tests.
#[derive(Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Served from cache; the analyzer was not spawned.
    Hit,
    /// The analyzer ran; its result was stored.
    MissStored,
    /// The analyzer ran; the result was not cacheable (or there was no
    /// digest to store under).
    MissUncached,
}

/// Result of a wrapped invocation: the exit code to propagate plus how
/// it came about.
#[derive(Debug)]
pub struct RunResult {
    pub exit_code: i32,
    pub outcome: RunOutcome,
}

/// Execute one wrapped analyzer invocation end to end.
pub async fn run(
    opts: &WrapOptions,
    config: &Config,
    engine: &CacheEngine,
) -> Result<RunResult, RunnerError> {
    let digest = try_compute_digest(opts, config).await;

    if let Some(digest) = &digest {
        if config.save_output {
            if let Some(data) = engine.get_cache_data(digest).await? {
                let mut stdout = std::io::stdout();
                let _ = stdout.write_all(&data);
                let _ = stdout.flush();
                return Ok(RunResult {
                    exit_code: 0,
                    outcome: RunOutcome::Hit,
                });
            }
        }
        if engine.is_cached(digest).await? {
            return Ok(RunResult {
                exit_code: 0,
                outcome: RunOutcome::Hit,
            });
        }
    }

    let (command, rest) = opts
        .original_args
        .split_first()
        .ok_or(RunnerError::EmptyCommand)?;
    let output = tokio::process::Command::new(command)
        .args(rest)
        .output()
        .await
        .map_err(|source| RunnerError::Analyzer {
            command: command.clone(),
            source,
        })?;

    // Forward both streams before any cache work.
    {
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(&output.stdout);
        let _ = stdout.flush();
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(&output.stderr);
        let _ = stderr.flush();
    }

    let exit_code = output.status.code().unwrap_or(1);

    // Diagnostics on stdout mean the "clean" result must not be
    // cached, unless the operator opted out or we store the output
    // itself.
    let tidy_success = exit_code == 0
        && (output.stdout.is_empty() || config.ignore_output || config.save_output);

    let outcome = match (&digest, tidy_success) {
        (Some(digest), true) => {
            if config.save_output {
                engine.store_in_cache_with_data(digest, &output.stdout).await;
            } else {
                engine.store_in_cache(digest).await;
            }
            RunOutcome::MissStored
        }
        _ => RunOutcome::MissUncached,
    };

    Ok(RunResult { exit_code, outcome })
}

/// Compute the fingerprint, recovering the compiler command first.
/// Every failure is logged and yields `None` — the analyzer then runs
/// uncached.
async fn try_compute_digest(opts: &WrapOptions, config: &Config) -> Option<String> {
    let compiler_args = match &opts.compiler {
        CompilerSource::Inline(args) => args.clone(),
        CompilerSource::CompileDb { dir, source } => CompileDb::load(dir)
            .command_for(source)
            .unwrap_or_default(),
        CompilerSource::None => Vec::new(),
    };

    match fingerprint::compute_digest(opts, &compiler_args, config).await {
        Ok(digest) => Some(digest),
        Err(e) => {
            eprintln!("Warning: caching disabled for this invocation: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Env;
    use crate::options::WrapOptions;
    use std::path::Path;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    /// Write an executable shell stub that also records each
    /// invocation by appending to `<name>.calls`.
    fn stub(dir: &Path, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        let calls = dir.join(format!("{name}.calls"));
        let script = format!("#!/bin/sh\necho run >> {}\n{body}\n", calls.display());
        std::fs::write(&path, script).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn call_count(dir: &Path, name: &str) -> usize {
        std::fs::read_to_string(dir.join(format!("{name}.calls")))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    struct Fixture {
        dir: tempfile::TempDir,
        config: Config,
        tidy: String,
        cc: String,
        src: String,
    }

    impl Fixture {
        fn new(tidy_body: &str, extra_env: &[(&str, &str)]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let cache_dir = dir.path().join("cache");
            let mut vars = vec![(
                "CTCACHE_DIR".to_string(),
                cache_dir.to_string_lossy().into_owned(),
            )];
            vars.extend(
                extra_env
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string())),
            );
            let config = Config::from_env(&Env::mock(vars));

            let tidy = stub(dir.path(), "tidy", tidy_body);
            let cc = stub(dir.path(), "cc", "printf 'PP\\n'");
            let src = dir.path().join("foo.cpp");
            std::fs::write(&src, "int main() { return 0; }\n").unwrap();
            let src = src.to_string_lossy().into_owned();

            Self {
                dir,
                config,
                tidy,
                cc,
                src,
            }
        }

        fn opts(&self) -> WrapOptions {
            WrapOptions::from_args(args(&[
                &self.tidy, &self.src, "--", &self.cc, "-c", &self.src,
            ]))
        }

        async fn engine(&self) -> CacheEngine {
            CacheEngine::from_config(&self.config).await
        }

        fn stats(&self) -> String {
            std::fs::read_to_string(self.dir.path().join("cache/stats")).unwrap()
        }
    }

    #[tokio::test]
    async fn cold_miss_then_warm_hit() {
        let fx = Fixture::new("exit 0", &[]);
        let engine = fx.engine().await;

        let first = run(&fx.opts(), &fx.config, &engine).await.unwrap();
        assert_eq!(first.exit_code, 0);
        assert_eq!(first.outcome, RunOutcome::MissStored);
        assert_eq!(call_count(fx.dir.path(), "tidy"), 1);
        assert_eq!(fx.stats(), "0 1\n");

        let second = run(&fx.opts(), &fx.config, &engine).await.unwrap();
        assert_eq!(second.exit_code, 0);
        assert_eq!(second.outcome, RunOutcome::Hit);
        // The analyzer was not spawned again.
        assert_eq!(call_count(fx.dir.path(), "tidy"), 1);
        assert_eq!(fx.stats(), "1 1\n");
    }

    #[tokio::test]
    async fn permuted_duplicate_args_still_hit() {
        let fx = Fixture::new("exit 0", &[]);
        let engine = fx.engine().await;

        let first = WrapOptions::from_args(args(&[
            &fx.tidy, "-quiet", "-checks=*", &fx.src, "--", &fx.cc, "-c", &fx.src,
        ]));
        run(&first, &fx.config, &engine).await.unwrap();

        let second = WrapOptions::from_args(args(&[
            &fx.tidy, "-checks=*", &fx.src, "-quiet", "-checks=*", "--", &fx.cc, "-c",
            &fx.src,
        ]));
        let result = run(&second, &fx.config, &engine).await.unwrap();
        assert_eq!(result.outcome, RunOutcome::Hit);
        assert_eq!(call_count(fx.dir.path(), "tidy"), 1);
    }

    #[tokio::test]
    async fn diagnostics_block_caching() {
        let fx = Fixture::new("echo 'warning: X'", &[]);
        let engine = fx.engine().await;

        let first = run(&fx.opts(), &fx.config, &engine).await.unwrap();
        assert_eq!(first.exit_code, 0);
        assert_eq!(first.outcome, RunOutcome::MissUncached);

        // Still a miss: nothing was stored.
        let second = run(&fx.opts(), &fx.config, &engine).await.unwrap();
        assert_eq!(second.outcome, RunOutcome::MissUncached);
        assert_eq!(call_count(fx.dir.path(), "tidy"), 2);
    }

    #[tokio::test]
    async fn ignore_output_caches_despite_diagnostics() {
        let fx = Fixture::new("echo 'warning: X'", &[("CTCACHE_IGNORE_OUTPUT", "1")]);
        let engine = fx.engine().await;

        let first = run(&fx.opts(), &fx.config, &engine).await.unwrap();
        assert_eq!(first.outcome, RunOutcome::MissStored);

        let second = run(&fx.opts(), &fx.config, &engine).await.unwrap();
        assert_eq!(second.outcome, RunOutcome::Hit);
        assert_eq!(call_count(fx.dir.path(), "tidy"), 1);
    }

    #[tokio::test]
    async fn failing_analyzer_is_never_cached() {
        let fx = Fixture::new("exit 7", &[]);
        let engine = fx.engine().await;

        let first = run(&fx.opts(), &fx.config, &engine).await.unwrap();
        assert_eq!(first.exit_code, 7);
        assert_eq!(first.outcome, RunOutcome::MissUncached);

        let second = run(&fx.opts(), &fx.config, &engine).await.unwrap();
        assert_eq!(second.exit_code, 7);
        assert_eq!(call_count(fx.dir.path(), "tidy"), 2);
    }

    #[tokio::test]
    async fn payload_mode_stores_and_replays_output() {
        let fx = Fixture::new("echo hello", &[("CTCACHE_SAVE_OUTPUT", "1")]);
        let engine = fx.engine().await;

        let first = run(&fx.opts(), &fx.config, &engine).await.unwrap();
        assert_eq!(first.outcome, RunOutcome::MissStored);

        let second = run(&fx.opts(), &fx.config, &engine).await.unwrap();
        assert_eq!(second.exit_code, 0);
        assert_eq!(second.outcome, RunOutcome::Hit);
        assert_eq!(call_count(fx.dir.path(), "tidy"), 1);

        // The stored payload is the analyzer's stdout, byte for byte.
        let digest = try_compute_digest(&fx.opts(), &fx.config).await.unwrap();
        let data = engine.get_cache_data(&digest).await.unwrap().unwrap();
        assert_eq!(data, b"hello\n");
    }

    #[tokio::test]
    async fn unparseable_invocation_runs_uncached() {
        let fx = Fixture::new("exit 0", &[]);
        let engine = fx.engine().await;

        // No `--` tail and no `-p`: no compiler command is recoverable.
        let opts = WrapOptions::from_args(args(&[&fx.tidy, &fx.src]));
        let result = run(&opts, &fx.config, &engine).await.unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.outcome, RunOutcome::MissUncached);
        assert_eq!(call_count(fx.dir.path(), "tidy"), 1);
    }

    #[tokio::test]
    async fn compile_db_mode_round_trips() {
        let fx = Fixture::new("exit 0", &[]);
        let engine = fx.engine().await;

        let build_dir = fx.dir.path().join("build");
        std::fs::create_dir(&build_dir).unwrap();
        std::fs::write(
            build_dir.join("compile_commands.json"),
            format!(
                r#"[{{"file": "{}", "command": "{} -c {}"}}]"#,
                fx.src, fx.cc, fx.src
            ),
        )
        .unwrap();

        let opts = WrapOptions::from_args(args(&[
            &fx.tidy,
            "-p",
            build_dir.to_str().unwrap(),
            &fx.src,
        ]));
        let first = run(&opts, &fx.config, &engine).await.unwrap();
        assert_eq!(first.outcome, RunOutcome::MissStored);

        let second = run(&opts, &fx.config, &engine).await.unwrap();
        assert_eq!(second.outcome, RunOutcome::Hit);
        assert_eq!(call_count(fx.dir.path(), "tidy"), 1);
    }

    #[tokio::test]
    async fn missing_analyzer_is_a_runner_error() {
        let fx = Fixture::new("exit 0", &[]);
        let engine = fx.engine().await;

        let opts = WrapOptions::from_args(args(&[
            "/no/such/analyzer",
            &fx.src,
            "--",
            &fx.cc,
            "-c",
            &fx.src,
        ]));
        let err = run(&opts, &fx.config, &engine).await.unwrap_err();
        assert!(matches!(err, RunnerError::Analyzer { .. }));
    }
}
