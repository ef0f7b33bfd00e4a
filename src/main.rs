//! ctcache — compiler-wrapper cache for clang-tidy.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation; with `CTCACHE_DEBUG` set the full
//! error chain is printed instead of a one-line message.

use std::process;

use anyhow::{Context, Result};

use ctcache::cache::CacheEngine;
use ctcache::config::Config;
use ctcache::constants;
use ctcache::env::Env;
use ctcache::options::{self, ManagementMode, WrapOptions};
use ctcache::runner;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let env = Env::real();
    let debug = env.is_set(constants::ENV_DEBUG);

    match run(args, &env).await {
        Ok(code) => process::exit(code),
        Err(err) => {
            if debug {
                eprintln!("Error: {err:?}");
            } else {
                eprintln!("Error: {err:#}");
            }
            process::exit(1);
        }
    }
}

async fn run(args: Vec<String>, env: &Env) -> Result<i32> {
    if args.is_empty() {
        print_usage();
        return Ok(1);
    }

    let config = Config::from_env(env);

    if let Some(mode) = options::management_mode(&args) {
        return run_management(mode, &config).await;
    }

    let opts = WrapOptions::from_args(args);
    let engine = CacheEngine::from_config(&config).await;
    let result = runner::run(&opts, &config, &engine)
        .await
        .context("analyzer invocation failed")?;
    Ok(result.exit_code)
}

/// Handle the four management flags.
async fn run_management(mode: ManagementMode, config: &Config) -> Result<i32> {
    match mode {
        ManagementMode::CacheDir => {
            println!("{}", config.cache_dir.display());
        }
        ManagementMode::ShowStats => {
            let engine = CacheEngine::from_config(config).await;
            print!("{}", engine.query_stats().await.render());
        }
        ManagementMode::Clean => {
            let engine = CacheEngine::local_only(config);
            engine
                .local()
                .clean()
                .context("failed to clean the cache directory")?;
        }
        ManagementMode::ZeroStats => {
            let engine = CacheEngine::local_only(config);
            engine
                .local()
                .zero_stats()
                .context("failed to delete the stats file")?;
        }
    }
    Ok(0)
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  {} --cache-dir | --show-stats | --clean | --zero-stats", constants::APP_NAME);
    eprintln!(
        "  {} <clang-tidy> [analyzer args...] -- <compiler args...>",
        constants::APP_NAME
    );
    eprintln!(
        "  {} <clang-tidy> [analyzer args...] -p <build-dir> <source-file>",
        constants::APP_NAME
    );
}
