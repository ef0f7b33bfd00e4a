//! Property-style tests for the fingerprint pipeline.
//!
//! Each test pins one of the digest invariants: determinism, argument
//! order/duplication insensitivity, path normalization, strip-list
//! neutralization, and `-export-fixes` insensitivity.

use std::path::Path;

use ctcache::config::Config;
use ctcache::env::Env;
use ctcache::fingerprint;
use ctcache::options::{CompilerSource, WrapOptions};

fn args(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

fn stub_compiler(dir: &Path, name: &str, text: &str) -> String {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\nprintf '{text}'\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path.to_string_lossy().into_owned()
}

fn write_source(dir: &Path, name: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, "int main() { return 0; }\n").unwrap();
    path.to_string_lossy().into_owned()
}

fn config(vars: &[(&str, &str)]) -> Config {
    Config::from_env(&Env::mock(vars.iter().copied()))
}

async fn digest(opts: &WrapOptions, config: &Config) -> String {
    let compiler_args = match &opts.compiler {
        CompilerSource::Inline(v) => v.clone(),
        other => panic!("expected inline compiler args, got {other:?}"),
    };
    fingerprint::compute_digest(opts, &compiler_args, config)
        .await
        .unwrap()
}

#[tokio::test]
async fn equal_inputs_produce_equal_digests() {
    let dir = tempfile::tempdir().unwrap();
    let cc = stub_compiler(dir.path(), "cc", "PP\\n");
    let src = write_source(dir.path(), "foo.cpp");
    let config = config(&[]);

    let opts = WrapOptions::from_args(args(&[
        "clang-tidy", "-checks=*", &src, "--", &cc, "-c", &src,
    ]));
    assert_eq!(digest(&opts, &config).await, digest(&opts, &config).await);
}

#[tokio::test]
async fn digest_is_forty_hex_characters() {
    let dir = tempfile::tempdir().unwrap();
    let cc = stub_compiler(dir.path(), "cc", "PP\\n");
    let src = write_source(dir.path(), "foo.cpp");
    let config = config(&[]);

    let opts = WrapOptions::from_args(args(&["clang-tidy", &src, "--", &cc, "-c", &src]));
    let d = digest(&opts, &config).await;
    assert_eq!(d.len(), 40);
    assert!(d.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
}

#[tokio::test]
async fn analyzer_arg_permutation_is_neutral() {
    let dir = tempfile::tempdir().unwrap();
    let cc = stub_compiler(dir.path(), "cc", "PP\\n");
    let src = write_source(dir.path(), "foo.cpp");
    let config = config(&[]);

    let a = WrapOptions::from_args(args(&[
        "clang-tidy", "-quiet", "-checks=*", &src, "--", &cc, "-c", &src,
    ]));
    let b = WrapOptions::from_args(args(&[
        "clang-tidy", "-checks=*", &src, "-quiet", "--", &cc, "-c", &src,
    ]));
    assert_eq!(digest(&a, &config).await, digest(&b, &config).await);
}

#[tokio::test]
async fn compiler_arg_permutation_and_duplication_are_neutral() {
    let dir = tempfile::tempdir().unwrap();
    let cc = stub_compiler(dir.path(), "cc", "PP\\n");
    let src = write_source(dir.path(), "foo.cpp");
    let config = config(&[]);

    let a = WrapOptions::from_args(args(&[
        "clang-tidy", &src, "--", &cc, "-Wall", "-O2", "-c", &src,
    ]));
    let b = WrapOptions::from_args(args(&[
        "clang-tidy", &src, "--", &cc, "-O2", "-Wall", "-O2", "-c", &src,
    ]));
    assert_eq!(digest(&a, &config).await, digest(&b, &config).await);
}

#[tokio::test]
async fn symlinked_paths_collide_with_their_target() {
    let dir = tempfile::tempdir().unwrap();
    let cc = stub_compiler(dir.path(), "cc", "PP\\n");
    let src = write_source(dir.path(), "foo.cpp");
    let link = dir.path().join("alias.cpp");
    std::os::unix::fs::symlink(&src, &link).unwrap();
    let link = link.to_string_lossy().into_owned();
    let config = config(&[]);

    let direct = WrapOptions::from_args(args(&["clang-tidy", &src, "--", &cc, "-c", &src]));
    let via_link =
        WrapOptions::from_args(args(&["clang-tidy", &link, "--", &cc, "-c", &link]));
    assert_eq!(digest(&direct, &config).await, digest(&via_link, &config).await);
}

#[tokio::test]
async fn strip_list_erases_configured_substrings() {
    let dir = tempfile::tempdir().unwrap();
    let cc = stub_compiler(dir.path(), "cc", "PP\\n");
    let src = write_source(dir.path(), "foo.cpp");
    let config = config(&[("CTCACHE_STRIP", "/home/alice:/build/123")]);

    let a = WrapOptions::from_args(args(&[
        "clang-tidy",
        "-I/home/alice/proj/include-q",
        &src,
        "--",
        &cc,
        "-c",
        &src,
    ]));
    let b = WrapOptions::from_args(args(&[
        "clang-tidy",
        "-I/proj/include-q",
        &src,
        "--",
        &cc,
        "-c",
        &src,
    ]));
    assert_eq!(digest(&a, &config).await, digest(&b, &config).await);
}

#[tokio::test]
async fn export_fixes_flag_and_value_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let cc = stub_compiler(dir.path(), "cc", "PP\\n");
    let src = write_source(dir.path(), "foo.cpp");
    let config = config(&[]);

    let plain = WrapOptions::from_args(args(&["clang-tidy", &src, "--", &cc, "-c", &src]));
    let with_fixes = WrapOptions::from_args(args(&[
        "clang-tidy",
        "-export-fixes",
        "/tmp/fixes-transient-42.yaml",
        &src,
        "--",
        &cc,
        "-c",
        &src,
    ]));
    assert_eq!(
        digest(&plain, &config).await,
        digest(&with_fixes, &config).await
    );
}

#[tokio::test]
async fn different_preprocessed_text_changes_the_digest() {
    let dir = tempfile::tempdir().unwrap();
    let strip = dir.path().to_string_lossy().into_owned();
    let cc_a = stub_compiler(dir.path(), "cc_a", "VARIANT-A\\n");
    let cc_b = stub_compiler(dir.path(), "cc_b", "VARIANT-B\\n");
    let src = write_source(dir.path(), "foo.cpp");
    let config = config(&[("CTCACHE_STRIP", &strip)]);

    let a = WrapOptions::from_args(args(&["clang-tidy", &src, "--", &cc_a, "-c", &src]));
    let b = WrapOptions::from_args(args(&["clang-tidy", &src, "--", &cc_b, "-c", &src]));
    assert_ne!(digest(&a, &config).await, digest(&b, &config).await);
}

#[tokio::test]
async fn active_clang_tidy_config_changes_the_digest() {
    let dir = tempfile::tempdir().unwrap();
    let strip = dir.path().to_string_lossy().into_owned();
    let cc = stub_compiler(dir.path(), "cc", "PP\\n");
    let src = write_source(dir.path(), "foo.cpp");
    let dir_flag = format!("--directories_with_clang_tidy={}", dir.path().display());
    let config = config(&[("CTCACHE_STRIP", &strip)]);

    let opts = WrapOptions::from_args(args(&[
        "clang-tidy", &src, &dir_flag, "--", &cc, "-c", &src,
    ]));

    std::fs::write(dir.path().join(".clang-tidy"), "Checks: 'modernize-*'\n").unwrap();
    let with_modernize = digest(&opts, &config).await;

    std::fs::write(dir.path().join(".clang-tidy"), "Checks: 'bugprone-*'\n").unwrap();
    let with_bugprone = digest(&opts, &config).await;

    assert_ne!(with_modernize, with_bugprone);
}

#[tokio::test]
async fn non_ancestor_config_directories_are_inert() {
    let dir = tempfile::tempdir().unwrap();
    let strip = dir.path().to_string_lossy().into_owned();
    let cc = stub_compiler(dir.path(), "cc", "PP\\n");
    let src = write_source(dir.path(), "foo.cpp");
    let config = config(&[("CTCACHE_STRIP", &strip)]);

    let elsewhere = tempfile::tempdir().unwrap();
    std::fs::write(elsewhere.path().join(".clang-tidy"), "Checks: 'cert-*'\n").unwrap();
    let dir_flag = format!(
        "--directories_with_clang_tidy={}",
        elsewhere.path().display()
    );

    let without = WrapOptions::from_args(args(&["clang-tidy", &src, "--", &cc, "-c", &src]));
    let with_inert = WrapOptions::from_args(args(&[
        "clang-tidy", &src, &dir_flag, "--", &cc, "-c", &src,
    ]));
    assert_eq!(
        digest(&without, &config).await,
        digest(&with_inert, &config).await
    );
}
