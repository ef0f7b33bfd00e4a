//! Preprocess driver.
//!
//! Runs the rewritten compiler command and captures its stdout — the
//! canonical preprocessed translation unit that seeds the fingerprint.
//! Anything on stderr means the inputs are not in a state worth
//! caching, so the whole fingerprint is abandoned.

use thiserror::Error;

/// Errors from driving the compiler.
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("no compiler command to run")]
    EmptyCommand,

    #[error("failed to run compiler `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("preprocessor reported errors: {stderr}")]
    CompilerStderr { stderr: String },
}

/// Invoke the rewritten compiler vector and return its stdout bytes.
///
/// The bytes are fed to the hasher exactly as emitted; no decoding or
/// newline normalisation happens here.
pub async fn run_preprocessor(args: &[String]) -> Result<Vec<u8>, PreprocessError> {
    let (command, rest) = args.split_first().ok_or(PreprocessError::EmptyCommand)?;

    let output = tokio::process::Command::new(command)
        .args(rest)
        .output()
        .await
        .map_err(|source| PreprocessError::Spawn {
            command: command.clone(),
            source,
        })?;

    if !output.stderr.is_empty() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(PreprocessError::CompilerStderr { stderr });
    }

    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn captures_stdout() {
        let out = run_preprocessor(&args(&["sh", "-c", "printf 'int x;\\n'"]))
            .await
            .unwrap();
        assert_eq!(out, b"int x;\n");
    }

    #[tokio::test]
    async fn stderr_abandons_the_run() {
        let err = run_preprocessor(&args(&["sh", "-c", "echo oops >&2"]))
            .await
            .unwrap_err();
        match err {
            PreprocessError::CompilerStderr { stderr } => assert_eq!(stderr, "oops"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stderr_wins_even_with_stdout() {
        let err = run_preprocessor(&args(&["sh", "-c", "echo fine; echo bad >&2"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PreprocessError::CompilerStderr { .. }));
    }

    #[tokio::test]
    async fn missing_compiler_is_a_spawn_error() {
        let err = run_preprocessor(&args(&["/no/such/compiler", "-E"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PreprocessError::Spawn { .. }));
    }

    #[tokio::test]
    async fn empty_vector_is_rejected() {
        let err = run_preprocessor(&[]).await.unwrap_err();
        assert!(matches!(err, PreprocessError::EmptyCommand));
    }
}
