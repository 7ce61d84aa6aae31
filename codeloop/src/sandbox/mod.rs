//! Isolated execution of untrusted Python snippets.
//!
//! Every run gets a fresh temporary directory that serves as working
//! directory, HOME, and TMPDIR, and is deleted afterwards regardless of
//! outcome. The child's environment is cleared except for PATH, and
//! PYTHONPATH is blanked so the snippet cannot reach the host's packages.

pub mod process;
pub mod registry;

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::sandbox::process::run_command_with_timeout;
use crate::sandbox::registry::ProcessRegistry;

const SNIPPET_FILE: &str = "snippet.py";

/// One execution request.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub code: String,
    pub stdin: Option<String>,
    pub timeout: Duration,
    /// Session to register the child under for external cancellation.
    pub session: Option<String>,
}

/// Outcome of one execution. `success` means a zero exit without timing out.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration_secs: f64,
    pub timed_out: bool,
}

/// Seam between the workflow and real process execution.
pub trait CodeRunner {
    fn run(&self, request: &ExecRequest) -> Result<ExecOutcome>;
}

/// Runs snippets under a real Python interpreter.
#[derive(Debug)]
pub struct Sandbox {
    python_bin: String,
    output_limit_bytes: usize,
    registry: Arc<ProcessRegistry>,
}

impl Sandbox {
    pub fn new(
        python_bin: impl Into<String>,
        output_limit_bytes: usize,
        registry: Arc<ProcessRegistry>,
    ) -> Self {
        Self {
            python_bin: python_bin.into(),
            output_limit_bytes,
            registry,
        }
    }
}

impl CodeRunner for Sandbox {
    #[instrument(skip_all, fields(session = request.session.as_deref().unwrap_or("-")))]
    fn run(&self, request: &ExecRequest) -> Result<ExecOutcome> {
        let dir = tempfile::tempdir().context("create sandbox dir")?;
        let snippet: PathBuf = dir.path().join(SNIPPET_FILE);
        std::fs::write(&snippet, &request.code).context("write snippet")?;

        let mut cmd = Command::new(&self.python_bin);
        cmd.arg(&snippet).current_dir(dir.path()).env_clear();
        if let Ok(path) = std::env::var("PATH") {
            cmd.env("PATH", path);
        }
        cmd.env("PYTHONPATH", "")
            .env("HOME", dir.path())
            .env("TMPDIR", dir.path());

        let registry = Arc::clone(&self.registry);
        let session = request.session.clone();
        let output = run_command_with_timeout(
            cmd,
            request.stdin.as_deref().map(str::as_bytes),
            request.timeout,
            self.output_limit_bytes,
            |pid| {
                if let Some(session) = &session {
                    registry.register(session, pid);
                }
            },
        );
        if let Some(session) = &request.session {
            self.registry.unregister(session);
        }
        let output = output.context("run snippet")?;

        debug!(
            exit_code = ?output.status.code(),
            timed_out = output.timed_out,
            duration_secs = output.elapsed.as_secs_f64(),
            "snippet finished"
        );
        Ok(ExecOutcome {
            success: output.status.success() && !output.timed_out,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
            duration_secs: output.elapsed.as_secs_f64(),
            timed_out: output.timed_out,
        })
    }
}

/// Result of one assertion in a batch run.
#[derive(Debug, Clone, Deserialize)]
pub struct AssertionResult {
    pub index: usize,
    pub assertion: String,
    pub passed: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Run a list of assertion expressions against the code in a single
/// interpreter invocation. Each assertion is evaluated independently; one
/// failure does not stop the rest. Fail-closed: when the structured result
/// line cannot be parsed, every assertion in the batch is reported failed.
pub fn run_assertion_batch<R: CodeRunner>(
    runner: &R,
    code: &str,
    assertions: &[String],
    timeout: Duration,
) -> Result<(ExecOutcome, Vec<AssertionResult>)> {
    let assertions_json =
        serde_json::to_string(assertions).context("serialize assertions")?;
    let assertions_literal = python_string_literal(&assertions_json);
    let program = format!(
        "{code}\n\n\
         import json as _json\n\
         _results = []\n\
         for _i, _a in enumerate(_json.loads({assertions_literal})):\n\
         \x20   try:\n\
         \x20       assert eval(_a), 'assertion is false'\n\
         \x20       _results.append({{'index': _i, 'assertion': _a, 'passed': True}})\n\
         \x20   except Exception as _e:\n\
         \x20       _results.append({{'index': _i, 'assertion': _a, 'passed': False, 'error': str(_e)}})\n\
         print(_json.dumps(_results))\n"
    );

    let outcome = runner.run(&ExecRequest {
        code: program,
        stdin: None,
        timeout,
        session: None,
    })?;

    let last_line = outcome
        .stdout
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("");
    let results: Vec<AssertionResult> = match serde_json::from_str(last_line) {
        Ok(results) => results,
        Err(_) => assertions
            .iter()
            .enumerate()
            .map(|(index, assertion)| AssertionResult {
                index,
                assertion: assertion.clone(),
                passed: false,
                error: Some("could not parse test results".to_string()),
            })
            .collect(),
    };
    Ok((outcome, results))
}

/// Encode a string as a Python string literal. JSON string syntax is a
/// subset of Python's, so the encoded form is safe to splice into source no
/// matter what the payload contains (quotes, backslashes, newlines).
pub(crate) fn python_string_literal(value: &str) -> String {
    serde_json::to_string(value).expect("encode string literal")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedRunner, ok_outcome};

    #[test]
    fn assertion_batch_parses_the_last_stdout_line() {
        let runner = ScriptedRunner::new(vec![ok_outcome(
            "noise\n[{\"index\":0,\"assertion\":\"main(2) == 4\",\"passed\":true},\
             {\"index\":1,\"assertion\":\"main(3) == 10\",\"passed\":false,\"error\":\"assertion is false\"}]\n",
        )]);
        let (outcome, results) = run_assertion_batch(
            &runner,
            "def main(x):\n    return x * 2\n",
            &["main(2) == 4".to_string(), "main(3) == 10".to_string()],
            Duration::from_secs(5),
        )
        .expect("batch");
        assert!(outcome.success);
        assert_eq!(results.len(), 2);
        assert!(results[0].passed);
        assert!(!results[1].passed);
        assert_eq!(results[1].error.as_deref(), Some("assertion is false"));
    }

    #[test]
    fn assertion_batch_marks_every_assertion_failed_on_garbage_output() {
        let runner = ScriptedRunner::new(vec![ok_outcome("garbage, not json\n")]);
        let assertions = vec!["main() == 1".to_string(), "main() == 2".to_string()];
        let (_, results) = run_assertion_batch(
            &runner,
            "def main():\n    return 1\n",
            &assertions,
            Duration::from_secs(5),
        )
        .expect("batch");
        assert_eq!(results.len(), assertions.len());
        for (index, result) in results.iter().enumerate() {
            assert_eq!(result.index, index);
            assert_eq!(result.assertion, assertions[index]);
            assert!(!result.passed);
            assert_eq!(result.error.as_deref(), Some("could not parse test results"));
        }
    }

    #[test]
    fn python_string_literal_escapes_quotes_and_backslashes() {
        assert_eq!(python_string_literal("plain"), "\"plain\"");
        assert_eq!(python_string_literal("a'''b"), "\"a'''b\"");
        assert_eq!(python_string_literal("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }
}
