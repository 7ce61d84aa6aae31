//! Error-context assembly for the fixing path.
//!
//! The string built here is the sole carrier of failure context into the next
//! generation attempt. Sections are ordered: static-validator issues (when the
//! last attempt was rejected), execution error detail, then per-failed-test
//! detail. When both execution and validation failures exist, both sections
//! are included.

use std::fmt::Write as _;

use serde_json::Value;

use crate::core::state::WorkflowState;

/// Build the diagnosis context for the current failure.
pub fn build_error_context(state: &WorkflowState) -> String {
    let mut out = String::new();

    if let Some(issues) = &state.static_rejection {
        out.push_str("**Static Validation Issues:**\n");
        for issue in issues {
            let _ = writeln!(out, "- {issue}");
        }
    }

    if let Some(last) = state.last_execution()
        && !last.success
    {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("**Execution Error:**\n");
        if last.timed_out {
            let _ = writeln!(out, "- Code timed out after {:.1}s", last.duration_secs);
            out.push_str("- This usually means an infinite loop or a very inefficient algorithm\n");
        } else {
            match last.exit_code {
                Some(code) => {
                    let _ = writeln!(out, "- Exit code: {code}");
                }
                None => out.push_str("- Process was killed before exiting\n"),
            }
            let _ = writeln!(out, "- Error: {}", last.stderr.trim_end());
        }
    }

    if state.failed_tests > 0 && !state.validation_results.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = writeln!(
            out,
            "**Validation Errors:** {}/{} tests failed",
            state.failed_tests,
            state.test_cases.len()
        );
        for (index, result) in state.validation_results.iter().enumerate() {
            if result.passed {
                continue;
            }
            let _ = writeln!(out, "\nFailed Test {}: {}", index + 1, result.description);
            if let Some(case) = state.test_cases.get(index) {
                let _ = writeln!(out, "  Inputs: {}", render_inputs(case));
                let _ = writeln!(out, "  Expected: {}", render_expected(case));
            }
            if let Some(actual) = &result.actual_output {
                let _ = writeln!(out, "  Actual: {actual}");
            }
            if let Some(error) = &result.error {
                let _ = writeln!(out, "  Error: {error}");
            }
        }
    }

    out
}

fn render_inputs(case: &crate::core::state::TestCase) -> String {
    serde_json::to_string(&case.inputs).unwrap_or_else(|_| "{}".to_string())
}

fn render_expected(case: &crate::core::state::TestCase) -> String {
    match &case.expected_output {
        Some(value) => value.to_string(),
        None => Value::Null.to_string(),
    }
}
