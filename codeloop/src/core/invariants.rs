//! Semantic invariants over the workflow state.
//!
//! Checked after every node by the orchestrator; a violation is a bug in the
//! loop, not a recoverable run failure.

use crate::core::state::WorkflowState;

/// Check state invariants:
/// - `iteration` is 1-indexed and never exceeds `max_iterations`
/// - code versions are strictly increasing and dense (1..=len)
/// - execution records reference existing code versions
/// - once validation produced per-test results, `passed + failed == tests`
/// - a complete run always carries a completion reason
pub fn validate_state(state: &WorkflowState) -> Vec<String> {
    let mut errors = Vec::new();

    if state.iteration == 0 {
        errors.push("iteration must be 1-indexed".to_string());
    }
    if state.iteration > state.max_iterations {
        errors.push(format!(
            "iteration {} exceeds max_iterations {}",
            state.iteration, state.max_iterations
        ));
    }

    for (index, version) in state.code_history.iter().enumerate() {
        let expected = index as u32 + 1;
        if version.version != expected {
            errors.push(format!(
                "code version {} at position {} (expected {})",
                version.version, index, expected
            ));
        }
    }

    let versions = state.code_history.len() as u32;
    for record in &state.execution_results {
        if record.version == 0 || record.version > versions {
            errors.push(format!(
                "execution record references unknown code version {}",
                record.version
            ));
        }
    }

    if !state.validation_results.is_empty()
        && state.passed_tests + state.failed_tests != state.test_cases.len()
    {
        errors.push(format!(
            "passed {} + failed {} != {} test cases",
            state.passed_tests,
            state.failed_tests,
            state.test_cases.len()
        ));
    }

    if state.is_complete && state.completion_reason.is_none() {
        errors.push("complete run is missing a completion reason".to_string());
    }

    errors
}
