//! The single mutable record threaded through the workflow state machine.
//!
//! Every node reads the fields it needs, appends its fact (a code version, an
//! execution record, validation outcomes) and hands the record to routing.
//! History fields are append-only; nothing is mutated in place.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Workflow step kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Planning,
    TestInference,
    CodeGeneration,
    Execution,
    Validation,
    ErrorFixing,
    Complete,
}

/// Why a run reached its terminal state. Exactly one of these is recorded
/// before the run is handed back; there is no ambiguous outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CompletionReason {
    /// All test cases passed.
    Success,
    /// The iteration bound was hit without all tests passing.
    MaxIterationsReached,
    /// A named hard failure (backend fault, validator rejection, missing
    /// prerequisites).
    Failed(String),
}

/// A named input/expected-output pair used to judge generated code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub description: String,
    /// Named inputs passed as keyword arguments to the program entry point.
    pub inputs: BTreeMap<String, Value>,
    /// Expected return value; `None` means the entry point should return null.
    #[serde(default)]
    pub expected_output: Option<Value>,
}

/// One generation attempt's source text. Versions are 1-indexed and strictly
/// increasing; the history is never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeVersion {
    pub version: u32,
    pub code: String,
    /// Iteration during which this version was generated.
    pub iteration: u32,
}

/// Result of running one code version in the sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Code version that was executed.
    pub version: u32,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock seconds up to exit or termination.
    pub duration_secs: f64,
    pub timed_out: bool,
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
}

/// Per-test-case validation outcome, in test-case order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub description: String,
    pub passed: bool,
    /// Stringified actual result, when one was produced.
    pub actual_output: Option<String>,
    pub error: Option<String>,
}

/// Token usage reported by the generation backend for one call.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: f64,
}

/// State threaded through the workflow. Created once per run with
/// `iteration = 1` and empty histories; discarded once complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    // Input configuration.
    pub task: String,
    pub session_id: String,

    // Workflow control.
    pub current_step: Step,
    /// Current iteration (1-indexed).
    pub iteration: u32,
    pub max_iterations: u32,

    // Planning output.
    pub problem_understanding: Option<String>,
    pub approach: Option<String>,

    // Test cases, user-provided or inferred.
    pub test_cases: Vec<TestCase>,
    /// True iff tests were supplied at run creation; immutable for the run.
    pub test_inference_skipped: bool,

    // Code generation.
    pub code_history: Vec<CodeVersion>,
    pub current_code: Option<String>,
    /// Itemized static-validator issues for the last rejected generation
    /// attempt; cleared when an attempt is accepted.
    pub static_rejection: Option<Vec<String>>,

    // Execution and validation.
    pub execution_results: Vec<ExecutionRecord>,
    pub validation_results: Vec<TestOutcome>,
    pub passed_tests: usize,
    pub failed_tests: usize,

    // Error context for fixing.
    pub last_error_analysis: Option<String>,
    pub error_history: Vec<String>,

    // Usage accounting.
    pub token_usage: BTreeMap<String, TokenUsage>,
    pub total_tokens: u64,
    pub estimated_cost_usd: f64,

    // Completion.
    pub is_complete: bool,
    pub final_output: Option<String>,
    pub completion_reason: Option<CompletionReason>,
}

impl WorkflowState {
    /// Create initial state for one run.
    pub fn new(
        task: impl Into<String>,
        session_id: impl Into<String>,
        supplied_tests: Option<Vec<TestCase>>,
        max_iterations: u32,
    ) -> Self {
        let test_inference_skipped = supplied_tests.is_some();
        Self {
            task: task.into(),
            session_id: session_id.into(),
            current_step: Step::Planning,
            iteration: 1,
            max_iterations: max_iterations.max(1),
            problem_understanding: None,
            approach: None,
            test_cases: supplied_tests.unwrap_or_default(),
            test_inference_skipped,
            code_history: Vec::new(),
            current_code: None,
            static_rejection: None,
            execution_results: Vec::new(),
            validation_results: Vec::new(),
            passed_tests: 0,
            failed_tests: 0,
            last_error_analysis: None,
            error_history: Vec::new(),
            token_usage: BTreeMap::new(),
            total_tokens: 0,
            estimated_cost_usd: 0.0,
            is_complete: false,
            final_output: None,
            completion_reason: None,
        }
    }

    /// Append a new code version and make it current. Returns the version.
    pub fn push_code(&mut self, code: String) -> u32 {
        let version = self.code_history.len() as u32 + 1;
        self.code_history.push(CodeVersion {
            version,
            code: code.clone(),
            iteration: self.iteration,
        });
        self.current_code = Some(code);
        self.static_rejection = None;
        version
    }

    /// Mark the run terminal. The first recorded reason wins; later calls are
    /// ignored so no node can overwrite a terminal decision.
    pub fn complete(&mut self, reason: CompletionReason) {
        if self.is_complete {
            return;
        }
        self.is_complete = true;
        self.completion_reason = Some(reason);
    }

    /// Mark the run terminal with a named failure.
    pub fn fail(&mut self, detail: impl Into<String>) {
        self.complete(CompletionReason::Failed(detail.into()));
    }

    /// Record backend usage for one step and roll it into the running totals.
    pub fn record_usage(&mut self, step_key: impl Into<String>, usage: TokenUsage) {
        self.total_tokens += usage.total_tokens;
        self.estimated_cost_usd += usage.cost_usd;
        self.token_usage.insert(step_key.into(), usage);
    }

    /// True once every test case passed for the current code version.
    pub fn all_tests_passed(&self) -> bool {
        !self.test_cases.is_empty() && self.passed_tests == self.test_cases.len()
    }

    pub fn last_execution(&self) -> Option<&ExecutionRecord> {
        self.execution_results.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_starts_at_planning_with_empty_histories() {
        let state = WorkflowState::new("average a list", "s-1", None, 5);
        assert_eq!(state.current_step, Step::Planning);
        assert_eq!(state.iteration, 1);
        assert!(!state.test_inference_skipped);
        assert!(state.code_history.is_empty());
        assert!(!state.is_complete);
        assert_eq!(state.completion_reason, None);
    }

    #[test]
    fn supplied_tests_set_skip_flag() {
        let tests = vec![TestCase {
            description: "basic".to_string(),
            inputs: BTreeMap::new(),
            expected_output: None,
        }];
        let state = WorkflowState::new("t", "s-2", Some(tests), 5);
        assert!(state.test_inference_skipped);
        assert_eq!(state.test_cases.len(), 1);
    }

    #[test]
    fn push_code_versions_are_monotonic() {
        let mut state = WorkflowState::new("t", "s-3", None, 5);
        assert_eq!(state.push_code("a".to_string()), 1);
        assert_eq!(state.push_code("b".to_string()), 2);
        assert_eq!(state.current_code.as_deref(), Some("b"));
        assert_eq!(state.code_history[1].version, 2);
    }

    #[test]
    fn first_completion_reason_wins() {
        let mut state = WorkflowState::new("t", "s-4", None, 5);
        state.complete(CompletionReason::Success);
        state.fail("later failure");
        assert_eq!(state.completion_reason, Some(CompletionReason::Success));
    }

    #[test]
    fn record_usage_accumulates_totals() {
        let mut state = WorkflowState::new("t", "s-5", None, 5);
        state.record_usage(
            "planning",
            TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 20,
                total_tokens: 30,
                cost_usd: 0.003,
            },
        );
        state.record_usage(
            "code_generation_iter_1",
            TokenUsage {
                total_tokens: 70,
                cost_usd: 0.007,
                ..TokenUsage::default()
            },
        );
        assert_eq!(state.total_tokens, 100);
        assert!((state.estimated_cost_usd - 0.01).abs() < 1e-9);
        assert!(state.token_usage.contains_key("planning"));
    }
}
