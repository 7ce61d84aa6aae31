//! The six workflow nodes.
//!
//! Nodes are infallible: a backend or sandbox fault is absorbed into the
//! state as a terminal failure (or a failed record), and routing decides
//! what happens next. Only the orchestrator returns errors, and only for
//! invariant violations.

use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::config::LoopConfig;
use crate::core::diagnosis::build_error_context;
use crate::core::state::{CompletionReason, ExecutionRecord, WorkflowState};
use crate::harness::run_test_cases;
use crate::llm::{GenerateRequest, Generator, OutputSchema};
use crate::sandbox::{CodeRunner, ExecRequest};
use crate::validator::validate_code;
use crate::workflow::prompts;

#[instrument(skip_all, fields(session = %state.session_id))]
pub fn planning<G: Generator>(generator: &G, state: &mut WorkflowState) {
    let request = GenerateRequest {
        system: prompts::PLANNING_SYSTEM.to_string(),
        prompt: prompts::planning_prompt(&state.task),
        schema: OutputSchema::Planning,
    };
    let reply = match generator.generate(&request) {
        Ok(reply) => reply,
        Err(e) => return state.fail(format!("planning failed: {e:#}")),
    };
    state.record_usage("planning", reply.usage);

    let Some(plan) = reply.output.as_planning() else {
        return state.fail("planning returned the wrong output kind");
    };
    state.problem_understanding = Some(plan.problem_understanding.clone());
    state.approach = Some(plan.approach.clone());
}

#[instrument(skip_all, fields(session = %state.session_id))]
pub fn test_inference<G: Generator>(generator: &G, state: &mut WorkflowState) {
    if state.test_inference_skipped {
        return;
    }
    let request = GenerateRequest {
        system: prompts::TEST_INFERENCE_SYSTEM.to_string(),
        prompt: prompts::test_inference_prompt(
            &state.task,
            state.problem_understanding.as_deref().unwrap_or(""),
            state.approach.as_deref().unwrap_or(""),
        ),
        schema: OutputSchema::TestInference,
    };
    let reply = match generator.generate(&request) {
        Ok(reply) => reply,
        Err(e) => return state.fail(format!("test inference failed: {e:#}")),
    };
    state.record_usage("test_inference", reply.usage);

    let Some(inferred) = reply.output.as_tests() else {
        return state.fail("test inference returned the wrong output kind");
    };
    info!(count = inferred.test_cases.len(), "inferred test cases");
    state.test_cases = inferred.test_cases.clone();
}

#[instrument(skip_all, fields(session = %state.session_id, iteration = state.iteration))]
pub fn code_generation<G: Generator>(generator: &G, state: &mut WorkflowState) {
    let request = GenerateRequest {
        system: prompts::CODE_GENERATION_SYSTEM.to_string(),
        prompt: prompts::code_generation_prompt(state),
        schema: OutputSchema::Code,
    };
    let reply = match generator.generate(&request) {
        Ok(reply) => reply,
        Err(e) => return state.fail(format!("code generation failed: {e:#}")),
    };
    let usage_key = format!("code_generation_iter_{}", state.iteration);
    state.record_usage(usage_key, reply.usage);

    let Some(output) = reply.output.as_code() else {
        return state.fail("code generation returned the wrong output kind");
    };

    let rendered_inputs: Vec<String> = state
        .test_cases
        .iter()
        .filter_map(|test| serde_json::to_string(&test.inputs).ok())
        .collect();
    let report = validate_code(&output.code, &rendered_inputs);
    for warning in &report.warnings {
        warn!(%warning, "static validation warning");
    }
    for pattern in &report.suspicious_patterns {
        warn!(%pattern, "suspicious pattern");
    }
    if !report.is_valid {
        info!(issues = report.issues.len(), "generated code rejected");
        state.static_rejection = Some(report.issues);
        return;
    }

    let version = state.push_code(output.code.clone());
    info!(version, "accepted generated code");
}

#[instrument(skip_all, fields(session = %state.session_id, iteration = state.iteration))]
pub fn execution<R: CodeRunner>(runner: &R, config: &LoopConfig, state: &mut WorkflowState) {
    let Some(code) = state.current_code.clone() else {
        return state.fail("no code generated");
    };
    let version = state.code_history.len() as u32;

    let outcome = runner.run(&ExecRequest {
        code,
        stdin: None,
        timeout: Duration::from_secs(config.execution_timeout_secs),
        session: Some(state.session_id.clone()),
    });
    let record = match outcome {
        Ok(exec) => ExecutionRecord {
            version,
            success: exec.success,
            stdout: exec.stdout,
            stderr: exec.stderr,
            duration_secs: exec.duration_secs,
            timed_out: exec.timed_out,
            exit_code: exec.exit_code,
        },
        Err(e) => ExecutionRecord {
            version,
            success: false,
            stdout: String::new(),
            stderr: format!("sandbox error: {e:#}"),
            duration_secs: 0.0,
            timed_out: false,
            exit_code: None,
        },
    };
    info!(
        version,
        success = record.success,
        timed_out = record.timed_out,
        "execution finished"
    );
    state.execution_results.push(record);
}

#[instrument(skip_all, fields(session = %state.session_id, iteration = state.iteration))]
pub fn validation<R: CodeRunner>(runner: &R, config: &LoopConfig, state: &mut WorkflowState) {
    let Some(code) = state.current_code.clone() else {
        return state.fail("no code generated");
    };
    if state.test_cases.is_empty() {
        return state.fail("no test cases available");
    }
    let Some(last) = state.last_execution() else {
        return state.fail("no execution results to validate");
    };

    if !last.success {
        // The bare run already failed; running tests would only repeat it.
        state.validation_results = Vec::new();
        state.passed_tests = 0;
        state.failed_tests = state.test_cases.len();
    } else {
        let report = run_test_cases(
            runner,
            &code,
            &state.test_cases,
            Duration::from_secs(config.execution_timeout_secs),
            Some(&state.session_id),
        );
        state.passed_tests = report.passed as usize;
        state.failed_tests = report.failed as usize;
        state.validation_results = report.outcomes;
    }
    info!(
        passed = state.passed_tests,
        failed = state.failed_tests,
        "validation finished"
    );

    if state.all_tests_passed() {
        state.final_output = state.last_execution().map(|exec| exec.stdout.clone());
        state.complete(CompletionReason::Success);
    } else if state.iteration >= state.max_iterations {
        state.complete(CompletionReason::MaxIterationsReached);
    }
}

#[instrument(skip_all, fields(session = %state.session_id, iteration = state.iteration))]
pub fn error_fixing<G: Generator>(generator: &G, state: &mut WorkflowState) {
    if state.iteration >= state.max_iterations {
        state.complete(CompletionReason::MaxIterationsReached);
        return;
    }

    let error_context = build_error_context(state);
    let request = GenerateRequest {
        system: prompts::ERROR_ANALYSIS_SYSTEM.to_string(),
        prompt: prompts::error_analysis_prompt(state, &error_context),
        schema: OutputSchema::ErrorAnalysis,
    };
    let reply = match generator.generate(&request) {
        Ok(reply) => reply,
        Err(e) => return state.fail(format!("error analysis failed: {e:#}")),
    };
    let usage_key = format!("error_fixing_iter_{}", state.iteration);
    state.record_usage(usage_key, reply.usage);

    let Some(analysis) = reply.output.as_analysis() else {
        return state.fail("error analysis returned the wrong output kind");
    };
    let summary = format!(
        "Root Cause: {}\n\nSuggested Fix: {}",
        analysis.root_cause, analysis.suggested_fix
    );
    state.error_history.push(summary.clone());
    state.last_error_analysis = Some(summary);
    state.iteration += 1;
    info!(iteration = state.iteration, "starting next iteration");
}
