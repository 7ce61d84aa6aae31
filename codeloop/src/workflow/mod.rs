//! Workflow orchestrator.
//!
//! Drives the state machine: run the node for the current step, route to the
//! next step, check state invariants, and report progress through the
//! `on_step` callback. The loop ends only at [`Step::Complete`], which every
//! path reaches within the iteration bound.

pub mod nodes;
pub mod prompts;

use anyhow::{Result, bail};
use tracing::{info, instrument};

use crate::config::LoopConfig;
use crate::core::invariants::validate_state;
use crate::core::state::{Step, TestCase, WorkflowState};
use crate::core::step::{
    route_after_code_generation, route_after_error_fixing, route_after_execution,
    route_after_planning, route_after_test_inference, route_after_validation,
};
use crate::llm::Generator;
use crate::sandbox::CodeRunner;

/// Everything needed to start one run.
#[derive(Debug, Clone)]
pub struct WorkflowRequest {
    pub task: String,
    pub session_id: String,
    /// Supplied test cases; `None` enables test inference.
    pub tests: Option<Vec<TestCase>>,
    pub max_iterations: u32,
}

/// Run a workflow to completion. `on_step` is called after every executed
/// node with the step that ran and the state as it stands.
#[instrument(skip_all, fields(session = %request.session_id))]
pub fn run_workflow<G, R, F>(
    generator: &G,
    runner: &R,
    config: &LoopConfig,
    request: WorkflowRequest,
    mut on_step: F,
) -> Result<WorkflowState>
where
    G: Generator,
    R: CodeRunner,
    F: FnMut(Step, &WorkflowState),
{
    let mut state = WorkflowState::new(
        request.task,
        request.session_id,
        request.tests,
        request.max_iterations,
    );
    info!(
        max_iterations = state.max_iterations,
        supplied_tests = state.test_inference_skipped,
        "starting workflow"
    );

    loop {
        let step = state.current_step;
        let next = match step {
            Step::Planning => {
                nodes::planning(generator, &mut state);
                route_after_planning(&state)
            }
            Step::TestInference => {
                nodes::test_inference(generator, &mut state);
                route_after_test_inference(&state)
            }
            Step::CodeGeneration => {
                nodes::code_generation(generator, &mut state);
                route_after_code_generation(&state)
            }
            Step::Execution => {
                nodes::execution(runner, config, &mut state);
                route_after_execution(&state)
            }
            Step::Validation => {
                nodes::validation(runner, config, &mut state);
                route_after_validation(&state)
            }
            Step::ErrorFixing => {
                nodes::error_fixing(generator, &mut state);
                route_after_error_fixing(&state)
            }
            Step::Complete => break,
        };

        let violations = validate_state(&state);
        if !violations.is_empty() {
            bail!("state invariant violated after {step:?}: {}", violations.join("; "));
        }

        state.current_step = next;
        on_step(step, &state);
    }

    if !state.is_complete {
        bail!("workflow reached Complete without a terminal state");
    }
    info!(reason = ?state.completion_reason, "workflow finished");
    Ok(state)
}
