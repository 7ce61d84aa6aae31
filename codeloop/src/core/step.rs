//! Pure routing functions for the workflow state machine.
//!
//! Each function is a pure function of the current [`WorkflowState`] and
//! returns the next [`Step`]. Termination is guaranteed: every edge either
//! leads toward [`Step::Complete`] or passes through ErrorFixing, which owns
//! the bounded iteration increment.

use crate::core::state::{Step, WorkflowState};

/// Planning → TestInference, unless tests were supplied at run creation, in
/// which case inference is skipped for the life of the run.
pub fn route_after_planning(state: &WorkflowState) -> Step {
    if state.is_complete {
        return Step::Complete;
    }
    if state.test_inference_skipped {
        Step::CodeGeneration
    } else {
        Step::TestInference
    }
}

pub fn route_after_test_inference(state: &WorkflowState) -> Step {
    if state.is_complete {
        Step::Complete
    } else {
        Step::CodeGeneration
    }
}

/// CodeGeneration → Execution, except when the attempt was rejected by the
/// static validator: the itemized issues then feed the ErrorFixing path,
/// which owns the iteration increment (or terminates at the bound).
pub fn route_after_code_generation(state: &WorkflowState) -> Step {
    if state.is_complete {
        return Step::Complete;
    }
    if state.static_rejection.is_some() {
        Step::ErrorFixing
    } else {
        Step::Execution
    }
}

pub fn route_after_execution(state: &WorkflowState) -> Step {
    if state.is_complete {
        Step::Complete
    } else {
        Step::Validation
    }
}

/// Validation → Complete when the run is terminal (all tests passed, bound
/// hit, or a prior node marked it complete); otherwise retry via ErrorFixing.
pub fn route_after_validation(state: &WorkflowState) -> Step {
    if state.is_complete || state.all_tests_passed() || state.iteration >= state.max_iterations {
        Step::Complete
    } else {
        Step::ErrorFixing
    }
}

pub fn route_after_error_fixing(state: &WorkflowState) -> Step {
    if state.is_complete {
        Step::Complete
    } else {
        Step::CodeGeneration
    }
}
