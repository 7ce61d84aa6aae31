//! Prompt construction for each generation step.

use std::fmt::Write as _;

use crate::core::state::WorkflowState;

pub const PLANNING_SYSTEM: &str = "You are a senior software engineer planning a Python \
    solution. Analyze the task and describe what it asks for and how you will solve it. \
    Do not write code yet.";

pub const TEST_INFERENCE_SYSTEM: &str = "You are a test engineer. Given a task and a plan, \
    produce concrete test cases that would verify a correct solution: typical inputs, edge \
    cases, and boundary values. Inputs are named keyword arguments for a function called \
    main; expected outputs are the exact values main should return.";

pub const CODE_GENERATION_SYSTEM: &str = "You are a Python programmer. Write a complete, \
    self-contained solution to the task.";

pub const ERROR_ANALYSIS_SYSTEM: &str = "You are debugging a Python program that failed its \
    tests. Identify the root cause of the failure and propose a concrete fix. Do not write \
    the fixed code yet.";

pub fn planning_prompt(task: &str) -> String {
    format!("Task:\n{task}")
}

pub fn test_inference_prompt(task: &str, understanding: &str, approach: &str) -> String {
    format!(
        "Task:\n{task}\n\nProblem understanding:\n{understanding}\n\nPlanned approach:\n{approach}\n\n\
         Produce the test cases."
    )
}

/// Prompt for generating (or regenerating) code. Includes the plan, the test
/// cases the code must pass, and, from the second iteration on, the analysis
/// of the previous failure.
pub fn code_generation_prompt(state: &WorkflowState) -> String {
    let mut prompt = format!("Task:\n{}\n", state.task);

    if let Some(understanding) = &state.problem_understanding {
        let _ = write!(prompt, "\nProblem understanding:\n{understanding}\n");
    }
    if let Some(approach) = &state.approach {
        let _ = write!(prompt, "\nPlanned approach:\n{approach}\n");
    }

    if !state.test_cases.is_empty() {
        prompt.push_str("\nThe code must pass these test cases:\n");
        for (i, test) in state.test_cases.iter().enumerate() {
            let inputs = serde_json::to_string(&test.inputs).unwrap_or_default();
            let expected = test
                .expected_output
                .as_ref()
                .map_or_else(|| "null".to_string(), ToString::to_string);
            let _ = writeln!(
                prompt,
                "{}. {} | inputs: {inputs} | expected: {expected}",
                i + 1,
                test.description
            );
        }
    }

    if state.iteration > 1
        && let Some(analysis) = &state.last_error_analysis
    {
        let _ = write!(
            prompt,
            "\nThe previous attempt failed. Fix it based on this analysis:\n{analysis}\n"
        );
    }

    prompt.push_str(
        "\nRequirements:\n\
         - Define a function main(...) taking the test inputs as keyword arguments and \
           returning the result.\n\
         - Use only the Python standard library, and never import os, subprocess, sys, \
           socket, or networking modules.\n\
         - Do not use eval, exec, compile, or __import__.\n\
         - Solve the task generally; do not hardcode answers for the given test inputs.\n\
         - The code field must contain raw Python source with no markdown fences.\n",
    );
    prompt
}

pub fn error_analysis_prompt(state: &WorkflowState, error_context: &str) -> String {
    let code = state.current_code.as_deref().unwrap_or("(no code was accepted)");
    format!(
        "Task:\n{}\n\nCurrent code:\n{code}\n\nWhat went wrong:\n{error_context}\n\n\
         Analyze the failure.",
        state.task
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::{TestCase, WorkflowState};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn sample_state() -> WorkflowState {
        let mut inputs = BTreeMap::new();
        inputs.insert("numbers".to_string(), json!([10, 20, 30]));
        let tests = vec![TestCase {
            description: "average of three".to_string(),
            inputs,
            expected_output: Some(json!(20.0)),
        }];
        let mut state = WorkflowState::new("compute the average", "s", Some(tests), 5);
        state.problem_understanding = Some("average a list of numbers".to_string());
        state.approach = Some("sum divided by length".to_string());
        state
    }

    #[test]
    fn code_prompt_lists_tests_and_requirements() {
        let prompt = code_generation_prompt(&sample_state());
        assert!(prompt.contains("average of three"));
        assert!(prompt.contains("expected: 20.0"));
        assert!(prompt.contains("main("));
        assert!(!prompt.contains("previous attempt failed"));
    }

    #[test]
    fn code_prompt_includes_error_analysis_after_first_iteration() {
        let mut state = sample_state();
        state.iteration = 2;
        state.last_error_analysis = Some("Root Cause: off by one".to_string());
        let prompt = code_generation_prompt(&state);
        assert!(prompt.contains("previous attempt failed"));
        assert!(prompt.contains("off by one"));
    }

    #[test]
    fn error_analysis_prompt_includes_code_and_context() {
        let mut state = sample_state();
        state.push_code("def main(numbers):\n    return sum(numbers)\n".to_string());
        let prompt = error_analysis_prompt(&state, "1/1 tests failed");
        assert!(prompt.contains("def main(numbers)"));
        assert!(prompt.contains("1/1 tests failed"));
    }
}
