//! Deterministic doubles for tests: a scripted generation backend and a
//! scripted sandbox. Both replay a fixed queue of replies in FIFO order and
//! error when the queue runs dry, so a test that makes an unexpected extra
//! call fails loudly.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::core::state::{TestCase, TokenUsage};
use crate::llm::output::{CodeOutput, ErrorAnalysis, InferredTests, PlanningOutput};
use crate::llm::{GenerateRequest, Generator, GeneratorOutput, GeneratorReply};
use crate::sandbox::{CodeRunner, ExecOutcome, ExecRequest};

/// One scripted backend reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Output(GeneratorOutput, TokenUsage),
    Fail(String),
}

/// Generator double replaying a fixed script.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<ScriptedReply>>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<ScriptedReply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, _request: &GenerateRequest) -> Result<GeneratorReply> {
        let mut script = self
            .script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match script.pop_front() {
            Some(ScriptedReply::Output(output, usage)) => Ok(GeneratorReply { output, usage }),
            Some(ScriptedReply::Fail(detail)) => Err(anyhow!(detail)),
            None => Err(anyhow!("scripted generator exhausted")),
        }
    }
}

/// Sandbox double replaying fixed outcomes.
pub struct ScriptedRunner {
    outcomes: Mutex<VecDeque<ExecOutcome>>,
}

impl ScriptedRunner {
    pub fn new(outcomes: Vec<ExecOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
        }
    }
}

impl CodeRunner for ScriptedRunner {
    fn run(&self, _request: &ExecRequest) -> Result<ExecOutcome> {
        let mut outcomes = self
            .outcomes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        outcomes
            .pop_front()
            .ok_or_else(|| anyhow!("scripted runner exhausted"))
    }
}

fn small_usage() -> TokenUsage {
    TokenUsage {
        prompt_tokens: 100,
        completion_tokens: 50,
        total_tokens: 150,
        cost_usd: 0.001,
    }
}

pub fn planning_reply(understanding: &str, approach: &str) -> ScriptedReply {
    ScriptedReply::Output(
        GeneratorOutput::Planning(PlanningOutput {
            problem_understanding: understanding.to_string(),
            approach: approach.to_string(),
        }),
        small_usage(),
    )
}

pub fn code_reply(code: &str) -> ScriptedReply {
    ScriptedReply::Output(
        GeneratorOutput::Code(CodeOutput {
            filename: "solution.py".to_string(),
            code: code.to_string(),
            explanation: String::new(),
        }),
        small_usage(),
    )
}

pub fn tests_reply(test_cases: Vec<TestCase>) -> ScriptedReply {
    ScriptedReply::Output(
        GeneratorOutput::TestInference(InferredTests {
            test_cases,
            reasoning: String::new(),
        }),
        small_usage(),
    )
}

pub fn analysis_reply(root_cause: &str, suggested_fix: &str) -> ScriptedReply {
    ScriptedReply::Output(
        GeneratorOutput::ErrorAnalysis(ErrorAnalysis {
            root_cause: root_cause.to_string(),
            failed_test_details: Vec::new(),
            suggested_fix: suggested_fix.to_string(),
        }),
        small_usage(),
    )
}

/// A test case whose `inputs` is a JSON object of named arguments.
pub fn test_case(description: &str, inputs: Value, expected: Value) -> TestCase {
    let inputs: BTreeMap<String, Value> = match inputs {
        Value::Object(map) => map.into_iter().collect(),
        _ => BTreeMap::new(),
    };
    TestCase {
        description: description.to_string(),
        inputs,
        expected_output: Some(expected),
    }
}

pub fn ok_outcome(stdout: &str) -> ExecOutcome {
    ExecOutcome {
        success: true,
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: Some(0),
        duration_secs: 0.01,
        timed_out: false,
    }
}

pub fn failed_outcome(stderr: &str, exit_code: i32) -> ExecOutcome {
    ExecOutcome {
        success: false,
        stdout: String::new(),
        stderr: stderr.to_string(),
        exit_code: Some(exit_code),
        duration_secs: 0.01,
        timed_out: false,
    }
}

pub fn timed_out_outcome(duration_secs: f64) -> ExecOutcome {
    ExecOutcome {
        success: false,
        stdout: String::new(),
        stderr: String::new(),
        exit_code: None,
        duration_secs,
        timed_out: true,
    }
}
