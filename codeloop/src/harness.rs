//! Runs generated code against structured test cases.
//!
//! Each test case gets its own execution: a driver is appended to the code
//! that calls `main(**inputs)` and prints exactly one JSON line. The last
//! non-empty stdout line is parsed as the result; everything the snippet
//! printed before it is ignored. Comparison against the expected output is
//! exact JSON equality, no numeric coercion.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::state::{TestCase, TestOutcome};
use crate::sandbox::{CodeRunner, ExecRequest, python_string_literal};

/// Aggregated outcome of one harness run.
#[derive(Debug, Clone)]
pub struct HarnessReport {
    pub outcomes: Vec<TestOutcome>,
    pub passed: u32,
    pub failed: u32,
}

#[derive(Debug, Deserialize)]
struct DriverReply {
    success: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Run every test case in order. Infallible: runner errors and unparseable
/// output become failed outcomes rather than aborting the batch.
#[instrument(skip_all, fields(tests = tests.len()))]
pub fn run_test_cases<R: CodeRunner>(
    runner: &R,
    code: &str,
    tests: &[TestCase],
    timeout: Duration,
    session: Option<&str>,
) -> HarnessReport {
    let mut outcomes = Vec::with_capacity(tests.len());
    for test in tests {
        let outcome = run_one(runner, code, test, timeout, session);
        debug!(test = %test.description, passed = outcome.passed, "test finished");
        outcomes.push(outcome);
    }
    let passed = outcomes.iter().filter(|o| o.passed).count() as u32;
    let failed = outcomes.len() as u32 - passed;
    HarnessReport {
        outcomes,
        passed,
        failed,
    }
}

fn run_one<R: CodeRunner>(
    runner: &R,
    code: &str,
    test: &TestCase,
    timeout: Duration,
    session: Option<&str>,
) -> TestOutcome {
    let inputs_json = match serde_json::to_string(&test.inputs) {
        Ok(json) => json,
        Err(e) => return failed(test, format!("could not serialize inputs: {e}")),
    };
    let program = build_driver(code, &inputs_json);

    let exec = match runner.run(&ExecRequest {
        code: program,
        stdin: None,
        timeout,
        session: session.map(str::to_string),
    }) {
        Ok(exec) => exec,
        Err(e) => return failed(test, format!("execution failed: {e:#}")),
    };

    if !exec.success {
        let error = if exec.timed_out {
            format!("timed out after {:.1}s", exec.duration_secs)
        } else {
            format!("process exited with an error: {}", truncate(&exec.stderr, 200))
        };
        return failed(test, error);
    }

    let last_line = exec
        .stdout
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("");
    let reply: DriverReply = match serde_json::from_str(last_line) {
        Ok(reply) => reply,
        Err(_) => {
            return TestOutcome {
                description: test.description.clone(),
                passed: false,
                actual_output: Some(truncate(&exec.stdout, 100)),
                error: Some("could not parse test output".to_string()),
            };
        }
    };

    if !reply.success {
        return failed(
            test,
            reply.error.unwrap_or_else(|| "test driver reported failure".to_string()),
        );
    }

    let actual = reply.result.unwrap_or(Value::Null);
    let expected = test.expected_output.clone().unwrap_or(Value::Null);
    let rendered_actual = actual.to_string();
    if actual == expected {
        TestOutcome {
            description: test.description.clone(),
            passed: true,
            actual_output: Some(rendered_actual),
            error: None,
        }
    } else {
        TestOutcome {
            description: test.description.clone(),
            passed: false,
            actual_output: Some(rendered_actual),
            error: Some(format!("expected {expected}, got {actual}")),
        }
    }
}

/// Append the driver to the code. Inputs are embedded as a JSON document
/// inside an escaped string literal and decoded with the json module rather
/// than spliced in as Python literals, so booleans, nulls, and strings with
/// any quoting survive the trip.
fn build_driver(code: &str, inputs_json: &str) -> String {
    let inputs_literal = python_string_literal(inputs_json);
    format!(
        "{code}\n\n\
         if __name__ == '__main__':\n\
         \x20   import json as _json\n\
         \x20   try:\n\
         \x20       _inputs = _json.loads({inputs_literal})\n\
         \x20       _result = main(**_inputs)\n\
         \x20       print(_json.dumps({{'success': True, 'result': _result}}))\n\
         \x20   except Exception as _e:\n\
         \x20       print(_json.dumps({{'success': False, 'error': str(_e)}}))\n"
    )
}

fn failed(test: &TestCase, error: String) -> TestOutcome {
    TestOutcome {
        description: test.description.clone(),
        passed: false,
        actual_output: None,
        error: Some(error),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        ScriptedRunner, failed_outcome, ok_outcome, test_case, timed_out_outcome,
    };
    use serde_json::json;

    #[test]
    fn passing_test_compares_exact_json() {
        let runner = ScriptedRunner::new(vec![ok_outcome(
            "{\"success\": true, \"result\": 20.0}\n",
        )]);
        let tests = vec![test_case("average of three", json!({"numbers": [10, 20, 30]}), json!(20.0))];
        let report = run_test_cases(&runner, "def main(numbers): ...", &tests, Duration::from_secs(5), None);
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.outcomes[0].actual_output.as_deref(), Some("20.0"));
    }

    #[test]
    fn mismatch_reports_expected_and_actual() {
        let runner = ScriptedRunner::new(vec![ok_outcome(
            "{\"success\": true, \"result\": 60}\n",
        )]);
        let tests = vec![test_case("average", json!({"numbers": [10, 20, 30]}), json!(20.0))];
        let report = run_test_cases(&runner, "def main(numbers): ...", &tests, Duration::from_secs(5), None);
        assert_eq!(report.failed, 1);
        let error = report.outcomes[0].error.as_deref().unwrap();
        assert!(error.contains("expected 20.0"));
        assert!(error.contains("got 60"));
    }

    #[test]
    fn driver_output_is_read_from_the_last_nonempty_line() {
        let runner = ScriptedRunner::new(vec![ok_outcome(
            "debug print from the snippet\n\n{\"success\": true, \"result\": 3}\n",
        )]);
        let tests = vec![test_case("sum", json!({"a": 1, "b": 2}), json!(3))];
        let report = run_test_cases(&runner, "def main(a, b): ...", &tests, Duration::from_secs(5), None);
        assert_eq!(report.passed, 1);
    }

    #[test]
    fn unparseable_output_fails_with_stdout_prefix() {
        let runner = ScriptedRunner::new(vec![ok_outcome("Hello World\n")]);
        let tests = vec![test_case("greets", json!({}), json!("Hello World"))];
        let report = run_test_cases(&runner, "print('Hello World')", &tests, Duration::from_secs(5), None);
        assert_eq!(report.failed, 1);
        let outcome = &report.outcomes[0];
        assert_eq!(outcome.error.as_deref(), Some("could not parse test output"));
        assert!(outcome.actual_output.as_deref().unwrap().contains("Hello World"));
    }

    #[test]
    fn timeout_and_crash_become_failed_outcomes() {
        let runner = ScriptedRunner::new(vec![
            timed_out_outcome(5.0),
            failed_outcome("Traceback: ZeroDivisionError", 1),
        ]);
        let tests = vec![
            test_case("loops forever", json!({}), json!(1)),
            test_case("divides by zero", json!({}), json!(1)),
        ];
        let report = run_test_cases(&runner, "def main(): ...", &tests, Duration::from_secs(5), None);
        assert_eq!(report.failed, 2);
        assert!(report.outcomes[0].error.as_deref().unwrap().contains("timed out"));
        assert!(report.outcomes[1].error.as_deref().unwrap().contains("ZeroDivisionError"));
    }

    #[test]
    fn driver_reported_exception_is_the_test_error() {
        let runner = ScriptedRunner::new(vec![ok_outcome(
            "{\"success\": false, \"error\": \"division by zero\"}\n",
        )]);
        let tests = vec![test_case("empty list", json!({"numbers": []}), json!(0))];
        let report = run_test_cases(&runner, "def main(numbers): ...", &tests, Duration::from_secs(5), None);
        assert_eq!(report.failed, 1);
        assert_eq!(report.outcomes[0].error.as_deref(), Some("division by zero"));
    }

    #[test]
    fn driver_embeds_inputs_as_json() {
        let driver = build_driver("def main(flag): return flag", "{\"flag\": true}");
        assert!(driver.contains("_json.loads(\"{\\\"flag\\\": true}\")"));
        assert!(driver.contains("main(**_inputs)"));
    }

    #[test]
    fn driver_survives_inputs_containing_triple_quotes() {
        let inputs_json = "{\"text\": \"a '''quoted''' b\"}";
        let driver = build_driver("def main(text): return text", inputs_json);
        // The payload sits inside one escaped string literal, never as raw
        // Python source.
        assert!(!driver.contains("r'''"));
        assert!(driver.contains("a '''quoted''' b"));
    }
}
