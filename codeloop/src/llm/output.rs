//! Structured generator outputs and their parsing rules.

use serde::{Deserialize, Serialize};

use crate::core::state::TestCase;
use crate::llm::OutputSchema;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningOutput {
    pub problem_understanding: String,
    pub approach: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeOutput {
    pub filename: String,
    pub code: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferredTests {
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    pub root_cause: String,
    #[serde(default)]
    pub failed_test_details: Vec<String>,
    pub suggested_fix: String,
}

#[derive(Debug, Clone)]
pub enum GeneratorOutput {
    Planning(PlanningOutput),
    Code(CodeOutput),
    TestInference(InferredTests),
    ErrorAnalysis(ErrorAnalysis),
}

impl GeneratorOutput {
    pub fn as_planning(&self) -> Option<&PlanningOutput> {
        match self {
            Self::Planning(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_code(&self) -> Option<&CodeOutput> {
        match self {
            Self::Code(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_tests(&self) -> Option<&InferredTests> {
        match self {
            Self::TestInference(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_analysis(&self) -> Option<&ErrorAnalysis> {
        match self {
            Self::ErrorAnalysis(a) => Some(a),
            _ => None,
        }
    }
}

/// Raised when a backend reply does not satisfy the requested schema.
/// Downcastable through anyhow so callers can tell malformed output apart
/// from transport failures.
#[derive(Debug)]
pub struct MalformedOutputError {
    pub schema: OutputSchema,
    pub detail: String,
}

impl std::fmt::Display for MalformedOutputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed {:?} output: {}", self.schema, self.detail)
    }
}

impl std::error::Error for MalformedOutputError {}

/// Parse a raw backend reply against the requested schema.
///
/// Code outputs get extra checks beyond deserialization: the code field must
/// be raw source (no markdown fences), the filename must name a Python file,
/// and trivially short or blank code is rejected.
pub fn parse_output(
    schema: OutputSchema,
    raw: &str,
) -> Result<GeneratorOutput, MalformedOutputError> {
    let malformed = |detail: String| MalformedOutputError { schema, detail };

    match schema {
        OutputSchema::Planning => {
            let parsed: PlanningOutput = serde_json::from_str(raw)
                .map_err(|e| malformed(format!("invalid JSON: {e}")))?;
            if parsed.problem_understanding.trim().is_empty() || parsed.approach.trim().is_empty() {
                return Err(malformed("problem_understanding and approach are required".into()));
            }
            Ok(GeneratorOutput::Planning(parsed))
        }
        OutputSchema::Code => {
            let parsed: CodeOutput = serde_json::from_str(raw)
                .map_err(|e| malformed(format!("invalid JSON: {e}")))?;
            validate_code_output(&parsed).map_err(malformed)?;
            Ok(GeneratorOutput::Code(parsed))
        }
        OutputSchema::TestInference => {
            let parsed: InferredTests = serde_json::from_str(raw)
                .map_err(|e| malformed(format!("invalid JSON: {e}")))?;
            if parsed.test_cases.is_empty() {
                return Err(malformed("test_cases must not be empty".into()));
            }
            Ok(GeneratorOutput::TestInference(parsed))
        }
        OutputSchema::ErrorAnalysis => {
            let parsed: ErrorAnalysis = serde_json::from_str(raw)
                .map_err(|e| malformed(format!("invalid JSON: {e}")))?;
            if parsed.root_cause.trim().is_empty() || parsed.suggested_fix.trim().is_empty() {
                return Err(malformed("root_cause and suggested_fix are required".into()));
            }
            Ok(GeneratorOutput::ErrorAnalysis(parsed))
        }
    }
}

fn validate_code_output(output: &CodeOutput) -> Result<(), String> {
    if output.code.contains("```") {
        return Err("code contains markdown fences; raw source required".to_string());
    }
    if !output.filename.ends_with(".py") {
        return Err(format!("filename must end with .py, got '{}'", output.filename));
    }
    if output.code.trim().len() < 10 {
        return Err("code is too short to be a solution".to_string());
    }
    if output.code.lines().all(|line| line.trim().is_empty()) {
        return Err("code contains no non-blank lines".to_string());
    }
    Ok(())
}
