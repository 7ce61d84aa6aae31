//! Static checks over generated Python source.
//!
//! Three independent, composable checks run after every generation attempt
//! and before any execution: syntax well-formedness, a denylist of forbidden
//! imports, and advisory hardcoding heuristics. All checks are pure functions
//! of the code string; running them twice yields identical reports.

mod hardcoding;
mod imports;
mod syntax;

pub use hardcoding::check_hardcoding;
pub use imports::{FORBIDDEN_MODULES, check_forbidden_imports};
pub use syntax::check_syntax;

use tree_sitter::{Parser, Tree};

/// Result of one validation check, or of the combined run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub is_valid: bool,
    /// Blocking problems; any issue rejects the code as a whole.
    pub issues: Vec<String>,
    /// Non-blocking diagnostics.
    pub warnings: Vec<String>,
    /// Advisory hardcoding findings; never block.
    pub suspicious_patterns: Vec<String>,
}

impl ValidationReport {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            ..Self::default()
        }
    }

    fn merge(reports: Vec<ValidationReport>) -> Self {
        let mut combined = ValidationReport::valid();
        for report in reports {
            combined.issues.extend(report.issues);
            combined.warnings.extend(report.warnings);
            combined.suspicious_patterns.extend(report.suspicious_patterns);
        }
        combined.is_valid = combined.issues.is_empty();
        combined
    }
}

/// Run all checks on a code string. `test_inputs` are rendered test-case
/// inputs used by the hardcoding heuristic when available.
pub fn validate_code(code: &str, test_inputs: &[String]) -> ValidationReport {
    ValidationReport::merge(vec![
        check_syntax(code),
        check_forbidden_imports(code),
        check_hardcoding(code, test_inputs),
    ])
}

/// Parse Python source into a tree-sitter tree.
pub(crate) fn parse_python(code: &str) -> Option<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .expect("tree-sitter-python grammar");
    parser.parse(code, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_import_rejects_the_code_as_a_whole() {
        let report = validate_code("import os\n\ndef main():\n    return 1\n", &[]);
        assert!(!report.is_valid);
        assert!(report.issues.iter().any(|issue| issue.contains("os")));
    }

    #[test]
    fn clean_code_is_valid() {
        let report = validate_code("def main(numbers):\n    return sum(numbers) / len(numbers)\n", &[]);
        assert!(report.is_valid);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn validation_is_idempotent() {
        let code = "def main(:\n    return 1\n";
        let first = validate_code(code, &[]);
        let second = validate_code(code, &[]);
        assert_eq!(first, second);
        assert!(!first.is_valid);
    }
}
