//! Syntax well-formedness check.

use tree_sitter::Node;

use crate::validator::{ValidationReport, parse_python};

/// Parse the code and report the first syntax error with its location.
/// Any successful parse is valid regardless of semantic content.
pub fn check_syntax(code: &str) -> ValidationReport {
    let mut issues = Vec::new();

    match parse_python(code) {
        Some(tree) => {
            let root = tree.root_node();
            if root.has_error() {
                issues.push(match first_error(root) {
                    Some(node) => describe_error(node),
                    None => "Syntax error: code could not be fully parsed".to_string(),
                });
            }
        }
        None => issues.push("Syntax error: parser produced no tree".to_string()),
    }

    ValidationReport {
        is_valid: issues.is_empty(),
        issues,
        ..ValidationReport::default()
    }
}

/// Depth-first search for the first ERROR or missing node.
fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children {
        if let Some(found) = first_error(child) {
            return Some(found);
        }
    }
    None
}

fn describe_error(node: Node) -> String {
    let position = node.start_position();
    let what = if node.is_missing() {
        format!("missing {}", node.kind())
    } else {
        "unexpected token".to_string()
    };
    format!(
        "Syntax error at line {}, column {}: {}",
        position.row + 1,
        position.column + 1,
        what
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_code_passes() {
        let report = check_syntax("def main(numbers):\n    return sum(numbers)\n");
        assert!(report.is_valid);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn parse_failure_is_an_issue_with_a_location() {
        let report = check_syntax("def main(:\n    return 1\n");
        assert!(!report.is_valid);
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].starts_with("Syntax error at line "));
    }

    #[test]
    fn semantically_odd_but_parseable_code_passes() {
        // NameError at runtime, but syntactically fine.
        let report = check_syntax("def main():\n    return undefined_name\n");
        assert!(report.is_valid);
    }
}
