//! Advisory hardcoding heuristics.
//!
//! These never reject code. They flag shapes that suggest the generated
//! program was tailored to the known test cases instead of solving the task:
//! oversized literal collections, stacks of string-equality branches, bare
//! literal returns, and test-input values echoed as string literals.

use regex::Regex;
use tree_sitter::Node;

use crate::validator::{ValidationReport, parse_python};

/// Literal collections larger than this are suspicious.
const MAX_LITERAL_ITEMS: usize = 20;
/// More string-equality comparisons than this are suspicious.
const MAX_STRING_EQUALITY_CHECKS: usize = 5;
/// More bare literal returns than this are suspicious.
const MAX_LITERAL_RETURNS: usize = 3;
/// Only the first few test inputs are scanned for echoed values.
const MAX_SCANNED_INPUTS: usize = 5;

/// Flag suspicious hardcoding patterns. Always valid; findings are advisory.
pub fn check_hardcoding(code: &str, test_inputs: &[String]) -> ValidationReport {
    let mut warnings = Vec::new();
    let mut suspicious = Vec::new();

    if let Some(tree) = parse_python(code) {
        let mut literal_returns = 0usize;
        scan_tree(tree.root_node(), &mut suspicious, &mut literal_returns);
        if literal_returns > MAX_LITERAL_RETURNS {
            suspicious.push(format!(
                "{literal_returns} return statements return a bare literal with no computation"
            ));
        }
    } else {
        warnings.push("could not analyze for hardcoding: parser produced no tree".to_string());
    }

    let string_equality =
        Regex::new(r#"if\s+.*==\s*["'].*["']"#).expect("string equality pattern");
    let matches = string_equality.find_iter(code).count();
    if matches > MAX_STRING_EQUALITY_CHECKS {
        suspicious.push(format!(
            "{matches} equality comparisons against string literals"
        ));
    }

    let digits = Regex::new(r"\d+").expect("digits pattern");
    for input in test_inputs.iter().take(MAX_SCANNED_INPUTS) {
        for value in digits.find_iter(input) {
            let value = value.as_str();
            if code.contains(&format!("\"{value}\"")) || code.contains(&format!("'{value}'")) {
                suspicious.push(format!(
                    "test value '{value}' appears verbatim as a string literal"
                ));
                break;
            }
        }
    }

    if !suspicious.is_empty() {
        warnings.push(
            "suspicious hardcoding patterns detected; code may be tailored to specific inputs"
                .to_string(),
        );
    }

    ValidationReport {
        is_valid: true,
        issues: Vec::new(),
        warnings,
        suspicious_patterns: suspicious,
    }
}

fn scan_tree(node: Node, suspicious: &mut Vec<String>, literal_returns: &mut usize) {
    match node.kind() {
        "list" | "set" => {
            let items = node.named_child_count();
            if items > MAX_LITERAL_ITEMS {
                suspicious.push(format!(
                    "large {} literal ({items} items) may encode expected outputs",
                    node.kind()
                ));
            }
        }
        "dictionary" => {
            let entries = count_children_of_kind(node, "pair");
            if entries > MAX_LITERAL_ITEMS {
                suspicious.push(format!(
                    "large dictionary literal ({entries} entries) may encode expected outputs"
                ));
            }
        }
        "return_statement" => {
            if returns_bare_literal(node) {
                *literal_returns += 1;
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children {
        scan_tree(child, suspicious, literal_returns);
    }
}

fn count_children_of_kind(node: Node, kind: &str) -> usize {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() == kind)
        .count()
}

fn returns_bare_literal(node: Node) -> bool {
    if node.named_child_count() != 1 {
        return false;
    }
    let Some(value) = node.named_child(0) else {
        return false;
    };
    matches!(
        value.kind(),
        "string" | "integer" | "float" | "true" | "false" | "none"
    )
}
