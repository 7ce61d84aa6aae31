//! Forbidden-capability check over import statements.

use tree_sitter::Node;

use crate::validator::{ValidationReport, parse_python};

/// Modules whose import rejects the code: process control, OS interaction,
/// networking, and dynamic-evaluation primitives.
pub const FORBIDDEN_MODULES: &[&str] = &[
    "os",
    "subprocess",
    "sys",
    "socket",
    "requests",
    "urllib",
    "http",
    "ftplib",
    "telnetlib",
    "eval",
    "exec",
    "compile",
    "__import__",
];

/// Walk the syntax tree for `import x` and `from x import y` statements and
/// compare each imported module's top-level segment against the denylist.
/// Any match is an issue; the code is rejected as a whole.
pub fn check_forbidden_imports(code: &str) -> ValidationReport {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    match parse_python(code) {
        Some(tree) => {
            if tree.root_node().has_error() {
                warnings.push("could not fully check imports: code has syntax errors".to_string());
            }
            collect_imports(tree.root_node(), code.as_bytes(), &mut issues);
        }
        None => warnings.push("could not check imports: parser produced no tree".to_string()),
    }

    ValidationReport {
        is_valid: issues.is_empty(),
        issues,
        warnings,
        ..ValidationReport::default()
    }
}

fn collect_imports(node: Node, source: &[u8], issues: &mut Vec<String>) {
    match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                let target = match child.kind() {
                    "dotted_name" => Some(child),
                    "aliased_import" => child.child_by_field_name("name"),
                    _ => None,
                };
                if let Some(name) = target.and_then(|n| module_name(n, source))
                    && is_forbidden(&name)
                {
                    issues.push(format!("forbidden import detected: {name}"));
                }
            }
        }
        "import_from_statement" => {
            if let Some(name) = node
                .child_by_field_name("module_name")
                .and_then(|n| module_name(n, source))
                && is_forbidden(&name)
            {
                issues.push(format!("forbidden import detected: from {name}"));
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children {
        collect_imports(child, source, issues);
    }
}

/// Top-level segment of a (possibly dotted) module name.
fn module_name(node: Node, source: &[u8]) -> Option<String> {
    let text = node.utf8_text(source).ok()?;
    let top = text.split('.').next()?.trim();
    if top.is_empty() {
        return None;
    }
    Some(top.to_string())
}

fn is_forbidden(name: &str) -> bool {
    FORBIDDEN_MODULES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_import_is_flagged() {
        let report = check_forbidden_imports("import os\n");
        assert!(!report.is_valid);
        assert_eq!(report.issues, vec!["forbidden import detected: os".to_string()]);
    }

    #[test]
    fn from_import_is_flagged() {
        let report = check_forbidden_imports("from subprocess import run\n");
        assert!(!report.is_valid);
        assert!(report.issues[0].contains("from subprocess"));
    }

    #[test]
    fn dotted_and_aliased_imports_match_on_top_segment() {
        let report = check_forbidden_imports("import os.path as p\nimport urllib.request\n");
        assert!(!report.is_valid);
        assert_eq!(report.issues.len(), 2);
    }

    #[test]
    fn harmless_imports_pass() {
        let report = check_forbidden_imports("import math\nfrom collections import Counter\n");
        assert!(report.is_valid);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn accepted_code_contains_no_denylisted_import() {
        let code = "import json\nimport math\n\ndef main(x):\n    return math.sqrt(x)\n";
        let report = check_forbidden_imports(code);
        assert!(report.is_valid);
        for module in FORBIDDEN_MODULES {
            assert!(!report.issues.iter().any(|i| i.contains(module)));
        }
    }
}
