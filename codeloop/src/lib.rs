//! Iterative code-generation loop with sandboxed validation.
//!
//! This crate turns a natural-language task into working Python code by
//! looping Planning → Test Inference → Code Generation → Execution →
//! Validation → Error Fixing until all test cases pass or an iteration bound
//! is hit. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (workflow state, routing,
//!   diagnosis assembly, invariants). No I/O, fully testable in isolation.
//! - **[`validator`]**: Pure static checks over a code string (syntax,
//!   forbidden imports, hardcoding heuristics).
//! - **[`sandbox`]**: Side-effecting process execution (temp-dir isolation,
//!   timeouts, cancellation registry). Isolated behind the [`sandbox::CodeRunner`]
//!   trait to enable scripted doubles in tests.
//! - **[`llm`]**: The generation-backend boundary, behind [`llm::Generator`].
//!
//! Orchestration ([`workflow`], [`harness`]) coordinates core logic with the
//! sandbox and backend to implement one workflow run.

pub mod config;
pub mod core;
pub mod exit_codes;
pub mod harness;
pub mod llm;
pub mod logging;
pub mod sandbox;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validator;
pub mod workflow;
