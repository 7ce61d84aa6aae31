//! Iterative code-generation workflow CLI.
//!
//! `run` drives a full generate/execute/validate/fix loop for a task,
//! `check` runs the static validator over a Python file, and `exec` runs a
//! Python file in the sandbox. Progress and results are printed as JSON
//! lines on stdout; diagnostics go to stderr.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use codeloop::config::{LoopConfig, load_config};
use codeloop::core::state::{CompletionReason, Step, TestCase, WorkflowState};
use codeloop::exit_codes;
use codeloop::llm::openai::OpenAiGenerator;
use codeloop::sandbox::registry::ProcessRegistry;
use codeloop::sandbox::{CodeRunner, ExecRequest, Sandbox};
use codeloop::validator::validate_code;
use codeloop::workflow::{WorkflowRequest, run_workflow};

#[derive(Parser)]
#[command(
    name = "codeloop",
    version,
    about = "Iterative LLM code generation with sandboxed execution"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full workflow for a task description.
    Run {
        /// Natural-language task to solve.
        task: String,
        /// JSON file with test cases; skips test inference.
        #[arg(long)]
        tests: Option<PathBuf>,
        /// Override the configured iteration bound.
        #[arg(long)]
        max_iterations: Option<u32>,
        /// Session id for cancellation; generated when omitted.
        #[arg(long)]
        session: Option<String>,
        /// Config file path.
        #[arg(long, default_value = "codeloop.toml")]
        config: PathBuf,
        /// Override the configured model.
        #[arg(long)]
        model: Option<String>,
    },
    /// Statically validate a Python file without executing it.
    Check {
        file: PathBuf,
    },
    /// Execute a Python file in the sandbox and print the outcome.
    Exec {
        file: PathBuf,
        #[arg(long, default_value_t = 5)]
        timeout_secs: u64,
        /// Text to pass on the child's stdin.
        #[arg(long)]
        stdin: Option<String>,
    },
}

fn main() {
    codeloop::logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_codes::ERROR);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            task,
            tests,
            max_iterations,
            session,
            config,
            model,
        } => cmd_run(task, tests, max_iterations, session, &config, model),
        Command::Check { file } => cmd_check(&file),
        Command::Exec {
            file,
            timeout_secs,
            stdin,
        } => cmd_exec(&file, timeout_secs, stdin),
    }
}

fn cmd_run(
    task: String,
    tests: Option<PathBuf>,
    max_iterations: Option<u32>,
    session: Option<String>,
    config_path: &Path,
    model: Option<String>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(model) = model {
        config.model = model;
    }
    let max_iterations = max_iterations.unwrap_or(config.max_iterations);

    let tests = match tests {
        Some(path) => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("read {}", path.display()))?;
            let cases: Vec<TestCase> = serde_json::from_str(&raw)
                .with_context(|| format!("parse test cases from {}", path.display()))?;
            Some(cases)
        }
        None => None,
    };

    let session_id = session.unwrap_or_else(generated_session_id);
    let generator = OpenAiGenerator::from_env(config.model.clone())?;
    let registry = Arc::new(ProcessRegistry::new());
    let sandbox = Sandbox::new(
        config.python_bin.clone(),
        config.output_limit_bytes,
        Arc::clone(&registry),
    );

    let request = WorkflowRequest {
        task,
        session_id,
        tests,
        max_iterations,
    };
    let state = run_workflow(&generator, &sandbox, &config, request, print_progress)?;
    print_summary(&state);
    if state.completion_reason != Some(CompletionReason::Success) {
        std::process::exit(exit_codes::REJECTED);
    }
    Ok(())
}

fn cmd_check(file: &Path) -> Result<()> {
    let code =
        fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let report = validate_code(&code, &[]);
    println!(
        "{}",
        json!({
            "is_valid": report.is_valid,
            "issues": report.issues,
            "warnings": report.warnings,
            "suspicious_patterns": report.suspicious_patterns,
        })
    );
    if !report.is_valid {
        std::process::exit(exit_codes::REJECTED);
    }
    Ok(())
}

fn cmd_exec(file: &Path, timeout_secs: u64, stdin: Option<String>) -> Result<()> {
    let code =
        fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let registry = Arc::new(ProcessRegistry::new());
    let config = LoopConfig::default();
    let sandbox = Sandbox::new(config.python_bin, config.output_limit_bytes, registry);

    let outcome = sandbox.run(&ExecRequest {
        code,
        stdin,
        timeout: Duration::from_secs(timeout_secs.max(1)),
        session: None,
    })?;
    println!(
        "{}",
        json!({
            "success": outcome.success,
            "stdout": outcome.stdout,
            "stderr": outcome.stderr,
            "exit_code": outcome.exit_code,
            "duration_secs": outcome.duration_secs,
            "timed_out": outcome.timed_out,
        })
    );
    if !outcome.success {
        std::process::exit(exit_codes::ERROR);
    }
    Ok(())
}

/// One JSON line per executed node.
fn print_progress(step: Step, state: &WorkflowState) {
    println!(
        "{}",
        json!({
            "event": "step",
            "step": step,
            "iteration": state.iteration,
            "code_versions": state.code_history.len(),
            "passed_tests": state.passed_tests,
            "failed_tests": state.failed_tests,
            "is_complete": state.is_complete,
        })
    );
}

fn print_summary(state: &WorkflowState) {
    println!(
        "{}",
        json!({
            "event": "summary",
            "session_id": state.session_id,
            "completion_reason": state.completion_reason,
            "iterations": state.iteration,
            "code_versions": state.code_history.len(),
            "passed_tests": state.passed_tests,
            "failed_tests": state.failed_tests,
            "final_code": state.current_code,
            "final_output": state.final_output,
            "total_tokens": state.total_tokens,
            "estimated_cost_usd": state.estimated_cost_usd,
        })
    );
}

fn generated_session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("session-{millis}")
}
