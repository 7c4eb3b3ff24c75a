//! Stage 1 — Mechanical ($0 cost). Runs external tooling (lint, build,
//! test, static analysis, coverage) per spec §4.7. A missing tool produces a
//! diagnostic naming its install command, never a silent pass.

use seedloop_ports::{ToolError, ToolOutput, ToolRunner};
use tracing::{instrument, warn};

pub const MIN_COVERAGE: f64 = 0.7;

#[derive(Debug, Clone)]
pub struct MechanicalCheck {
    pub name: String,
    pub command: String,
}

#[derive(Debug, Clone)]
pub struct MechanicalCheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone)]
pub struct MechanicalStageResult {
    pub passed: bool,
    pub checks: Vec<MechanicalCheckResult>,
    pub coverage: Option<f64>,
}

/// Runs every configured check in order, short-circuiting stage success as
/// soon as one check fails (the overall pipeline is what short-circuits
/// across stages; within Stage 1 every check still runs so the caller gets
/// a full diagnostic, matching the teacher's oracle-suite reporting style).
#[instrument(skip(runner, checks))]
pub async fn run_mechanical_stage(
    runner: &impl ToolRunner,
    checks: &[MechanicalCheck],
    measured_coverage: Option<f64>,
) -> MechanicalStageResult {
    let mut results = Vec::with_capacity(checks.len());
    for check in checks {
        let outcome = runner.run(&check.command).await;
        let result = match outcome {
            Ok(ToolOutput { exit_code, .. }) if exit_code == 0 => MechanicalCheckResult {
                name: check.name.clone(),
                passed: true,
                detail: "ok".to_string(),
            },
            Ok(ToolOutput { exit_code, stderr, .. }) => MechanicalCheckResult {
                name: check.name.clone(),
                passed: false,
                detail: format!("exit {exit_code}: {stderr}"),
            },
            Err(ToolError::ToolMissing { tool, install_hint }) => {
                warn!(tool, install_hint, "mechanical check tool missing");
                MechanicalCheckResult {
                    name: check.name.clone(),
                    passed: false,
                    detail: format!("tool '{tool}' missing; install with `{install_hint}`"),
                }
            }
            Err(ToolError::ExecutionFailed { message }) => MechanicalCheckResult {
                name: check.name.clone(),
                passed: false,
                detail: message,
            },
        };
        results.push(result);
    }

    let coverage_ok = measured_coverage.map(|c| c >= MIN_COVERAGE).unwrap_or(true);
    let passed = results.iter().all(|r| r.passed) && coverage_ok;

    MechanicalStageResult {
        passed,
        checks: results,
        coverage: measured_coverage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubRunner {
        exit_code: i32,
    }

    impl ToolRunner for StubRunner {
        async fn run(&self, _command: &str) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput {
                exit_code: self.exit_code,
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    struct MissingRunner;

    impl ToolRunner for MissingRunner {
        async fn run(&self, _command: &str) -> Result<ToolOutput, ToolError> {
            Err(ToolError::ToolMissing {
                tool: "pytest".to_string(),
                install_hint: "pip install pytest".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn coverage_at_boundary_passes() {
        let runner = StubRunner { exit_code: 0 };
        let result = run_mechanical_stage(&runner, &[], Some(0.7)).await;
        assert!(result.passed);
    }

    #[tokio::test]
    async fn coverage_just_under_boundary_fails() {
        let runner = StubRunner { exit_code: 0 };
        let result = run_mechanical_stage(&runner, &[], Some(0.69999)).await;
        assert!(!result.passed);
    }

    #[tokio::test]
    async fn missing_tool_yields_an_install_diagnostic_not_a_silent_pass() {
        let checks = vec![MechanicalCheck {
            name: "tests".to_string(),
            command: "pytest".to_string(),
        }];
        let result = run_mechanical_stage(&MissingRunner, &checks, None).await;
        assert!(!result.passed);
        assert!(result.checks[0].detail.contains("install with"));
    }
}
