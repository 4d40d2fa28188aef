//! Runner module - Checkpoint execution
//!
//! Runs the compiled program once per checkpoint and classifies the raw
//! execution usage into a verdict:
//! exit code 0, then time limit, then memory limit, otherwise runtime error.
//!
//! The runner module does NOT:
//! - Compare outputs (an exit code of 0 is AC until the aggregator checks it)
//! - Stop the checkpoint loop on failures

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error};

use crate::core::utils::into_command;
use crate::core::Verdict;
use crate::executer::{ExecutionLimits, ExecutionRequest, ExecutionUsage, Executer};
use crate::models::{JudgeTask, Language, Problem};
use crate::workspace::Workspace;

/// Verdict and usage of one checkpoint execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointRun {
    pub verdict: Verdict,
    pub time_ms: u32,
    pub memory_kb: u32,
}

impl CheckpointRun {
    fn system_error() -> Self {
        Self {
            verdict: Verdict::SystemError,
            time_ms: 0,
            memory_kb: 0,
        }
    }
}

/// Limits a program runs under for a problem
pub fn effective_limits(language: &Language, problem: &Problem) -> ExecutionLimits {
    let time_ms = if language.extended_time_limit {
        problem.time_limit.saturating_mul(2)
    } else {
        problem.time_limit
    };
    ExecutionLimits::new(time_ms, problem.memory_limit)
}

/// Classify raw usage against the limits. A limit of 0 is never exceeded.
pub fn classify(usage: &ExecutionUsage, limits: &ExecutionLimits) -> Verdict {
    if usage.exit_code == 0 {
        Verdict::Accepted
    } else if limits.time_ms > 0 && usage.time_ms >= limits.time_ms {
        Verdict::TimeLimitExceeded
    } else if limits.memory_kb > 0 && usage.memory_kb >= limits.memory_kb {
        Verdict::MemoryLimitExceeded
    } else {
        Verdict::RuntimeError
    }
}

pub struct Runner {
    executer: Arc<dyn Executer>,
    principal: Option<String>,
}

impl Runner {
    pub fn new(executer: Arc<dyn Executer>, principal: Option<String>) -> Self {
        Self {
            executer,
            principal,
        }
    }

    /// Run the compiled program on one checkpoint input
    pub async fn get_runtime_result(
        &self,
        task: &JudgeTask,
        workspace: &Workspace,
        input_path: &Path,
        output_path: &Path,
    ) -> CheckpointRun {
        let command = workspace.render(&task.language.run_command);
        let limits = effective_limits(&task.language, &task.problem);

        let request = ExecutionRequest::new(into_command(&command))
            .with_principal(self.principal.clone())
            .with_stdin(input_path)
            .with_stdout(output_path)
            .with_limits(limits);

        match self.executer.execute(&request).await {
            Ok(usage) => {
                let verdict = classify(&usage, &limits);
                debug!(
                    "[Submission #{}] {:?} -> {} (exit={}, {}ms, {}KB)",
                    task.submission_id(),
                    input_path,
                    verdict,
                    usage.exit_code,
                    usage.time_ms,
                    usage.memory_kb
                );
                CheckpointRun {
                    verdict,
                    time_ms: usage.time_ms,
                    memory_kb: usage.memory_kb,
                }
            }
            Err(e) => {
                error!(
                    "[Submission #{}] Failed to execute program on {:?}: {:#}",
                    task.submission_id(),
                    input_path,
                    e
                );
                CheckpointRun::system_error()
            }
        }
    }
}
