//! Compiler module - Source code compilation
//!
//! Renders the language's compile template against a workspace and runs it
//! through the executer. Stdout and stderr both go to the compile log, which
//! is read back for the compile report.
//!
//! The compiler module does NOT:
//! - Retry failed compilations
//! - Decide whether execution goes ahead (the dispatcher does)

use std::sync::Arc;

use tokio::fs;
use tracing::{debug, warn};

use crate::core::utils::into_command;
use crate::executer::{ExecutionLimits, ExecutionRequest, Executer};
use crate::models::JudgeTask;
use crate::workspace::Workspace;

/// Time budget of a single compilation
pub const COMPILE_TIME_LIMIT_MS: u32 = 5000;

/// Result of a compilation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileResult {
    pub is_successful: bool,
    /// Combined compiler stdout and stderr
    pub log: String,
}

pub struct Compiler {
    executer: Arc<dyn Executer>,
    principal: Option<String>,
}

impl Compiler {
    pub fn new(executer: Arc<dyn Executer>, principal: Option<String>) -> Self {
        Self {
            executer,
            principal,
        }
    }

    /// Compile the workspace source of a task
    pub async fn get_compile_result(&self, task: &JudgeTask, workspace: &Workspace) -> CompileResult {
        let command = workspace.render(&task.language.compile_command);
        let log_path = workspace.compile_log_path();

        debug!(
            "[Submission #{}] Compiling with {:?}",
            task.submission_id(),
            command
        );

        let request = ExecutionRequest::new(into_command(&command))
            .with_principal(self.principal.clone())
            .with_stdout(&log_path)
            .with_stderr_to_stdout(true)
            .with_limits(ExecutionLimits::new(COMPILE_TIME_LIMIT_MS, 0));

        let is_successful = match self.executer.execute(&request).await {
            Ok(usage) => usage.exit_code == 0,
            Err(e) => {
                warn!(
                    "[Submission #{}] Compiler could not be executed: {:#}",
                    task.submission_id(),
                    e
                );
                false
            }
        };

        let log = fs::read_to_string(&log_path).await.unwrap_or_default();

        CompileResult { is_successful, log }
    }
}
