//! Executer module - resource-limited process execution
//!
//! The compiler and the runner describe what to run with an
//! `ExecutionRequest`; an `Executer` runs it to completion (or kills it at the
//! limits) and reports exit code and resource usage.
//!
//! The executer does NOT:
//! - Interpret verdicts
//! - Know about languages, problems or checkpoints
//! - Compare outputs

pub mod process;

#[cfg(test)]
pub mod fake;

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use process::ProcessExecuter;

/// Resource limits, 0 means unlimited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Time limit in milliseconds
    pub time_ms: u32,
    /// Memory limit in KB
    pub memory_kb: u32,
}

impl ExecutionLimits {
    pub fn new(time_ms: u32, memory_kb: u32) -> Self {
        Self { time_ms, memory_kb }
    }
}

/// What to run and under which constraints
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Program followed by its arguments
    pub command: Vec<String>,
    /// Unix user the program runs as
    pub principal: Option<String>,
    pub stdin_path: Option<PathBuf>,
    pub stdout_path: Option<PathBuf>,
    /// Redirect stderr into the stdout file instead of discarding it
    pub stderr_to_stdout: bool,
    pub limits: ExecutionLimits,
}

impl ExecutionRequest {
    pub fn new(command: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            principal: None,
            stdin_path: None,
            stdout_path: None,
            stderr_to_stdout: false,
            limits: ExecutionLimits::default(),
        }
    }

    pub fn with_principal(mut self, principal: Option<String>) -> Self {
        self.principal = principal;
        self
    }

    pub fn with_stdin(mut self, path: impl AsRef<Path>) -> Self {
        self.stdin_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_stdout(mut self, path: impl AsRef<Path>) -> Self {
        self.stdout_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_stderr_to_stdout(mut self, value: bool) -> Self {
        self.stderr_to_stdout = value;
        self
    }

    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// Exit status and peak resource usage of one execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionUsage {
    pub exit_code: i32,
    /// Used time in milliseconds
    pub time_ms: u32,
    /// Peak memory in KB
    pub memory_kb: u32,
}

/// Runs a request synchronously from the caller's point of view.
///
/// Callers serialize their calls, implementations need not support concurrent
/// invocations.
#[async_trait]
pub trait Executer: Send + Sync {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionUsage>;
}
