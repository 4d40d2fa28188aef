//! Scripted executer for tests

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::{ExecutionRequest, ExecutionUsage, Executer};

struct Step {
    usage: std::result::Result<ExecutionUsage, String>,
    stdout: Option<String>,
}

/// Replays scripted outcomes in call order and records every request.
///
/// When a step carries stdout text it is written to the request's stdout path,
/// which is how tests produce compile logs and program output.
#[derive(Default)]
pub struct FakeExecuter {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ExecutionRequest>>,
}

impl FakeExecuter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_exit(self, exit_code: i32, time_ms: u32, memory_kb: u32) -> Self {
        self.push(Ok(usage(exit_code, time_ms, memory_kb)), None)
    }

    pub fn then_output(
        self,
        exit_code: i32,
        time_ms: u32,
        memory_kb: u32,
        stdout: impl Into<String>,
    ) -> Self {
        self.push(Ok(usage(exit_code, time_ms, memory_kb)), Some(stdout.into()))
    }

    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()), None)
    }

    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn push(self, usage: std::result::Result<ExecutionUsage, String>, stdout: Option<String>) -> Self {
        self.steps.lock().unwrap().push_back(Step { usage, stdout });
        self
    }
}

fn usage(exit_code: i32, time_ms: u32, memory_kb: u32) -> ExecutionUsage {
    ExecutionUsage {
        exit_code,
        time_ms,
        memory_kb,
    }
}

#[async_trait]
impl Executer for FakeExecuter {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionUsage> {
        self.requests.lock().unwrap().push(request.clone());

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("No scripted execution left"))?;

        if let (Some(stdout), Some(path)) = (&step.stdout, &request.stdout_path) {
            tokio::fs::write(path, stdout).await?;
        }

        step.usage.map_err(anyhow::Error::msg)
    }
}
