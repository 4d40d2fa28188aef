//! Executer backed by a plain child process
//!
//! Time is measured on the wall clock and peak memory is sampled from
//! `/proc/<pid>/status`. The whole process group is killed once a limit is
//! reached. Privileges are dropped to the configured user when the worker
//! runs as root.

use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::{setgid, setgroups, setuid, Gid, Pid, Uid, User};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{ExecutionRequest, ExecutionUsage, Executer};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct ProcessExecuter {
    poll_interval: Duration,
}

impl Default for ProcessExecuter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessExecuter {
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    fn build_command(&self, request: &ExecutionRequest) -> Result<Command> {
        let (program, args) = request
            .command
            .split_first()
            .context("No command specified for execution")?;

        let mut cmd = Command::new(program);
        cmd.args(args).kill_on_drop(true).process_group(0);

        match &request.stdin_path {
            Some(path) => {
                let file = std::fs::File::open(path)
                    .with_context(|| format!("Failed to open stdin file {:?}", path))?;
                cmd.stdin(Stdio::from(file));
            }
            None => {
                cmd.stdin(Stdio::null());
            }
        }

        match &request.stdout_path {
            Some(path) => {
                let file = std::fs::File::create(path)
                    .with_context(|| format!("Failed to create stdout file {:?}", path))?;
                if request.stderr_to_stdout {
                    cmd.stderr(Stdio::from(file.try_clone()?));
                } else {
                    cmd.stderr(Stdio::null());
                }
                cmd.stdout(Stdio::from(file));
            }
            None => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        if let Some(name) = &request.principal {
            if let Some((uid, gid)) = resolve_principal(name)? {
                // SAFETY: only async-signal-safe syscalls run between fork and exec
                unsafe {
                    cmd.pre_exec(move || {
                        setgroups(&[gid])?;
                        setgid(gid)?;
                        setuid(uid)?;
                        Ok(())
                    });
                }
            }
        }

        Ok(cmd)
    }
}

#[async_trait]
impl Executer for ProcessExecuter {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionUsage> {
        let mut cmd = self.build_command(request)?;
        let limits = request.limits;

        debug!("Executing {:?} with limits {:?}", request.command, limits);

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn {:?}", request.command))?;
        let pid = child.id();

        let mut ticker = tokio::time::interval(self.poll_interval);
        let mut peak_memory_kb = 0u32;
        let mut killed = false;

        let status = loop {
            tokio::select! {
                status = child.wait() => {
                    break status.context("Failed to wait for child process")?;
                }
                _ = ticker.tick() => {
                    if let Some(pid) = pid {
                        if let Some(kb) = read_peak_memory_kb(pid).await {
                            peak_memory_kb = peak_memory_kb.max(kb);
                        }
                    }

                    let elapsed = elapsed_ms(start);
                    let over_time = limits.time_ms > 0 && elapsed >= limits.time_ms;
                    let over_memory = limits.memory_kb > 0 && peak_memory_kb >= limits.memory_kb;
                    if (over_time || over_memory) && !killed {
                        debug!(
                            "Killing {:?}: elapsed={}ms peak={}KB",
                            request.command, elapsed, peak_memory_kb
                        );
                        kill_group(pid);
                        killed = true;
                    }
                }
            }
        };

        let exit_code = status
            .code()
            .or_else(|| status.signal().map(|sig| 128 + sig))
            .unwrap_or(-1);

        Ok(ExecutionUsage {
            exit_code,
            time_ms: elapsed_ms(start),
            memory_kb: peak_memory_kb,
        })
    }
}

/// Look up the uid/gid to switch to. Without root there is nothing to switch.
fn resolve_principal(name: &str) -> Result<Option<(Uid, Gid)>> {
    if !Uid::effective().is_root() {
        debug!("Not running as root, executing as the current user instead of {}", name);
        return Ok(None);
    }

    let user = User::from_name(name)
        .with_context(|| format!("Failed to look up user {}", name))?
        .with_context(|| format!("Unknown execution user {}", name))?;
    Ok(Some((user.uid, user.gid)))
}

fn kill_group(pid: Option<u32>) {
    let Some(pid) = pid else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        warn!("Failed to kill process group {}: {}", pid, e);
    }
}

fn elapsed_ms(start: Instant) -> u32 {
    u32::try_from(start.elapsed().as_millis()).unwrap_or(u32::MAX)
}

async fn read_peak_memory_kb(pid: u32) -> Option<u32> {
    let status = tokio::fs::read_to_string(format!("/proc/{}/status", pid))
        .await
        .ok()?;
    parse_vm_hwm(&status)
}

/// Extract `VmHWM` (peak resident set size, KB) from `/proc/<pid>/status`
fn parse_vm_hwm(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmHWM:"))
        .and_then(|value| value.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executer::ExecutionLimits;

    #[test]
    fn test_parse_vm_hwm() {
        let status = "Name:\tcat\nVmPeak:\t    8000 kB\nVmHWM:\t    1536 kB\nVmRSS:\t    1200 kB\n";
        assert_eq!(parse_vm_hwm(status), Some(1536));
        assert_eq!(parse_vm_hwm("Name:\tzombie\nState:\tZ\n"), None);
    }

    #[tokio::test]
    async fn test_exit_codes_are_reported() {
        let executer = ProcessExecuter::new();

        let ok = executer.execute(&ExecutionRequest::new(["true"])).await.unwrap();
        assert_eq!(ok.exit_code, 0);

        let failed = executer.execute(&ExecutionRequest::new(["false"])).await.unwrap();
        assert_eq!(failed.exit_code, 1);
    }

    #[tokio::test]
    async fn test_redirects_stdin_and_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.txt");
        let output = dir.path().join("output.txt");
        std::fs::write(&input, "1 2\n").unwrap();

        let request = ExecutionRequest::new(["cat"])
            .with_stdin(&input)
            .with_stdout(&output);
        let usage = ProcessExecuter::new().execute(&request).await.unwrap();

        assert_eq!(usage.exit_code, 0);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "1 2\n");
    }

    #[tokio::test]
    async fn test_stderr_joins_stdout_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("compile.log");

        let request = ExecutionRequest::new(["sh", "-c", "echo broken >&2; exit 3"])
            .with_stdout(&log)
            .with_stderr_to_stdout(true);
        let usage = ProcessExecuter::new().execute(&request).await.unwrap();

        assert_eq!(usage.exit_code, 3);
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "broken\n");
    }

    #[tokio::test]
    async fn test_kills_at_time_limit() {
        let request =
            ExecutionRequest::new(["sleep", "5"]).with_limits(ExecutionLimits::new(200, 0));
        let usage = ProcessExecuter::new().execute(&request).await.unwrap();

        assert_ne!(usage.exit_code, 0);
        assert!(usage.time_ms >= 200);
        assert!(usage.time_ms < 5000);
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let request = ExecutionRequest::new(["/nonexistent/program"]);
        assert!(ProcessExecuter::new().execute(&request).await.is_err());
        assert!(ProcessExecuter::new()
            .execute(&ExecutionRequest::new(Vec::<String>::new()))
            .await
            .is_err());
    }
}
