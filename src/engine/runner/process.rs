//! Process runner implementation
//!
//! Spawns a program directly (no shell) as the leader of a new process
//! group, feeds stdin through a pipe, drains stdout/stderr concurrently and
//! enforces a wall-clock budget by killing the whole group.

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::resource::{getrlimit, setrlimit, Resource};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::{setpgid, Pid};
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{CommandSpec, RunLimits, RunOutcome, RunStatus, Runner};
use crate::core::error::RunnerError;

/// PATH given to every child
const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Largest file a child may create (256MB)
const FSIZE_LIMIT_BYTES: u64 = 256 * 1024 * 1024;

/// How long to wait for output pipes to close after the process is gone
const READER_GRACE: Duration = Duration::from_millis(500);

const READ_CHUNK: usize = 8192;

/// Runner that executes programs directly as child processes
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    path_env: String,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self {
            path_env: DEFAULT_PATH.to_string(),
        }
    }

    /// Use a different PATH for children
    pub fn with_path_env(mut self, path_env: impl Into<String>) -> Self {
        self.path_env = path_env.into();
        self
    }

    /// Run a program to completion or until its budget expires
    pub async fn execute(
        &self,
        cmd: &CommandSpec,
        limits: &RunLimits,
        stdin_content: Option<&str>,
    ) -> Result<RunOutcome, RunnerError> {
        if cmd.program.is_empty() {
            return Err(RunnerError::EmptyCommand);
        }

        debug!(
            "Running {:?} with args {:?} (time={}ms, memory={}MB)",
            cmd.program, cmd.args, limits.time_ms, limits.memory_mb
        );

        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .env_clear()
            .env("PATH", &self.path_env)
            .env("LC_ALL", "C");
        if let Some(dir) = &cmd.work_dir {
            command.current_dir(dir).env("HOME", dir);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let memory_bytes = u64::from(limits.memory_mb) * 1024 * 1024;
        // SAFETY: the closure only calls async-signal-safe syscalls
        // (setpgid, getrlimit, setrlimit) and does not allocate.
        unsafe {
            command.pre_exec(move || prepare_child(memory_bytes));
        }

        let start = Instant::now();
        let mut child = command.spawn().map_err(|source| RunnerError::Spawn {
            program: cmd.program.clone(),
            source,
        })?;
        let pid = child.id();

        // Feed stdin from its own task so a program that never reads cannot
        // stall us, then close the pipe so readers see EOF
        let stdin_task = child.stdin.take().map(|mut pipe| {
            let payload = stdin_content.unwrap_or_default().as_bytes().to_vec();
            tokio::spawn(async move {
                if !payload.is_empty() {
                    if let Err(e) = pipe.write_all(&payload).await {
                        debug!("Child closed stdin early: {}", e);
                    }
                }
                drop(pipe);
            })
        });

        let stdout_task = child
            .stdout
            .take()
            .map(|pipe| tokio::spawn(read_capped(pipe, limits.output_bytes)));
        let stderr_task = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(read_capped(pipe, limits.output_bytes)));

        let budget = Duration::from_millis(u64::from(limits.time_ms));
        let status = match tokio::time::timeout(budget, child.wait()).await {
            Ok(Ok(exit_status)) => {
                // Reap anything the program left behind in its group
                kill_process_group(pid);
                if let Some(sig) = exit_status.signal() {
                    RunStatus::Signaled(sig)
                } else {
                    RunStatus::Exited(exit_status.code().unwrap_or(-1))
                }
            }
            Ok(Err(source)) => {
                kill_process_group(pid);
                let _ = child.kill().await;
                return Err(RunnerError::Wait {
                    program: cmd.program.clone(),
                    source,
                });
            }
            Err(_) => {
                debug!(
                    "{:?} exceeded {}ms budget, killing process group",
                    cmd.program, limits.time_ms
                );
                kill_process_group(pid);
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out process {:?}: {}", pid, e);
                }
                RunStatus::TimeLimitExceeded
            }
        };
        let time_ms = start.elapsed().as_millis() as u64;

        if let Some(task) = stdin_task {
            task.abort();
        }
        let stdout = collect_output(stdout_task).await;
        let stderr = collect_output(stderr_task).await;

        Ok(RunOutcome {
            status,
            time_ms,
            stdout: String::from_utf8_lossy(&stdout.bytes).into_owned(),
            stderr: String::from_utf8_lossy(&stderr.bytes).into_owned(),
            stdout_truncated: stdout.truncated,
            stderr_truncated: stderr.truncated,
        })
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    async fn run(
        &self,
        cmd: &CommandSpec,
        limits: &RunLimits,
        stdin: Option<&str>,
    ) -> Result<RunOutcome, RunnerError> {
        self.execute(cmd, limits, stdin).await
    }
}

/// Runs in the child between fork and exec
fn prepare_child(memory_bytes: u64) -> io::Result<()> {
    setpgid(Pid::from_raw(0), Pid::from_raw(0))?;
    lower_limit(Resource::RLIMIT_CORE, 0)?;
    lower_limit(Resource::RLIMIT_FSIZE, FSIZE_LIMIT_BYTES)?;
    if memory_bytes > 0 {
        lower_limit(Resource::RLIMIT_AS, memory_bytes)?;
    }
    Ok(())
}

/// Set both soft and hard limit, never above the inherited hard limit
fn lower_limit(resource: Resource, value: u64) -> io::Result<()> {
    let (_, hard) = getrlimit(resource)?;
    let value = value.min(hard);
    setrlimit(resource, value, value)?;
    Ok(())
}

/// SIGKILL every process in the group led by `pid`
fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid else {
        return;
    };
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!("Failed to kill process group {}: {}", pid, e),
    }
}

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Read a stream to EOF, keeping at most `limit` bytes
///
/// Bytes past the limit are drained and dropped so the writer never blocks
/// on a full pipe.
async fn read_capped<R>(mut reader: R, limit: usize) -> io::Result<Captured>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Captured::default();
    let mut buf = [0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(captured.bytes.len());
        if n > room {
            captured.bytes.extend_from_slice(&buf[..room]);
            captured.truncated = true;
        } else {
            captured.bytes.extend_from_slice(&buf[..n]);
        }
    }
    Ok(captured)
}

async fn collect_output(task: Option<JoinHandle<io::Result<Captured>>>) -> Captured {
    let Some(task) = task else {
        return Captured::default();
    };
    let abort = task.abort_handle();
    match tokio::time::timeout(READER_GRACE, task).await {
        Ok(Ok(Ok(captured))) => captured,
        Ok(Ok(Err(e))) => {
            warn!("Failed to read child output: {}", e);
            Captured::default()
        }
        Ok(Err(e)) => {
            warn!("Output reader task failed: {}", e);
            Captured::default()
        }
        Err(_) => {
            // An escaped descendant still holds the pipe
            abort.abort();
            warn!("Output pipe still open after process exit, discarding output");
            Captured::default()
        }
    }
}

/// Name of a signal number, e.g. `SIGSEGV`
pub fn signal_name(sig: i32) -> String {
    Signal::try_from(sig)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|_| format!("signal {}", sig))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("/bin/sh").with_args(["-c", script])
    }

    fn limits(time_ms: u32) -> RunLimits {
        RunLimits::new(time_ms, 0, 1024 * 1024)
    }

    #[tokio::test]
    async fn test_stdin_is_piped_to_program() {
        let outcome = ProcessRunner::new()
            .execute(&sh("cat"), &limits(5000), Some("5\n6 7\n"))
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Exited(0));
        assert_eq!(outcome.stdout, "5\n6 7\n");
        assert!(outcome.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_exit_code_and_stderr() {
        let outcome = ProcessRunner::new()
            .execute(&sh("echo oops >&2; exit 3"), &limits(5000), None)
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Exited(3));
        assert_eq!(outcome.stderr, "oops\n");
    }

    #[tokio::test]
    async fn test_signal_is_reported() {
        let outcome = ProcessRunner::new()
            .execute(&sh("kill -SEGV $$"), &limits(5000), None)
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Signaled(Signal::SIGSEGV as i32));
        assert_eq!(signal_name(Signal::SIGSEGV as i32), "SIGSEGV");
        assert_eq!(signal_name(1000), "signal 1000");
    }

    #[tokio::test]
    async fn test_timeout_kills_program() {
        let start = Instant::now();
        let outcome = ProcessRunner::new()
            .execute(&sh("echo partial; sleep 30"), &limits(300), None)
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::TimeLimitExceeded);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(outcome.stdout, "partial\n");
    }

    #[tokio::test]
    async fn test_timeout_kills_whole_process_group() {
        let outcome = ProcessRunner::new()
            .execute(&sh("sleep 30 & echo $!; wait"), &limits(300), None)
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::TimeLimitExceeded);

        let pid: u32 = outcome.stdout.trim().parse().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let alive = std::fs::read_to_string(format!("/proc/{}/stat", pid))
            .map(|stat| !stat.contains(") Z"))
            .unwrap_or(false);
        assert!(!alive, "background child {} survived", pid);
    }

    #[tokio::test]
    async fn test_program_ignoring_stdin_does_not_hang() {
        let input = "x".repeat(1024 * 1024);
        let outcome = ProcessRunner::new()
            .execute(&sh("exit 0"), &limits(5000), Some(&input))
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Exited(0));
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let outcome = ProcessRunner::new()
            .execute(
                &sh("head -c 100000 /dev/zero | tr '\\0' a"),
                &RunLimits::new(5000, 0, 1000),
                None,
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Exited(0));
        assert_eq!(outcome.stdout.len(), 1000);
        assert!(outcome.stdout_truncated);
        assert!(!outcome.stderr_truncated);
    }

    #[tokio::test]
    async fn test_streams_are_capped_independently() {
        let outcome = ProcessRunner::new()
            .execute(
                &sh("echo ok; head -c 100000 /dev/zero | tr '\\0' e >&2"),
                &RunLimits::new(5000, 0, 1000),
                None,
            )
            .await
            .unwrap();
        assert_eq!(outcome.stdout, "ok\n");
        assert!(!outcome.stdout_truncated);
        assert_eq!(outcome.stderr.len(), 1000);
        assert!(outcome.stderr_truncated);
    }

    #[tokio::test]
    async fn test_environment_is_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = ProcessRunner::new()
            .execute(
                &sh("echo \"$HOME|$LC_ALL|$CARGO_PKG_NAME\"; pwd").with_work_dir(dir.path()),
                &limits(5000),
                None,
            )
            .await
            .unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        let mut lines = outcome.stdout.lines();
        assert_eq!(
            lines.next().unwrap(),
            format!("{}|C|", dir.path().display())
        );
        assert_eq!(
            std::path::Path::new(lines.next().unwrap()).canonicalize().unwrap(),
            canonical
        );
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = ProcessRunner::new()
            .execute(
                &CommandSpec::new("/definitely/not/a/compiler"),
                &limits(1000),
                None,
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
