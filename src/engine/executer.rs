//! Run step
//!
//! Executes a compiled artifact once against one stdin payload.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::config::JudgeConfig;
use crate::core::error::{JudgeError, RunnerError};
use crate::core::languages::LanguageConfig;
use crate::engine::command_for;
use crate::engine::runner::process::signal_name;
use crate::engine::runner::{RunLimits, RunStatus, Runner};
use crate::engine::workspace::Workspace;

/// Captured result of one execution
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    /// Name of the terminating signal, e.g. "SIGSEGV"
    pub signal: Option<String>,
    pub timed_out: bool,
    pub duration_ms: u64,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    /// The artifact could not be started at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_error: Option<String>,
}

impl RunResult {
    /// Exited with code 0 inside the budget
    pub fn is_clean_exit(&self) -> bool {
        !self.timed_out && self.signal.is_none() && self.exit_code == Some(0)
    }

    /// One-line reason for an abnormal termination, `None` on a clean exit or timeout
    pub fn failure_reason(&self) -> Option<String> {
        if self.timed_out || self.is_clean_exit() {
            return None;
        }
        Some(if let Some(e) = &self.start_error {
            format!("Failed to start program: {}", e)
        } else if let Some(sig) = &self.signal {
            format!("Runtime error: killed by {}", sig)
        } else {
            format!("Runtime error: exit code {}", self.exit_code.unwrap_or(-1))
        })
    }
}

/// Run limits for a language, derived from the configured run budget
pub fn run_limits(lang_config: &LanguageConfig, config: &JudgeConfig) -> RunLimits {
    RunLimits::new(
        lang_config.calculate_time_limit(config.run_time_limit_ms),
        lang_config.calculate_memory_limit(config.run_memory_limit_mb),
        config.output_limit_bytes(),
    )
}

/// Run the artifact with `stdin_payload` piped to its standard input
pub async fn run_artifact(
    runner: &dyn Runner,
    workspace: &Workspace,
    artifact_path: &Path,
    lang_config: &LanguageConfig,
    stdin_payload: &str,
    limits: &RunLimits,
) -> Result<RunResult, JudgeError> {
    let source_path = workspace.file_path(&lang_config.source_file);
    let cmd = command_for(&lang_config.run_command, workspace, &source_path, artifact_path)?;

    let outcome = match runner.run(&cmd, limits, Some(stdin_payload)).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_not_found() && !lang_config.is_compiled() => {
            // Interpreter missing is a toolchain problem, not the submission's
            return Err(JudgeError::ToolchainMissing {
                program: cmd.program.clone(),
            });
        }
        Err(e @ RunnerError::Spawn { .. }) => {
            warn!("Failed to start artifact in workspace {}: {}", workspace.id(), e);
            return Ok(RunResult {
                start_error: Some(e.to_string()),
                ..RunResult::default()
            });
        }
        Err(e) => return Err(e.into()),
    };

    let (exit_code, signal, timed_out) = match outcome.status {
        RunStatus::Exited(code) => (Some(code), None, false),
        RunStatus::Signaled(sig) => (None, Some(signal_name(sig)), false),
        RunStatus::TimeLimitExceeded => (None, None, true),
    };

    debug!(
        "Run finished in workspace {}: exit={:?}, signal={:?}, timed_out={}, {}ms",
        workspace.id(),
        exit_code,
        signal,
        timed_out,
        outcome.time_ms
    );

    Ok(RunResult {
        stdout: outcome.stdout,
        stderr: outcome.stderr,
        exit_code,
        signal,
        timed_out,
        duration_ms: outcome.time_ms,
        stdout_truncated: outcome.stdout_truncated,
        stderr_truncated: outcome.stderr_truncated,
        start_error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::runner::ProcessRunner;
    use crate::engine::workspace::WorkspaceManager;

    fn shell_language() -> LanguageConfig {
        LanguageConfig {
            name: "sh".into(),
            source_file: "main.sh".into(),
            artifact_file: None,
            compile_command: None,
            run_command: vec!["/bin/sh".into(), "{source}".into()],
            time_limit: None,
            memory_limit: None,
        }
    }

    async fn run_script(script: &str, stdin: &str, time_ms: u32) -> RunResult {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let workspace = manager.acquire().unwrap();
        let lang = shell_language();
        let source = workspace.file_path(&lang.source_file);
        std::fs::write(&source, script).unwrap();

        let result = run_artifact(
            &ProcessRunner::new(),
            &workspace,
            &source,
            &lang,
            stdin,
            &RunLimits::new(time_ms, 0, 1024 * 1024),
        )
        .await
        .unwrap();
        manager.release(workspace).await;
        result
    }

    #[tokio::test]
    async fn test_clean_run() {
        let result = run_script("read x; echo \"got $x\"", "5\n", 5000).await;
        assert!(result.is_clean_exit());
        assert_eq!(result.stdout, "got 5\n");
    }

    #[tokio::test]
    async fn test_runs_inside_workspace() {
        let result = run_script("touch scratch && ls", "", 5000).await;
        assert!(result.is_clean_exit());
        assert!(result.stdout.contains("main.sh"));
        assert!(result.stdout.contains("scratch"));
    }

    #[tokio::test]
    async fn test_signal_is_named() {
        let result = run_script("kill -ABRT $$", "", 5000).await;
        assert!(!result.is_clean_exit());
        assert_eq!(result.signal.as_deref(), Some("SIGABRT"));
        assert_eq!(result.exit_code, None);
        assert_eq!(
            result.failure_reason().as_deref(),
            Some("Runtime error: killed by SIGABRT")
        );
    }

    #[tokio::test]
    async fn test_timeout_flag() {
        let result = run_script("while :; do :; done", "", 300).await;
        assert!(result.timed_out);
        assert!(!result.is_clean_exit());
        assert!(result.failure_reason().is_none());
    }

    #[tokio::test]
    async fn test_unstartable_artifact_is_data() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let workspace = manager.acquire().unwrap();
        let mut lang = shell_language();
        lang.compile_command = Some(vec!["true".into()]);
        lang.artifact_file = Some("main".into());
        lang.run_command = vec!["{artifact}".into()];

        // Not executable
        let artifact = workspace.file_path("main");
        std::fs::write(&artifact, "garbage").unwrap();

        let result = run_artifact(
            &ProcessRunner::new(),
            &workspace,
            &artifact,
            &lang,
            "",
            &RunLimits::default(),
        )
        .await
        .unwrap();
        assert!(result.start_error.is_some());
        assert!(!result.is_clean_exit());
        assert!(result
            .failure_reason()
            .unwrap()
            .starts_with("Failed to start program"));

        manager.release(workspace).await;
    }

    #[test]
    fn test_run_limits_follow_language() {
        let config = JudgeConfig::default();
        let mut lang = shell_language();
        assert_eq!(run_limits(&lang, &config).time_ms, 5_000);
        lang.time_limit = Some((2, 1));
        assert_eq!(run_limits(&lang, &config).time_ms, 11_000);
    }
}
