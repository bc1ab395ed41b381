//! Compiler module - Build step
//!
//! Compiles a materialized source file into an executable inside the
//! workspace. Compile failures are returned as data; only a missing
//! toolchain or a broken process layer is an error.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::config::JudgeConfig;
use crate::core::error::JudgeError;
use crate::core::languages::LanguageConfig;
use crate::engine::command_for;
use crate::engine::runner::process::signal_name;
use crate::engine::runner::{RunLimits, RunStatus, Runner};
use crate::engine::workspace::Workspace;

/// Result of a compilation attempt
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// Program to run, present only when the build succeeded
    pub artifact_path: Option<PathBuf>,
    pub succeeded: bool,
    /// Compile budget exceeded
    pub timed_out: bool,
    /// Compiler stderr/stdout, verbatim (warnings when the build succeeded)
    pub diagnostics: String,
    pub duration_ms: u64,
}

impl BuildResult {
    fn success(artifact_path: PathBuf, diagnostics: String, duration_ms: u64) -> Self {
        Self {
            artifact_path: Some(artifact_path),
            succeeded: true,
            timed_out: false,
            diagnostics,
            duration_ms,
        }
    }

    fn failure(diagnostics: String, timed_out: bool, duration_ms: u64) -> Self {
        Self {
            artifact_path: None,
            succeeded: false,
            timed_out,
            diagnostics,
            duration_ms,
        }
    }
}

/// Compile user-submitted code
///
/// Success is decided by the compiler's exit status alone; anything it
/// printed on a successful build is kept as advisory warnings.
pub async fn compile(
    runner: &dyn Runner,
    workspace: &Workspace,
    source_path: &Path,
    lang_config: &LanguageConfig,
    config: &JudgeConfig,
) -> Result<BuildResult, JudgeError> {
    let (compile_cmd, artifact_file) =
        match (&lang_config.compile_command, &lang_config.artifact_file) {
            (Some(cmd), Some(artifact)) => (cmd, artifact),
            _ => {
                // Interpreted language, the source itself is what runs
                return Ok(BuildResult::success(
                    source_path.to_path_buf(),
                    String::new(),
                    0,
                ));
            }
        };

    let artifact_path = workspace.file_path(artifact_file);
    let cmd = command_for(compile_cmd, workspace, source_path, &artifact_path)?;
    let limits = RunLimits::new(
        config.compile_time_limit_ms,
        config.compile_memory_limit_mb,
        config.output_limit_bytes(),
    );

    debug!("Compiling with {:?} in workspace {}", cmd.to_vec(), workspace.id());

    let outcome = match runner.run(&cmd, &limits, None).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_not_found() => {
            return Err(JudgeError::ToolchainMissing {
                program: cmd.program.clone(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    let mut diagnostics = join_streams(&outcome.stderr, &outcome.stdout);

    let result = match outcome.status {
        RunStatus::Exited(0) => {
            if tokio::fs::metadata(&artifact_path).await.is_ok() {
                mark_executable(&artifact_path).await?;
                BuildResult::success(artifact_path, diagnostics, outcome.time_ms)
            } else {
                push_line(&mut diagnostics, "Compiler produced no executable");
                BuildResult::failure(diagnostics, false, outcome.time_ms)
            }
        }
        RunStatus::TimeLimitExceeded => {
            push_line(
                &mut diagnostics,
                &format!(
                    "Compilation timed out after {}ms",
                    config.compile_time_limit_ms
                ),
            );
            BuildResult::failure(diagnostics, true, outcome.time_ms)
        }
        RunStatus::Signaled(sig) => {
            push_line(
                &mut diagnostics,
                &format!("Compiler crashed ({})", signal_name(sig)),
            );
            BuildResult::failure(diagnostics, false, outcome.time_ms)
        }
        RunStatus::Exited(code) => {
            if diagnostics.trim().is_empty() {
                diagnostics = format!("Compilation failed with exit code {}", code);
            }
            BuildResult::failure(diagnostics, false, outcome.time_ms)
        }
    };

    info!(
        "Compiled {} submission in workspace {}: success={}, {}ms",
        lang_config.name,
        workspace.id(),
        result.succeeded,
        result.duration_ms
    );

    Ok(result)
}

async fn mark_executable(path: &Path) -> Result<(), JudgeError> {
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(JudgeError::Source)
}

fn join_streams(stderr: &str, stdout: &str) -> String {
    match (stderr.trim().is_empty(), stdout.trim().is_empty()) {
        (false, false) => format!("{}\n{}", stderr.trim_end(), stdout.trim_end()),
        (false, true) => stderr.to_string(),
        (true, false) => stdout.to_string(),
        (true, true) => String::new(),
    }
}

fn push_line(text: &mut String, line: &str) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(line);
}
