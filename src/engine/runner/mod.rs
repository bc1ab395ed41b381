//! Runner module - Execution abstraction layer
//!
//! This module provides a unified interface for running child processes:
//! - `ProcessRunner`: direct execution in a fresh process group with a
//!   wall-clock budget and resource limits
//!
//! The runner module does NOT:
//! - Compare outputs or determine verdicts
//! - Know about languages or compilation
//! - Create or delete workspaces

pub mod process;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::core::error::RunnerError;

/// Command specification for execution
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program path or name
    pub program: String,
    /// Arguments to the program
    pub args: Vec<String>,
    /// Working directory
    pub work_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_dir: None,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(|a| a.into()).collect();
        self
    }

    pub fn with_work_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.work_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Build a command from an argument template (first element is the program)
    ///
    /// Each `(placeholder, value)` pair is substituted inside every element.
    /// The result is an argument vector; nothing is ever handed to a shell.
    pub fn from_template(template: &[String], vars: &[(&str, &str)]) -> Result<Self, RunnerError> {
        let mut iter = template.iter().map(|part| {
            vars.iter()
                .fold(part.clone(), |acc, (key, value)| acc.replace(key, value))
        });
        let program = iter.next().ok_or(RunnerError::EmptyCommand)?;
        Ok(Self::new(program).with_args(iter))
    }

    /// Convert to a vector of strings (program + args)
    pub fn to_vec(&self) -> Vec<String> {
        let mut v = vec![self.program.clone()];
        v.extend(self.args.clone());
        v
    }
}

/// Resource limits for execution
#[derive(Debug, Clone)]
pub struct RunLimits {
    /// Wall-clock time limit in milliseconds
    pub time_ms: u32,
    /// Address space limit in MB (0 = unlimited)
    pub memory_mb: u32,
    /// Maximum captured bytes per output stream
    pub output_bytes: usize,
}

impl RunLimits {
    pub fn new(time_ms: u32, memory_mb: u32, output_bytes: usize) -> Self {
        Self {
            time_ms,
            memory_mb,
            output_bytes,
        }
    }
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            time_ms: 1000,
            memory_mb: 256,
            output_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Execution status (raw, no verdict interpretation)
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// Program exited normally with given exit code
    Exited(i32),
    /// Killed by signal
    Signaled(i32),
    /// Wall-clock budget exceeded, process group killed
    TimeLimitExceeded,
}

/// Outcome of running a program
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Execution status
    pub status: RunStatus,
    /// Wall-clock time in milliseconds
    pub time_ms: u64,
    /// Stdout content
    pub stdout: String,
    /// Stderr content
    pub stderr: String,
    /// Stdout hit the output cap
    pub stdout_truncated: bool,
    /// Stderr hit the output cap
    pub stderr_truncated: bool,
}

/// Runner trait for executing programs
#[async_trait]
pub trait Runner: Send + Sync {
    /// Run a command with the given limits and optional stdin
    async fn run(
        &self,
        cmd: &CommandSpec,
        limits: &RunLimits,
        stdin: Option<&str>,
    ) -> Result<RunOutcome, RunnerError>;
}

// Re-exports
pub use process::ProcessRunner;

#[cfg(test)]
mod tests {
    use super::*;

    fn template(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_template_substitutes_per_argument() {
        let cmd = CommandSpec::from_template(
            &template(&["g++", "-O2", "-o", "{artifact}", "{source}"]),
            &[
                ("{source}", "/ws/my dir/main.cpp"),
                ("{artifact}", "/ws/my dir/main"),
            ],
        )
        .unwrap();

        assert_eq!(cmd.program, "g++");
        // A path with spaces stays a single argument
        assert_eq!(cmd.args, vec!["-O2", "-o", "/ws/my dir/main", "/ws/my dir/main.cpp"]);
    }

    #[test]
    fn test_from_template_program_placeholder() {
        let cmd =
            CommandSpec::from_template(&template(&["{artifact}"]), &[("{artifact}", "/ws/main")])
                .unwrap();
        assert_eq!(cmd.to_vec(), vec!["/ws/main"]);
    }

    #[test]
    fn test_from_template_empty() {
        assert!(matches!(
            CommandSpec::from_template(&[], &[]),
            Err(RunnerError::EmptyCommand)
        ));
    }
}
