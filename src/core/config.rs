//! Judge configuration
//!
//! Budgets and paths for the judge, loaded from environment variables with
//! fixed defaults.

use std::path::PathBuf;
use std::str::FromStr;

use crate::core::error::JudgeError;

/// Judge configuration
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    /// Compile time limit in milliseconds (default: 10000ms = 10s)
    pub compile_time_limit_ms: u32,
    /// Compile memory limit in MB (default: 2048MB)
    pub compile_memory_limit_mb: u32,
    /// Run time limit in milliseconds (default: 5000ms = 5s)
    pub run_time_limit_ms: u32,
    /// Run memory limit in MB (default: 512MB, 0 disables the limit)
    pub run_memory_limit_mb: u32,
    /// Maximum captured bytes per output stream, in KB
    pub output_limit_kb: u32,
    /// Directory under which per-submission workspaces are created
    pub workspace_root: PathBuf,
    /// Maximum number of jobs the worker runs at once
    pub max_concurrent_jobs: usize,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            compile_time_limit_ms: 10_000,
            compile_memory_limit_mb: 2048,
            run_time_limit_ms: 5_000,
            run_memory_limit_mb: 512,
            output_limit_kb: 16 * 1024,
            workspace_root: std::env::temp_dir().join("code-judge"),
            max_concurrent_jobs: 4,
        }
    }
}

impl JudgeConfig {
    /// Load configuration from `JUDGE_*` environment variables
    pub fn from_env() -> Result<Self, JudgeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, JudgeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            compile_time_limit_ms: parse_var(
                &lookup,
                "JUDGE_COMPILE_TIME_LIMIT_MS",
                defaults.compile_time_limit_ms,
            )?,
            compile_memory_limit_mb: parse_var(
                &lookup,
                "JUDGE_COMPILE_MEMORY_LIMIT_MB",
                defaults.compile_memory_limit_mb,
            )?,
            run_time_limit_ms: parse_var(
                &lookup,
                "JUDGE_RUN_TIME_LIMIT_MS",
                defaults.run_time_limit_ms,
            )?,
            run_memory_limit_mb: parse_var(
                &lookup,
                "JUDGE_RUN_MEMORY_LIMIT_MB",
                defaults.run_memory_limit_mb,
            )?,
            output_limit_kb: parse_var(&lookup, "JUDGE_OUTPUT_LIMIT_KB", defaults.output_limit_kb)?,
            workspace_root: lookup("JUDGE_WORKSPACE_ROOT")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.workspace_root),
            max_concurrent_jobs: parse_var(
                &lookup,
                "JUDGE_MAX_CONCURRENT_JOBS",
                defaults.max_concurrent_jobs,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), JudgeError> {
        if self.compile_time_limit_ms == 0 {
            return Err(JudgeError::Config(
                "JUDGE_COMPILE_TIME_LIMIT_MS must be greater than 0".into(),
            ));
        }
        if self.run_time_limit_ms == 0 {
            return Err(JudgeError::Config(
                "JUDGE_RUN_TIME_LIMIT_MS must be greater than 0".into(),
            ));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(JudgeError::Config(
                "JUDGE_MAX_CONCURRENT_JOBS must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Output cap in bytes
    pub fn output_limit_bytes(&self) -> usize {
        self.output_limit_kb as usize * 1024
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, JudgeError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| JudgeError::Config(format!("Invalid {}={:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}
