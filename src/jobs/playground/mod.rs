//! Playground - single ad-hoc run without test cases
//!
//! Compiles the code, runs it once on the given input and returns its
//! output. Every failure is a `PlaygroundError`, so callers can map compile,
//! runtime and timeout failures separately from infrastructure problems.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::diagnostics::{hint_for, scrub_workspace_path};
use crate::core::error::JudgeError;
use crate::core::languages::{self, LanguageConfig};
use crate::engine::compiler::compile;
use crate::engine::executer::{run_artifact, run_limits};
use crate::engine::source::write_source;
use crate::engine::workspace::Workspace;
use crate::jobs::judger::Judger;

fn default_language() -> String {
    "cpp".to_string()
}

/// Playground job received from the worker queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaygroundJob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub code: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// Custom stdin, empty when omitted
    #[serde(default)]
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaygroundOutput {
    pub output: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PlaygroundError {
    #[error("Compilation error: {}", with_hint(.diagnostics, .hint))]
    CompilationError {
        diagnostics: String,
        hint: Option<String>,
    },

    #[error("{message}")]
    RuntimeError { message: String, stderr: String },

    #[error("Time limit exceeded ({limit_ms}ms)")]
    Timeout { limit_ms: u32 },

    #[error(transparent)]
    System(#[from] JudgeError),
}

/// The raw diagnostics always come first; a hint is only appended
fn with_hint(diagnostics: &str, hint: &Option<String>) -> String {
    match hint {
        Some(hint) => format!("{}\nHint: {}", diagnostics, hint),
        None => diagnostics.to_string(),
    }
}

/// Wire form of a finished playground run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlaygroundResponse {
    Success(PlaygroundOutput),
    CompilationError {
        diagnostics: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        hint: Option<String>,
    },
    RuntimeError {
        message: String,
        stderr: String,
    },
    Timeout {
        limit_ms: u32,
    },
}

impl PlaygroundResponse {
    /// Split a run result into a response; only system failures remain errors
    pub fn from_result(
        result: Result<PlaygroundOutput, PlaygroundError>,
    ) -> Result<Self, JudgeError> {
        match result {
            Ok(output) => Ok(Self::Success(output)),
            Err(PlaygroundError::CompilationError { diagnostics, hint }) => {
                Ok(Self::CompilationError { diagnostics, hint })
            }
            Err(PlaygroundError::RuntimeError { message, stderr }) => {
                Ok(Self::RuntimeError { message, stderr })
            }
            Err(PlaygroundError::Timeout { limit_ms }) => Ok(Self::Timeout { limit_ms }),
            Err(PlaygroundError::System(e)) => Err(e),
        }
    }
}

impl Judger {
    /// Compile and run code once on `input`
    pub async fn run_once(
        &self,
        code: &str,
        language: &str,
        input: &str,
    ) -> Result<PlaygroundOutput, PlaygroundError> {
        let lang_config = languages::get_language_config(language)
            .ok_or_else(|| JudgeError::UnsupportedLanguage(language.to_string()))?;
        self.run_once_as(code, &lang_config, input).await
    }

    /// Same as `run_once` with an explicit language definition
    pub async fn run_once_as(
        &self,
        code: &str,
        lang_config: &LanguageConfig,
        input: &str,
    ) -> Result<PlaygroundOutput, PlaygroundError> {
        let workspace = self.workspaces().acquire()?;
        let result = self.run_in(&workspace, code, lang_config, input).await;
        self.workspaces().release(workspace).await;
        result
    }

    pub async fn run_playground(
        &self,
        job: &PlaygroundJob,
    ) -> Result<PlaygroundOutput, PlaygroundError> {
        info!(
            "Playground run for session {}",
            job.session_id.as_deref().unwrap_or("-")
        );
        self.run_once(&job.code, &job.language, &job.input).await
    }

    async fn run_in(
        &self,
        workspace: &Workspace,
        code: &str,
        lang_config: &LanguageConfig,
        input: &str,
    ) -> Result<PlaygroundOutput, PlaygroundError> {
        let root = workspace.root_path();
        let source_path = write_source(workspace, code, lang_config).await?;

        let build = compile(
            self.runner(),
            workspace,
            &source_path,
            lang_config,
            self.config(),
        )
        .await?;
        let artifact_path = match build.artifact_path {
            Some(path) if build.succeeded => path,
            _ => {
                let diagnostics = scrub_workspace_path(&build.diagnostics, root);
                let hint = hint_for(&diagnostics).map(str::to_string);
                return Err(PlaygroundError::CompilationError { diagnostics, hint });
            }
        };

        let limits = run_limits(lang_config, self.config());
        let run = run_artifact(
            self.runner(),
            workspace,
            &artifact_path,
            lang_config,
            input,
            &limits,
        )
        .await?;
        debug!("Playground run in workspace {} took {}ms", workspace.id(), run.duration_ms);

        if run.timed_out {
            return Err(PlaygroundError::Timeout {
                limit_ms: limits.time_ms,
            });
        }

        let stderr = scrub_workspace_path(&run.stderr, root);
        if let Some(reason) = run.failure_reason() {
            return Err(PlaygroundError::RuntimeError {
                message: scrub_workspace_path(&reason, root),
                stderr,
            });
        }

        Ok(PlaygroundOutput {
            output: run.stdout,
            stderr,
        })
    }
}
