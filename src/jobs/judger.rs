//! Judger module for processing submission judge jobs
//!
//! Drives one submission through the pipeline:
//! `Materializing -> Compiling -> {CompileFailed | Running -> Evaluating -> ... -> Done}`.
//! Compile and run failures become data in the `JudgingSummary`; only
//! infrastructure failures are returned as `JudgeError`.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::config::JudgeConfig;
use crate::core::diagnostics::{hint_for, scrub_workspace_path};
use crate::core::error::JudgeError;
use crate::core::languages::{self, LanguageConfig};
use crate::core::verdict::Verdict;
use crate::engine::checker::evaluate;
use crate::engine::compiler::compile;
use crate::engine::executer::{run_artifact, run_limits, RunResult};
use crate::engine::runner::{ProcessRunner, Runner};
use crate::engine::source::write_source;
use crate::engine::workspace::{Workspace, WorkspaceManager};

/// Description given to the implicit case of a submission without test cases
pub const SAMPLE_RUN_DESCRIPTION: &str = "Sample run";

/// A user submission pending judgment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(alias = "code")]
    pub source_text: String,
    pub language: String,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

/// One (input, expected output) pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub expected_output: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Judge job received from the worker queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeJob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
    #[serde(flatten)]
    pub submission: Submission,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseResult {
    /// 1-based position in the submitted test case list
    pub index: usize,
    pub description: String,
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub passed: bool,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub passed: usize,
    pub total: usize,
    pub percentage: u32,
}

impl Summary {
    pub fn new(passed: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            ((passed as f64 * 100.0) / total as f64).round() as u32
        };
        Self {
            passed,
            total,
            percentage,
        }
    }
}

/// Compiler output shown when the build step rejects a submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileError {
    /// Raw compiler output with workspace paths removed
    pub diagnostics: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Result of judging a submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgingSummary {
    pub overall_verdict: Verdict,
    pub summary: Summary,
    pub per_case: Vec<CaseResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_error: Option<CompileError>,
    /// Compiler output of a successful build
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<String>,
}

impl JudgingSummary {
    /// Aggregate finished cases; accepted only if every case passed
    pub fn from_cases(per_case: Vec<CaseResult>, warnings: Option<String>) -> Self {
        let total = per_case.len();
        let passed = per_case.iter().filter(|c| c.passed).count();
        let overall_verdict = if total > 0 && passed == total {
            Verdict::Accepted
        } else {
            Verdict::WrongAnswer
        };

        Self {
            overall_verdict,
            summary: Summary::new(passed, total),
            per_case,
            compile_error: None,
            warnings,
        }
    }

    /// Every case is reported as a compilation error, none of them ran
    pub fn compile_failed(cases: &[TestCase], compile_error: CompileError) -> Self {
        let per_case = cases
            .iter()
            .enumerate()
            .map(|(i, case)| CaseResult {
                index: i + 1,
                description: describe(case, i),
                input: case.input.clone(),
                expected_output: case.expected_output.clone(),
                actual_output: String::new(),
                passed: false,
                verdict: Verdict::CompilationError,
                error: None,
            })
            .collect::<Vec<_>>();

        Self {
            overall_verdict: Verdict::CompilationError,
            summary: Summary::new(0, per_case.len()),
            per_case,
            compile_error: Some(compile_error),
            warnings: None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.overall_verdict.is_accepted()
    }
}

fn describe(case: &TestCase, i: usize) -> String {
    match &case.description {
        Some(d) if !d.trim().is_empty() => d.clone(),
        _ => format!("Test case {}", i + 1),
    }
}

/// Test cases to run; a submission without any is judged as one empty sample run
fn effective_cases(submission: &Submission) -> Vec<TestCase> {
    if submission.test_cases.is_empty() {
        vec![TestCase {
            input: String::new(),
            expected_output: String::new(),
            description: Some(SAMPLE_RUN_DESCRIPTION.to_string()),
        }]
    } else {
        submission.test_cases.clone()
    }
}

/// The judging orchestrator
///
/// Holds no per-run state, so one `Judger` can be shared by any number of
/// concurrent tasks.
#[derive(Clone)]
pub struct Judger {
    config: JudgeConfig,
    workspaces: WorkspaceManager,
    runner: Arc<dyn Runner>,
}

impl Judger {
    pub fn new(config: JudgeConfig) -> Self {
        Self::with_runner(config, Arc::new(ProcessRunner::new()))
    }

    pub fn with_runner(config: JudgeConfig, runner: Arc<dyn Runner>) -> Self {
        let workspaces = WorkspaceManager::new(config.workspace_root.clone());
        Self {
            config,
            workspaces,
            runner,
        }
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    pub(crate) fn runner(&self) -> &dyn Runner {
        self.runner.as_ref()
    }

    /// Judge a submission in a language from the registry
    pub async fn judge(&self, submission: &Submission) -> Result<JudgingSummary, JudgeError> {
        let lang_config = languages::get_language_config(&submission.language)
            .ok_or_else(|| JudgeError::UnsupportedLanguage(submission.language.clone()))?;
        self.judge_as(submission, &lang_config).await
    }

    /// Judge a submission with an explicit language definition
    ///
    /// The workspace is released on every path out of this function; if the
    /// future is dropped or panics, the workspace's own drop removes it.
    pub async fn judge_as(
        &self,
        submission: &Submission,
        lang_config: &LanguageConfig,
    ) -> Result<JudgingSummary, JudgeError> {
        let workspace = self.workspaces.acquire()?;
        let result = self.judge_in(&workspace, submission, lang_config).await;
        self.workspaces.release(workspace).await;
        result
    }

    async fn judge_in(
        &self,
        workspace: &Workspace,
        submission: &Submission,
        lang_config: &LanguageConfig,
    ) -> Result<JudgingSummary, JudgeError> {
        let cases = effective_cases(submission);
        let root = workspace.root_path();

        debug!("Workspace {}: materializing {} source", workspace.id(), lang_config.name);
        let source_path = write_source(workspace, &submission.source_text, lang_config).await?;

        debug!("Workspace {}: compiling", workspace.id());
        let build = compile(
            self.runner(),
            workspace,
            &source_path,
            lang_config,
            &self.config,
        )
        .await?;

        let artifact_path = match build.artifact_path {
            Some(path) if build.succeeded => path,
            _ => {
                let diagnostics = scrub_workspace_path(&build.diagnostics, root);
                let hint = hint_for(&diagnostics).map(str::to_string);
                info!(
                    "Workspace {}: compilation failed (timed_out={})",
                    workspace.id(),
                    build.timed_out
                );
                return Ok(JudgingSummary::compile_failed(
                    &cases,
                    CompileError { diagnostics, hint },
                ));
            }
        };

        let warnings = Some(scrub_workspace_path(&build.diagnostics, root))
            .filter(|w| !w.trim().is_empty());

        let limits = run_limits(lang_config, &self.config);
        let mut per_case = Vec::with_capacity(cases.len());

        // Cases share one artifact, so they run strictly one after another
        for (i, case) in cases.iter().enumerate() {
            debug!("Workspace {}: running case {}/{}", workspace.id(), i + 1, cases.len());
            let run = run_artifact(
                self.runner(),
                workspace,
                &artifact_path,
                lang_config,
                &case.input,
                &limits,
            )
            .await?;

            let evaluation = evaluate(&run, &case.expected_output);
            let error = case_error(&run, evaluation.verdict, limits.time_ms, root);

            per_case.push(CaseResult {
                index: i + 1,
                description: describe(case, i),
                input: case.input.clone(),
                expected_output: case.expected_output.clone(),
                actual_output: run.stdout,
                passed: evaluation.passed,
                verdict: evaluation.verdict,
                error,
            });
        }

        let summary = JudgingSummary::from_cases(per_case, warnings);
        info!(
            "Workspace {}: judged {} submission, {} ({}/{})",
            workspace.id(),
            lang_config.name,
            summary.overall_verdict,
            summary.summary.passed,
            summary.summary.total
        );

        Ok(summary)
    }
}

/// Human-readable explanation of a failed case
fn case_error(run: &RunResult, verdict: Verdict, time_limit_ms: u32, root: &Path) -> Option<String> {
    let stderr = scrub_workspace_path(run.stderr.trim_end(), root);
    let with_stderr = |headline: String| {
        if stderr.is_empty() {
            headline
        } else {
            format!("{}\n{}", headline, stderr)
        }
    };

    match verdict {
        Verdict::Timeout => Some(format!("Time limit exceeded ({}ms)", time_limit_ms)),
        Verdict::RuntimeError => run
            .failure_reason()
            .map(|reason| with_stderr(scrub_workspace_path(&reason, root))),
        Verdict::WrongAnswer if run.stdout_truncated => Some(
            "Output limit exceeded, output was truncated".to_string(),
        ),
        _ => None,
    }
}
