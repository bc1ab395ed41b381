pub mod judger;
pub mod playground;

use crate::jobs::judger::{JudgeJob, Judger, JudgingSummary};
use crate::jobs::playground::{PlaygroundJob, PlaygroundResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Worker job enum - represents different types of jobs the worker can process
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "job_type")]
pub enum WorkerJob {
    /// Judge a user submission against its test cases
    #[serde(rename = "judge")]
    Judge(JudgeJob),
    /// Single ad-hoc run with custom input
    #[serde(rename = "playground")]
    Playground(PlaygroundJob),
}

impl WorkerJob {
    /// Caller-supplied id of the job, if any
    pub fn id(&self) -> Option<&str> {
        match self {
            WorkerJob::Judge(job) => job.submission_id.as_deref(),
            WorkerJob::Playground(job) => job.session_id.as_deref(),
        }
    }
}

/// One result line written back by the worker
#[derive(Debug, Serialize)]
#[serde(tag = "job_type", rename_all = "snake_case")]
pub enum JobResult {
    Judge {
        #[serde(rename = "submissionId", skip_serializing_if = "Option::is_none")]
        submission_id: Option<String>,
        #[serde(flatten)]
        summary: JudgingSummary,
    },
    Playground {
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(flatten)]
        response: PlaygroundResponse,
    },
    /// Infrastructure failure; no meaningful verdict could be produced
    SystemError {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        message: String,
    },
}

/// Process one worker job to completion
pub async fn process_job(judger: &Judger, job: WorkerJob) -> JobResult {
    let id = job.id().map(str::to_string);

    match job {
        WorkerJob::Judge(job) => {
            info!(
                "Received judge job: submission_id={}, language={}, testcases={}",
                id.as_deref().unwrap_or("-"),
                job.submission.language,
                job.submission.test_cases.len()
            );
            match judger.judge(&job.submission).await {
                Ok(summary) => {
                    info!(
                        "Judge job completed: submission_id={}, verdict={}",
                        id.as_deref().unwrap_or("-"),
                        summary.overall_verdict
                    );
                    JobResult::Judge {
                        submission_id: id,
                        summary,
                    }
                }
                Err(e) => {
                    error!(
                        "Failed to process judge job {}: {}",
                        id.as_deref().unwrap_or("-"),
                        e
                    );
                    JobResult::SystemError {
                        id,
                        message: e.to_string(),
                    }
                }
            }
        }
        WorkerJob::Playground(job) => {
            let result = judger.run_playground(&job).await;
            match PlaygroundResponse::from_result(result) {
                Ok(response) => JobResult::Playground {
                    session_id: id,
                    response,
                },
                Err(e) => {
                    error!(
                        "Failed to process playground job {}: {}",
                        id.as_deref().unwrap_or("-"),
                        e
                    );
                    JobResult::SystemError {
                        id,
                        message: e.to_string(),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::JudgeConfig;

    #[test]
    fn test_parse_judge_job() {
        let job: WorkerJob = serde_json::from_str(
            r#"{"job_type":"judge","submissionId":"42","sourceText":"x","language":"cpp",
                "testCases":[{"input":"1\n","expectedOutput":"1"}]}"#,
        )
        .unwrap();
        assert_eq!(job.id(), Some("42"));
        match job {
            WorkerJob::Judge(job) => assert_eq!(job.submission.test_cases.len(), 1),
            other => panic!("unexpected job {:?}", other),
        }
    }

    #[test]
    fn test_parse_playground_job() {
        let job: WorkerJob = serde_json::from_str(
            r#"{"job_type":"playground","session_id":"abc","code":"print(1)","language":"python"}"#,
        )
        .unwrap();
        assert_eq!(job.id(), Some("abc"));
        assert!(matches!(job, WorkerJob::Playground(_)));
    }

    #[test]
    fn test_unknown_job_type_rejected() {
        assert!(serde_json::from_str::<WorkerJob>(r#"{"job_type":"validate"}"#).is_err());
    }

    #[test]
    fn test_system_error_line() {
        let line = serde_json::to_value(JobResult::SystemError {
            id: Some("7".into()),
            message: "Unsupported language: cobol".into(),
        })
        .unwrap();
        assert_eq!(line["job_type"], "system_error");
        assert_eq!(line["id"], "7");
    }

    #[tokio::test]
    async fn test_unsupported_language_becomes_system_error() {
        let root = tempfile::tempdir().unwrap();
        let judger = Judger::new(JudgeConfig {
            workspace_root: root.path().to_path_buf(),
            ..JudgeConfig::default()
        });
        let job: WorkerJob = serde_json::from_str(
            r#"{"job_type":"judge","submissionId":"9","sourceText":"x","language":"cobol"}"#,
        )
        .unwrap();

        let json = serde_json::to_value(process_job(&judger, job).await).unwrap();
        assert_eq!(json["job_type"], "system_error");
        assert_eq!(json["id"], "9");
        assert_eq!(json["message"], "Unsupported language: cobol");
    }
}
