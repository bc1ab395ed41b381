//! Code judge - compile, run and judge untrusted submissions
//!
//! `jobs::judger::Judger` is the entry point: it owns the configuration, the
//! workspace manager and the process runner, and drives a submission from
//! source text to a `JudgingSummary`.

pub mod core;
pub mod engine;
pub mod jobs;

pub use crate::core::config::JudgeConfig;
pub use crate::core::error::{JudgeError, RunnerError};
pub use crate::core::verdict::Verdict;
pub use crate::jobs::judger::{CaseResult, JudgingSummary, Judger, Submission, TestCase};
pub use crate::jobs::playground::{PlaygroundError, PlaygroundOutput};
