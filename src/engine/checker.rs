//! Verdict evaluator
//!
//! Decides a single test case's verdict from its run result.

use crate::core::verdict::Verdict;
use crate::engine::executer::RunResult;

/// Outcome of evaluating one run against its expected output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub passed: bool,
    pub verdict: Verdict,
}

/// Classify a run
///
/// A timeout wins over everything, then any abnormal termination, and only
/// a clean exit is compared against the expected output.
pub fn evaluate(run: &RunResult, expected_output: &str) -> Evaluation {
    let verdict = if run.timed_out {
        Verdict::Timeout
    } else if !run.is_clean_exit() {
        Verdict::RuntimeError
    } else if compare_output(&run.stdout, expected_output) {
        Verdict::Accepted
    } else {
        Verdict::WrongAnswer
    };

    Evaluation {
        passed: verdict.is_accepted(),
        verdict,
    }
}

/// Compare program output with expected output
///
/// Only leading and trailing whitespace is ignored; whitespace inside the
/// output is significant.
pub fn compare_output(actual: &str, expected: &str) -> bool {
    actual.trim() == expected.trim()
}
