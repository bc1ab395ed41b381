//! Error types
//!
//! Only infrastructural failures are errors. A submission that fails to
//! compile, crashes, or runs out of time is reported as data in the judging
//! summary, never through these types.

use std::io;
use std::path::PathBuf;

/// Fatal errors escalated to the caller of the judge
#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to create workspace under {root:?}: {source}")]
    Workspace {
        root: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Toolchain not found: {program}")]
    ToolchainMissing { program: String },

    #[error("Failed to write source file: {0}")]
    Source(#[source] io::Error),

    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// Errors from spawning or talking to a child process
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("No command specified for execution")]
    EmptyCommand,

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl RunnerError {
    /// Whether the program itself could not be found
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RunnerError::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound
        )
    }
}
