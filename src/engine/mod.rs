//! Engine - workspace, build, run and evaluation steps
//!
//! Each step is a free function over a `Workspace` and a `&dyn Runner`, so
//! concurrent judging runs share nothing but the filesystem namespace the
//! workspace tokens carve out.

pub mod checker;
pub mod compiler;
pub mod executer;
pub mod runner;
pub mod source;
pub mod workspace;

use std::path::Path;

use crate::core::error::RunnerError;
use crate::core::languages::{ARTIFACT_PLACEHOLDER, SOURCE_PLACEHOLDER, WORKDIR_PLACEHOLDER};
use crate::engine::runner::CommandSpec;
use crate::engine::workspace::Workspace;

/// Expand a language command template with this workspace's paths
pub(crate) fn command_for(
    template: &[String],
    workspace: &Workspace,
    source_path: &Path,
    artifact_path: &Path,
) -> Result<CommandSpec, RunnerError> {
    let workdir = workspace.root_path().to_string_lossy();
    let source = source_path.to_string_lossy();
    let artifact = artifact_path.to_string_lossy();

    Ok(CommandSpec::from_template(
        template,
        &[
            (SOURCE_PLACEHOLDER, source.as_ref()),
            (ARTIFACT_PLACEHOLDER, artifact.as_ref()),
            (WORKDIR_PLACEHOLDER, workdir.as_ref()),
        ],
    )?
    .with_work_dir(workspace.root_path()))
}
