//! Per-submission workspaces
//!
//! Every judging run gets its own directory, named from a random v4 UUID and
//! created with `create_dir` semantics so two runs can never share one.
//! Nothing derived from the submission or its test cases appears in the name.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::error::JudgeError;

/// An isolated directory owned by exactly one in-flight judging run
#[derive(Debug)]
pub struct Workspace {
    id: String,
    dir: TempDir,
    created_at: SystemTime,
}

impl Workspace {
    /// Opaque unique token of this workspace
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Root directory of this workspace
    pub fn root_path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file directly inside the workspace
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Allocates and tears down workspaces under a common root
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh workspace directory
    pub fn acquire(&self) -> Result<Workspace, JudgeError> {
        let to_error = |source| JudgeError::Workspace {
            root: self.root.clone(),
            source,
        };

        std::fs::create_dir_all(&self.root).map_err(to_error)?;

        let id = Uuid::new_v4().simple().to_string();
        let dir = tempfile::Builder::new()
            .prefix(&format!("judge-{}", id))
            .rand_bytes(0)
            .tempdir_in(&self.root)
            .map_err(to_error)?;

        debug!("Acquired workspace {} at {:?}", id, dir.path());

        Ok(Workspace {
            id,
            dir,
            created_at: SystemTime::now(),
        })
    }

    /// Delete a workspace and everything in it
    ///
    /// Failures are logged and swallowed so a result can always be reported.
    pub async fn release(&self, workspace: Workspace) {
        let Workspace { id, dir, created_at } = workspace;
        let path = dir.path().to_path_buf();
        let age = created_at.elapsed().unwrap_or_default();

        match tokio::task::spawn_blocking(move || dir.close()).await {
            Ok(Ok(())) => debug!(
                "Released workspace {} after {}ms",
                id,
                age.as_millis()
            ),
            Ok(Err(e)) => warn!("Failed to remove workspace {} at {:?}: {}", id, path, e),
            Err(e) => warn!("Workspace {} cleanup task failed: {}", id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().join("workspaces"));

        let workspace = manager.acquire().unwrap();
        let path = workspace.root_path().to_path_buf();
        assert!(path.is_dir());
        assert!(path.starts_with(manager.root()));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .contains(workspace.id()));

        std::fs::write(workspace.file_path("main.cpp"), "int main() {}").unwrap();
        std::fs::create_dir(workspace.file_path("nested")).unwrap();
        std::fs::write(workspace.file_path("nested/out"), "x").unwrap();

        manager.release(workspace).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_workspaces_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path());

        let workspaces: Vec<Workspace> = (0..32).map(|_| manager.acquire().unwrap()).collect();
        let ids: HashSet<&str> = workspaces.iter().map(|w| w.id()).collect();
        let paths: HashSet<&Path> = workspaces.iter().map(|w| w.root_path()).collect();
        assert_eq!(ids.len(), 32);
        assert_eq!(paths.len(), 32);

        for workspace in workspaces {
            manager.release(workspace).await;
        }
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_release_tolerates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path());

        let workspace = manager.acquire().unwrap();
        std::fs::remove_dir_all(workspace.root_path()).unwrap();

        // Must not panic
        manager.release(workspace).await;
    }

    #[test]
    fn test_acquire_fails_when_root_is_a_file() {
        let root = tempfile::NamedTempFile::new().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let err = manager.acquire().unwrap_err();
        assert!(matches!(err, JudgeError::Workspace { .. }));
    }
}
