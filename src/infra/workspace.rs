//! Per-request scratch directories.
//!
//! Every request that stages files gets its own [`Workspace`]: a fresh, private directory
//! under the configured root that is removed recursively when the guard is dropped. The
//! guard is moved into whatever outlives the handler (the streamed response body) so the
//! directory disappears after the last byte is sent, on errors, and when the client goes
//! away mid-stream.

use std::{
    io,
    path::{Path, PathBuf},
};

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

const SOURCE: &str = "infra::workspace";
const WORKSPACE_PREFIX: &str = "pressroom-";
const PARTS_DIR: &str = "parts";
const RENDER_DIR: &str = "render";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create request workspace under `{}`", root.display())]
    Create {
        root: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Directory under which request workspaces are created.
#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    root: PathBuf,
}

impl WorkspaceRoot {
    /// Use `root` for workspaces, creating it if necessary.
    ///
    /// The root is stored canonicalised so every staged path is absolute and symlink-free.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, io::Error> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let root = std::fs::canonicalize(&root)?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Create a fresh workspace owned by the caller.
    pub fn create(&self) -> Result<Workspace, WorkspaceError> {
        let create_error = |source| WorkspaceError::Create {
            root: self.root.clone(),
            source,
        };

        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(&self.root)
            .map_err(create_error)?;
        std::fs::create_dir(dir.path().join(PARTS_DIR)).map_err(create_error)?;
        std::fs::create_dir(dir.path().join(RENDER_DIR)).map_err(create_error)?;

        let workspace = Workspace {
            id: Uuid::new_v4(),
            path: dir.path().to_path_buf(),
            dir: Some(dir),
        };
        debug!(
            target = SOURCE,
            workspace_id = %workspace.id,
            path = %workspace.path.display(),
            "request workspace created"
        );
        Ok(workspace)
    }
}

/// Exclusively-owned request directory, removed recursively on drop.
#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    path: PathBuf,
    dir: Option<TempDir>,
}

impl Workspace {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory receiving uploaded and fetched parts.
    pub fn parts_dir(&self) -> PathBuf {
        self.path.join(PARTS_DIR)
    }

    /// Directory for renderer scratch files and the output artifact.
    pub fn render_dir(&self) -> PathBuf {
        self.path.join(RENDER_DIR)
    }

    /// Remove the workspace now, reporting failures instead of logging them.
    pub fn close(mut self) -> Result<(), io::Error> {
        match self.dir.take() {
            Some(dir) => dir.close(),
            None => Ok(()),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match dir.close() {
            Ok(()) => debug!(
                target = SOURCE,
                workspace_id = %self.id,
                "request workspace removed"
            ),
            Err(err) => warn!(
                target = SOURCE,
                workspace_id = %self.id,
                path = %self.path.display(),
                error = %err,
                "failed to remove request workspace"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_layout_under_root() {
        let root = TempDir::new().expect("root");
        let workspaces = WorkspaceRoot::new(root.path()).expect("workspace root");

        let workspace = workspaces.create().expect("workspace");
        assert!(workspace.path().starts_with(workspaces.path()));
        assert!(workspace.path().is_absolute());
        assert!(workspace.parts_dir().is_dir());
        assert!(workspace.render_dir().is_dir());
    }

    #[test]
    fn workspaces_are_never_shared() {
        let root = TempDir::new().expect("root");
        let workspaces = WorkspaceRoot::new(root.path()).expect("workspace root");

        let first = workspaces.create().expect("first");
        let second = workspaces.create().expect("second");
        assert_ne!(first.path(), second.path());
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn drop_removes_directory_recursively() {
        let root = TempDir::new().expect("root");
        let workspaces = WorkspaceRoot::new(root.path()).expect("workspace root");

        let workspace = workspaces.create().expect("workspace");
        let path = workspace.path().to_path_buf();
        std::fs::write(workspace.parts_dir().join("index.html"), b"<p>hi</p>").expect("write");
        std::fs::create_dir_all(workspace.render_dir().join("nested/deeper")).expect("mkdir");

        drop(workspace);
        assert!(!path.exists());
    }

    #[test]
    fn close_removes_directory() {
        let root = TempDir::new().expect("root");
        let workspaces = WorkspaceRoot::new(root.path()).expect("workspace root");

        let workspace = workspaces.create().expect("workspace");
        let path = workspace.path().to_path_buf();
        workspace.close().expect("close");
        assert!(!path.exists());
    }

    #[test]
    fn root_is_created_when_missing() {
        let parent = TempDir::new().expect("parent");
        let root = parent.path().join("a/b/c");
        let workspaces = WorkspaceRoot::new(&root).expect("workspace root");
        assert!(workspaces.path().is_dir());
    }
}
