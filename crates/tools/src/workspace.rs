//! Sandbox root shared by the filesystem-facing tools.

use std::path::{Component, Path, PathBuf};

use proto::ToolError;

/// Directory that file and email tools are confined to.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a relative path inside the workspace.
    ///
    /// Absolute paths and any `..` component are rejected. The deepest
    /// existing ancestor of the result is then canonicalized, so a symlink
    /// that leads out of `root` is rejected too.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, ToolError> {
        let trimmed = relative.trim();
        if trimmed.is_empty() {
            return Err(ToolError::EmptyPath);
        }
        let candidate = Path::new(trimmed);
        let mut resolved = self.root.clone();
        for component in candidate.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(ToolError::OutsideWorkspace(trimmed.to_string()));
                }
            }
        }
        self.ensure_contained(&resolved, trimmed)?;
        Ok(resolved)
    }

    fn ensure_contained(&self, resolved: &Path, requested: &str) -> Result<(), ToolError> {
        // Nothing can exist below a root that does not exist yet.
        let Ok(root) = self.root.canonicalize() else {
            return Ok(());
        };
        let mut current = Some(resolved);
        while let Some(path) = current {
            if let Ok(real) = path.canonicalize() {
                if real.starts_with(&root) {
                    return Ok(());
                }
                return Err(ToolError::OutsideWorkspace(requested.to_string()));
            }
            current = path.parent();
        }
        Ok(())
    }
}
