use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::FlashError;

const WORKSPACE_PREFIX: &str = "ocd-flash-";

/// A uniquely named temporary directory owned by a single flashing run.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Creates a workspace, runs `body` in it and removes it again.
    ///
    /// The directory is removed whether `body` succeeds, fails or panics. Failing to
    /// remove it is only logged, since the flashing result does not depend on it.
    pub fn scoped<T, E>(body: impl FnOnce(&Workspace) -> Result<T, E>) -> Result<T, E>
    where
        E: From<FlashError>,
    {
        let workspace = Self::acquire()?;
        let result = body(&workspace);
        workspace.release();
        result
    }

    fn acquire() -> Result<Self, FlashError> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir()
            .map_err(FlashError::Workspace)?;

        tracing::debug!("Created workspace {}", dir.path().display());

        Ok(Self { dir })
    }

    fn release(self) {
        let path = self.dir.path().to_path_buf();

        match self.dir.close() {
            Ok(()) => tracing::debug!("Removed workspace {}", path.display()),
            Err(error) => tracing::warn!(
                "Failed to remove workspace {}: {}",
                path.display(),
                error
            ),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file called `name` inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
