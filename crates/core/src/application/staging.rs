// Temp file staging for code units
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, warn};

use crate::domain::Code;
use crate::error::{CacheToolError, Result};

const STAGED_PREFIX: &str = "cachetool-";
const STAGED_SUFFIX: &str = ".php";

/// A code unit written to a uniquely named file for the length of one run
///
/// `remove()` deletes the file and reports failure. If the value is dropped
/// instead (early return, error, panic) the file is still deleted.
#[derive(Debug)]
pub struct StagedFile {
    path: TempPath,
}

impl StagedFile {
    /// Write `code` to a new file under `dir` (OS temp dir when `None`)
    ///
    /// # Errors
    /// - CacheToolError::Staging if the file cannot be created or written
    pub fn stage(code: &Code, dir: Option<&Path>) -> Result<Self> {
        let dir: PathBuf = dir.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);

        let file = tempfile::Builder::new()
            .prefix(STAGED_PREFIX)
            .suffix(STAGED_SUFFIX)
            .tempfile_in(&dir)
            .map_err(|e| {
                CacheToolError::staging(
                    format!("Could not create temporary file in {}", dir.display()),
                    e,
                )
            })?;

        let path = file.into_temp_path();
        code.write_to(&path)?;
        make_readable(&path)?;

        debug!(path = %path.display(), "Dumped code to file");

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the staged file
    ///
    /// # Errors
    /// - CacheToolError::Staging if the file cannot be removed
    pub fn remove(self) -> Result<()> {
        let shown = self.path.display().to_string();
        self.path.close().map_err(|e| {
            warn!(path = %shown, error = %e, "Failed to remove staged file");
            CacheToolError::staging(format!("Could not remove {}", shown), e)
        })
    }
}

/// Pool workers usually run as another user than the operator
#[cfg(unix)]
fn make_readable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).map_err(|e| {
        CacheToolError::staging(format!("Could not chmod {}", path.display()), e)
    })
}

#[cfg(not(unix))]
fn make_readable(_path: &Path) -> Result<()> {
    Ok(())
}
