use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{DashboardError, DashboardResult};

/// Keeps a verbatim copy of each uploaded file, keyed by its file name.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `bytes` under the final component of `file_name`, replacing any
    /// earlier upload with the same name.
    pub fn save(&self, file_name: &str, bytes: &[u8]) -> DashboardResult<PathBuf> {
        let name = Path::new(file_name)
            .file_name()
            .ok_or_else(|| DashboardError::Config(format!("not a file name: {file_name:?}")))?;

        fs::create_dir_all(&self.dir)?;
        let target = self.dir.join(name);
        fs::write(&target, bytes)?;

        info!(path = %target.display(), bytes = bytes.len(), "stored upload copy");
        Ok(target)
    }
}
