//! File-backed artifact sink

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use super::ArtifactSink;
use crate::error::AdvisorError;

/// Writes artifacts under a folder, creating it on demand.
///
/// Names that already carry a directory (or are absolute) are written as given.
#[derive(Debug, Clone)]
pub struct FileSink {
    folder: PathBuf,
}

impl FileSink {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        let has_dir = path
            .parent()
            .map(|p| !p.as_os_str().is_empty())
            .unwrap_or(false);
        if path.is_absolute() || has_dir {
            path.to_path_buf()
        } else {
            self.folder.join(path)
        }
    }
}

impl ArtifactSink for FileSink {
    fn write(&self, name: &str, content: &str) -> Result<PathBuf, AdvisorError> {
        let path = self.resolve(name);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AdvisorError::ArtifactWriteError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(&path, content).map_err(|e| AdvisorError::ArtifactWriteError {
            path: path.clone(),
            source: e,
        })?;
        tracing::info!(path = %path.display(), "saved SQL artifact");
        Ok(path)
    }
}

/// `<prefix>_<yyyymmdd_HHMMSS>.sql`
pub fn timestamped_name(prefix: &str, now: DateTime<Local>) -> String {
    format!("{}_{}.sql", prefix, now.format("%Y%m%d_%H%M%S"))
}
