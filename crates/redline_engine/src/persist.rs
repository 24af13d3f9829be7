use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use redline_logging::{redline_debug, redline_warn};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::JobId;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("work directory missing or not writable: {0}")]
    WorkDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure the work directory exists and accepts new files.
pub fn ensure_work_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::WorkDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::WorkDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::WorkDir(e.to_string()))?;
    }
    NamedTempFile::new_in(dir).map_err(|e| PersistError::WorkDir(e.to_string()))?;
    Ok(())
}

/// Writes artifacts into one directory via temp file and rename.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_work_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        if target.exists() {
            fs::remove_file(&target)?;
        }
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Final path component of a client-supplied name, so uploads stay inside
/// the work directory.
pub fn sanitize_filename(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("")
        .trim();
    if base.is_empty() || base == ".." {
        "document".to_string()
    } else {
        base.to_string()
    }
}

pub fn upload_filename(job_id: JobId, filename: &str) -> String {
    format!("{job_id}_{}", sanitize_filename(filename))
}

/// `{stem}_{YYYYmmdd_HHMMSS}_{8-digit id}.{extension}`
pub fn output_filename(
    original: &str,
    at: DateTime<Utc>,
    job_id: JobId,
    extension: &str,
) -> String {
    let name = sanitize_filename(original);
    let stem = Path::new(&name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    format!(
        "{stem}_{}_{:08}.{extension}",
        at.format("%Y%m%d_%H%M%S"),
        job_id % 100_000_000
    )
}

/// Deletes every tracked artifact when dropped, whichever way the job ended.
#[derive(Debug, Default)]
pub struct ArtifactGuard {
    paths: Vec<PathBuf>,
}

impl ArtifactGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => redline_debug!("Removed artifact {}", path.display()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => redline_warn!("Failed to remove artifact {}: {err}", path.display()),
            }
        }
    }
}
