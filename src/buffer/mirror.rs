//! On-disk copy of a session's unflushed buffer

use crate::buffer::{BufferResult, BufferedRecord};
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the mirror file path for a session
pub fn mirror_path(dir: &Path, session_id: i64) -> PathBuf {
    dir.join(format!("crawl_session_{}_buffer.json", session_id))
}

/// Recovery mirror for one session
#[derive(Debug, Clone)]
pub struct RecoveryMirror {
    path: PathBuf,
}

impl RecoveryMirror {
    /// Creates a mirror handle, creating `dir` if needed
    pub fn new(dir: &Path, session_id: i64) -> BufferResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            path: mirror_path(dir, session_id),
        })
    }

    /// Opens an existing mirror file
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Overwrites the mirror with the full buffer contents
    ///
    /// Writes to a sibling temp file first so a crash mid-write leaves the
    /// previous mirror intact.
    pub fn write(&self, records: &[BufferedRecord]) -> BufferResult<()> {
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(records)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Reads the records held in the mirror, oldest first
    pub fn read(&self) -> BufferResult<Vec<BufferedRecord>> {
        let bytes = fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Deletes the mirror; a missing file is not an error
    pub fn remove(&self) -> BufferResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
