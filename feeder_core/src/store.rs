//! JSON snapshot file for a [`ScheduleBook`](crate::schedule::ScheduleBook).

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{FeederError, Result};
use crate::schedule::ScheduleSnapshot;

/// Write via a sibling temp file and rename, so readers never see a torn file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty snapshot.
    pub fn load(&self) -> Result<ScheduleSnapshot> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file yet");
                return Ok(ScheduleSnapshot::default());
            }
            Err(e) => return Err(FeederError::Storage(format!("{}: {e}", self.path.display()))),
        };
        serde_json::from_str(&text)
            .map_err(|e| FeederError::Storage(format!("{}: {e}", self.path.display())))
    }

    pub fn save(&self, snapshot: &ScheduleSnapshot) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| FeederError::Storage(e.to_string()))?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .map_err(|e| FeederError::Storage(format!("{}: {e}", dir.display())))?;
        }
        write_atomic(&self.path, &bytes)
            .map_err(|e| FeederError::Storage(format!("{}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), "state saved");
        Ok(())
    }
}
