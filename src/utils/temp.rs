//! Per-run temporary workspace.
//!
//! Intermediate artifacts (narration audio, per-line dialogue clips) live in
//! a unique temp directory for the duration of one run. Cleanup is best
//! effort and runs on both the success and the failure path; the directory
//! itself is also removed on drop.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use uuid::Uuid;

use crate::error::Result;

pub struct RunWorkspace {
    temp_dir: TempDir,
}

impl RunWorkspace {
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        log::debug!("run workspace: {}", temp_dir.path().display());
        Ok(Self { temp_dir })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path for a new uniquely named artifact; the file is not created.
    pub fn file(&self, prefix: &str, extension: &str) -> PathBuf {
        self.temp_dir
            .path()
            .join(format!("{}_{}.{}", prefix, Uuid::new_v4(), extension))
    }

    /// Delete every file in the workspace. Failures are logged, not fatal.
    pub fn cleanup(&self) {
        let entries = match std::fs::read_dir(self.temp_dir.path()) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("could not list temp files for cleanup: {}", e);
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() {
                if let Err(e) = std::fs::remove_file(&path) {
                    log::warn!("could not remove temp file {}: {}", path.display(), e);
                }
            }
        }

        log::info!("temporary files cleaned up");
    }
}
