//! PID file handling

use crate::error::CleanupError;
use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Process lifecycle marker, removed on shutdown
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    removed: bool,
}

impl PidFile {
    /// Write the current process id to `path`
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, format!("{}\n", std::process::id()))
            .with_context(|| format!("Failed to write pid file {}", path.display()))?;
        debug!("Wrote pid file {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file. A file that is already gone is not an error.
    pub fn remove(&mut self) -> Result<(), CleanupError> {
        if self.removed {
            return Ok(());
        }
        self.removed = true;

        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed pid file {}", self.path.display());
                Ok(())
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CleanupError::PidFile {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("run").join("oonib.pid");

        let mut pid = PidFile::create(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());

        pid.remove().unwrap();
        assert!(!path.exists());
        pid.remove().unwrap();
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("oonib.pid");

        let mut pid = PidFile::create(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(pid.remove().is_ok());
    }
}
