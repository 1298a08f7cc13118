//! Scratch directory for Tor data
//!
//! A workspace is either created by us under a base directory (and removed
//! again on shutdown) or supplied by configuration (and left alone).

use crate::error::CleanupError;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Prefix for workspaces we create
const WORKSPACE_PREFIX: &str = "oonib-tor-";

/// Directory holding the Tor data directory and per-service key directories
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    /// Present while we own an unreleased temporary directory.
    /// Dropping it removes the tree, which covers early exits and unwinding.
    owned: Option<TempDir>,
    owns_path: bool,
}

impl Workspace {
    /// Create a uniquely named workspace inside `base`, creating `base` if needed
    pub fn acquire(base: &Path) -> Result<Self> {
        if base.exists() && !base.is_dir() {
            bail!("Workspace base {} is not a directory", base.display());
        }
        std::fs::create_dir_all(base)
            .with_context(|| format!("Failed to create workspace base {}", base.display()))?;

        // Random name + exclusive create, so concurrent runs never collide
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(base)
            .with_context(|| format!("Failed to create workspace in {}", base.display()))?;

        let root = dir.path().to_path_buf();
        restrict_permissions(&root)?;
        debug!("Created workspace {}", root.display());

        Ok(Self {
            root,
            owned: Some(dir),
            owns_path: true,
        })
    }

    /// Use a configured directory. It is created if missing and never removed.
    pub fn external(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create data directory {}", path.display()))?;
        restrict_permissions(path)?;

        Ok(Self {
            root: path.to_path_buf(),
            owned: None,
            owns_path: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True only if this workspace was created by us
    pub fn owns_path(&self) -> bool {
        self.owns_path
    }

    /// True once nothing is left for us to remove
    pub fn is_released(&self) -> bool {
        self.owned.is_none()
    }

    /// Per-service subdirectory (`collector`, `bouncer`, ...)
    pub fn service_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Remove the directory tree if we own it.
    ///
    /// Runs at most once; later calls do nothing and return `Ok`.
    pub fn release(&mut self) -> Result<(), CleanupError> {
        let Some(dir) = self.owned.take() else {
            return Ok(());
        };

        info!("Removing temporary directory: {}", self.root.display());
        dir.close().map_err(|source| CleanupError::Workspace {
            path: self.root.clone(),
            source,
        })
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.owned.is_some() {
            if let Err(e) = self.release() {
                warn!("{}", e);
            }
        }
    }
}

/// Tor refuses data directories readable by other users
fn restrict_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
