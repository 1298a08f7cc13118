//! Handle to a running Tor daemon

use super::control::{ControlChannel, HiddenServiceConfig};
use crate::error::CleanupError;
use anyhow::{bail, Result};
use std::path::Path;
use tokio::process::Child;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Control channel plus the hidden services it has been told about
struct ControlState {
    channel: Box<dyn ControlChannel>,
    hidden_services: Vec<HiddenServiceConfig>,
    closed: bool,
}

/// Live daemon: control connection and (if we launched it) the process
pub struct DaemonHandle {
    // One request at a time; binders share this handle
    control: Mutex<ControlState>,
    process: parking_lot::Mutex<Option<Child>>,
    pid: Option<u32>,
}

impl DaemonHandle {
    /// Wrap an authenticated control channel and the daemon process, if any
    pub fn new(channel: Box<dyn ControlChannel>, process: Option<Child>) -> Self {
        let pid = process.as_ref().and_then(|c| c.id());
        Self {
            control: Mutex::new(ControlState {
                channel,
                hidden_services: Vec::new(),
                closed: false,
            }),
            process: parking_lot::Mutex::new(process),
            pid,
        }
    }

    /// Register one more hidden service with the daemon.
    ///
    /// The full set is re-sent so earlier services survive the SETCONF.
    /// On failure the daemon keeps its previous set.
    pub async fn add_hidden_service(&self, service: HiddenServiceConfig) -> Result<()> {
        let mut state = self.control.lock().await;
        if state.closed {
            bail!("control channel closed");
        }
        if state.hidden_services.iter().any(|s| s.dir == service.dir) {
            bail!("{} is already configured", service.dir.display());
        }

        let mut services = state.hidden_services.clone();
        services.push(service);
        state.channel.configure_hidden_services(&services).await?;
        state.hidden_services = services;
        Ok(())
    }

    /// Hidden services successfully registered so far
    pub async fn hidden_service_dirs(&self) -> Vec<std::path::PathBuf> {
        self.control
            .lock()
            .await
            .hidden_services
            .iter()
            .map(|s| s.dir.clone())
            .collect()
    }

    /// Withdraw a hidden service, re-sending the reduced set.
    ///
    /// Unknown directories are ignored. Once the channel is closed only
    /// the local bookkeeping changes.
    pub async fn remove_hidden_service(&self, dir: &Path) -> Result<()> {
        let mut state = self.control.lock().await;
        let services: Vec<_> = state
            .hidden_services
            .iter()
            .filter(|s| s.dir != dir)
            .cloned()
            .collect();
        if services.len() == state.hidden_services.len() {
            return Ok(());
        }

        if !state.closed {
            state.channel.configure_hidden_services(&services).await?;
        }
        debug!("Removed hidden service {}", dir.display());
        state.hidden_services = services;
        Ok(())
    }

    /// Kill the daemon process. Later calls do nothing.
    pub async fn terminate(&self) -> Result<(), CleanupError> {
        self.control.lock().await.closed = true;

        let child = self.process.lock().take();
        let Some(mut child) = child else {
            return Ok(());
        };

        if let Ok(Some(status)) = child.try_wait() {
            debug!("tor already exited: {}", status);
            return Ok(());
        }

        info!("Stopping tor (pid {:?})", self.pid);
        child.kill().await.map_err(CleanupError::Daemon)
    }
}
