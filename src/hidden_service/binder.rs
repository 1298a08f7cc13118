//! Binding services to Tor hidden services

use super::descriptor::HiddenServiceDescriptor;
use crate::error::BindError;
use crate::listener::ListenerHandle;
use crate::service::ServiceHandle;
use crate::tor::{DaemonHandle, HiddenServiceConfig};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Poll interval while waiting for Tor to write `hostname`
const HOSTNAME_POLL: Duration = Duration::from_millis(100);

/// Creates hidden services, one data directory per service
pub struct HiddenServiceBinder {
    claimed: Mutex<HashSet<PathBuf>>,
    hostname_timeout: Duration,
}

impl HiddenServiceBinder {
    pub fn new(hostname_timeout: Duration) -> Self {
        Self {
            claimed: Mutex::new(HashSet::new()),
            hostname_timeout,
        }
    }

    /// Claim `data_dir` and start the local listener for `service`.
    ///
    /// Nothing is sent to the daemon yet. A directory that is already
    /// claimed is rejected here.
    pub async fn prepare(
        &self,
        public_port: u16,
        data_dir: &Path,
        service: ServiceHandle,
    ) -> Result<PendingBinding, BindError> {
        let data_dir = normalize(data_dir);
        if !self.claimed.lock().insert(data_dir.clone()) {
            return Err(BindError::DuplicateDataDir(data_dir));
        }

        match open_local(&data_dir, service.clone()).await {
            Ok(listener) => {
                debug!(
                    "Prepared {} hidden service in {} -> {}",
                    service.name(),
                    data_dir.display(),
                    listener.local_addr()
                );
                Ok(PendingBinding {
                    service: service.name().to_string(),
                    public_port,
                    data_dir,
                    listener,
                    hostname_timeout: self.hostname_timeout,
                })
            },
            Err(e) => {
                // Nothing reached the daemon, so the directory can be reused
                self.claimed.lock().remove(&data_dir);
                Err(e)
            },
        }
    }

    /// Prepare and publish in one step
    pub async fn bind(
        &self,
        daemon: &DaemonHandle,
        public_port: u16,
        data_dir: &Path,
        service: ServiceHandle,
    ) -> Result<HiddenServiceDescriptor, BindError> {
        self.prepare(public_port, data_dir, service)
            .await?
            .publish(daemon)
            .await
    }
}

/// Data directory and local listener are ready; the daemon does not know yet
#[derive(Debug)]
pub struct PendingBinding {
    service: String,
    public_port: u16,
    data_dir: PathBuf,
    listener: ListenerHandle,
    hostname_timeout: Duration,
}

impl PendingBinding {
    pub fn service_name(&self) -> &str {
        &self.service
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Ask the daemon for the hidden service and wait for its address.
    /// The local listener is closed if anything fails.
    pub async fn publish(mut self, daemon: &DaemonHandle) -> Result<HiddenServiceDescriptor, BindError> {
        let request = HiddenServiceConfig {
            dir: self.data_dir.clone(),
            public_port: self.public_port,
            target: self.listener.local_addr(),
        };

        info!(
            "Requesting {} hidden service: port {} -> {}",
            self.service, self.public_port, request.target
        );

        let result = match daemon.add_hidden_service(request).await {
            Ok(()) => {
                let hostname = wait_for_hostname(&self.data_dir, self.hostname_timeout).await;
                if hostname.is_err() {
                    // Tor accepted it, so it would keep forwarding to a closed listener
                    if let Err(e) = daemon.remove_hidden_service(&self.data_dir).await {
                        warn!("Failed to withdraw {} hidden service: {:#}", self.service, e);
                    }
                }
                hostname
            },
            Err(e) => Err(BindError::Control(e)),
        };

        match result {
            Ok(address) => {
                let descriptor = HiddenServiceDescriptor::new(
                    self.service,
                    self.public_port,
                    self.data_dir,
                    self.listener,
                );
                descriptor.assign_address(address);
                Ok(descriptor)
            },
            Err(e) => {
                if let Err(close_err) = self.listener.close().await {
                    warn!("{}", close_err);
                }
                Err(e)
            },
        }
    }
}

/// Lexical cleanup so `ws/./collector` and `ws/collector` claim the same directory
fn normalize(path: &Path) -> PathBuf {
    path.components().collect()
}

/// Create the key directory and a loopback listener on an ephemeral port
async fn open_local(data_dir: &Path, service: ServiceHandle) -> Result<ListenerHandle, BindError> {
    create_private_dir(data_dir).map_err(|source| BindError::DataDir {
        path: data_dir.to_path_buf(),
        source,
    })?;

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| BindError::Listen { addr, source })?;
    ListenerHandle::spawn(listener, service).map_err(|source| BindError::Listen { addr, source })
}

/// Tor insists on owner-only hidden service directories
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

/// Read the hostname file from the hidden service directory
async fn read_hs_hostname(hs_dir: &Path) -> Result<String> {
    let hostname_path = hs_dir.join("hostname");
    let hostname = tokio::fs::read_to_string(&hostname_path)
        .await
        .with_context(|| format!("Failed to read hostname from {}", hostname_path.display()))?;
    Ok(hostname.trim().to_string())
}

async fn wait_for_hostname(dir: &Path, timeout: Duration) -> Result<String, BindError> {
    let poll = async {
        loop {
            match read_hs_hostname(dir).await {
                Ok(hostname) if !hostname.is_empty() => return hostname,
                _ => tokio::time::sleep(HOSTNAME_POLL).await,
            }
        }
    };

    tokio::time::timeout(timeout, poll)
        .await
        .map_err(|_| BindError::HostnameTimeout {
            dir: dir.to_path_buf(),
            secs: timeout.as_secs(),
        })
}
