//! A bound hidden service

use crate::error::CleanupError;
use crate::listener::ListenerHandle;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

/// Hidden service endpoint backed by a local listener
#[derive(Debug)]
pub struct HiddenServiceDescriptor {
    service: String,
    public_port: u16,
    data_dir: PathBuf,
    listener: ListenerHandle,
    // Written once, when Tor reports the address
    assigned_address: OnceCell<String>,
}

impl HiddenServiceDescriptor {
    pub(crate) fn new(
        service: String,
        public_port: u16,
        data_dir: PathBuf,
        listener: ListenerHandle,
    ) -> Self {
        Self {
            service,
            public_port,
            data_dir,
            listener,
            assigned_address: OnceCell::new(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service
    }

    pub fn public_port(&self) -> u16 {
        self.public_port
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn listener(&self) -> &ListenerHandle {
        &self.listener
    }

    /// The `.onion` address, once Tor has assigned one
    pub fn assigned_address(&self) -> Option<&str> {
        self.assigned_address.get().map(String::as_str)
    }

    /// Record the address. Returns false if one was already recorded.
    pub(crate) fn assign_address(&self, address: String) -> bool {
        self.assigned_address.set(address).is_ok()
    }

    /// URI clients use to reach the service through Tor
    pub fn onion_uri(&self) -> Option<String> {
        let address = self.assigned_address()?;
        Some(if self.public_port == 80 {
            format!("httpo://{}", address)
        } else {
            format!("httpo://{}:{}", address, self.public_port)
        })
    }

    /// Close the local listener backing this service
    pub async fn close(&mut self) -> Result<(), CleanupError> {
        self.listener.close().await
    }
}
