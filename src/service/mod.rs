//! Application services
//!
//! The orchestrator treats services as opaque: all it can do is hand one
//! an accepted connection. Collector and bouncer logic live elsewhere.

pub mod status;

pub use status::StatusService;

use anyhow::Result;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;

/// Something that can serve connections accepted on an endpoint
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Short name used in log lines and directory names
    fn name(&self) -> &str;

    /// Serve one accepted connection until it closes
    async fn handle(&self, stream: TcpStream, peer: SocketAddr) -> Result<()>;
}

/// Shared, type-erased service
pub type ServiceHandle = Arc<dyn Service>;

/// Which slot a service fills. Also names its key directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceRole {
    Collector,
    Bouncer,
}

impl ServiceRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Collector => "collector",
            Self::Bouncer => "bouncer",
        }
    }
}

impl std::fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The services one orchestrator run exposes
#[derive(Clone)]
pub struct Services {
    /// Primary service, always bound
    pub collector: ServiceHandle,
    /// Optional discovery service
    pub bouncer: Option<ServiceHandle>,
}

impl Services {
    pub fn new(collector: ServiceHandle, bouncer: Option<ServiceHandle>) -> Self {
        Self { collector, bouncer }
    }
}
