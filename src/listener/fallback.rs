//! Plain local listeners for non-anonymized deployments

use super::ListenerHandle;
use crate::error::BindError;
use crate::service::ServiceHandle;
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpListener;

/// Bind `service` directly to `interface:port`
pub async fn bind_local(
    port: u16,
    interface: IpAddr,
    service: ServiceHandle,
) -> Result<ListenerHandle, BindError> {
    let addr = SocketAddr::new(interface, port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| BindError::Listen { addr, source })?;

    ListenerHandle::spawn(listener, service).map_err(|source| BindError::Listen { addr, source })
}
