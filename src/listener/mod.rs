//! Listening endpoints
//!
//! A [`ListenerHandle`] owns one accept loop feeding a service. Both the
//! hidden-service path and the plain fallback path end up here.

pub mod fallback;

pub use fallback::bind_local;

use crate::error::CleanupError;
use crate::service::ServiceHandle;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Running accept loop for one service
#[derive(Debug)]
pub struct ListenerHandle {
    service: String,
    local_addr: SocketAddr,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
    accepted: Arc<AtomicU64>,
}

impl ListenerHandle {
    /// Start accepting on `listener`, handing each connection to `service`
    pub fn spawn(listener: TcpListener, service: ServiceHandle) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        let token = CancellationToken::new();
        let accepted = Arc::new(AtomicU64::new(0));
        let name = service.name().to_string();

        let task = tokio::spawn(accept_loop(
            listener,
            service,
            token.clone(),
            Arc::clone(&accepted),
        ));

        Ok(Self {
            service: name,
            local_addr,
            token,
            task: Some(task),
            accepted,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn service_name(&self) -> &str {
        &self.service
    }

    /// Connections accepted so far
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_none()
    }

    /// Stop accepting, drop open connections, and wait for the loop to exit.
    /// Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<(), CleanupError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        self.token.cancel();
        match task.await {
            Ok(()) => {
                debug!("Closed {} listener on {}", self.service, self.local_addr);
                Ok(())
            },
            Err(e) => Err(CleanupError::Listener {
                addr: self.local_addr,
                reason: e.to_string(),
            }),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn accept_loop(
    listener: TcpListener,
    service: ServiceHandle,
    token: CancellationToken,
    accepted: Arc<AtomicU64>,
) {
    let addr = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "?".to_string());
    info!("{} listening on {}", service.name(), addr);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            accept = listener.accept() => match accept {
                Ok((stream, peer)) => {
                    let count = accepted.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!("{} session #{} from {}", service.name(), count, peer);

                    let service = Arc::clone(&service);
                    let conn_token = token.child_token();
                    tokio::spawn(async move {
                        tokio::select! {
                            result = service.handle(stream, peer) => {
                                if let Err(e) = result {
                                    debug!("{} connection from {} failed: {}", service.name(), peer, e);
                                }
                            }
                            _ = conn_token.cancelled() => {}
                        }
                    });
                },
                Err(e) => {
                    error!("Accept error on {}: {}", addr, e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                },
            },
        }
    }
}
