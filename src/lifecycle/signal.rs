//! Stop signals

use tokio_util::sync::CancellationToken;
use tracing::info;

/// SIGINT and SIGTERM handlers, registered as soon as this is built.
///
/// Build it before startup work begins: until a handler exists the
/// default action kills the process without any cleanup.
pub struct StopSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl StopSignals {
    /// Register the handlers. Requires a running tokio runtime.
    #[cfg(unix)]
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Resolve on SIGINT, SIGTERM or when `token` is cancelled
    #[cfg(unix)]
    pub async fn wait(mut self, token: CancellationToken) {
        tokio::select! {
            _ = self.interrupt.recv() => {
                info!(signal = "SIGINT", "Stop requested");
            }
            _ = self.terminate.recv() => {
                info!(signal = "SIGTERM", "Stop requested");
            }
            _ = token.cancelled() => {
                info!("Stop requested by host");
            }
        }
    }

    #[cfg(not(unix))]
    pub async fn wait(self, token: CancellationToken) {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!(signal = "Ctrl-C", "Stop requested");
            }
            _ = token.cancelled() => {
                info!("Stop requested by host");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_token_stops_wait() {
        let signals = StopSignals::install().unwrap();
        let token = CancellationToken::new();
        let waiter = tokio::spawn(signals.wait(token.clone()));
        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
