//! Error taxonomy for the orchestrator
//!
//! Every failure here is scoped: a launch failure only kills the hidden
//! service path, a bind failure only kills one endpoint, and a cleanup
//! failure is logged and skipped.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitStatus;

/// The Tor daemon never reached a usable control channel
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("tor binary not found: {path:?}")]
    BinaryNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn {path:?}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write torrc to {path:?}")]
    Torrc {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("tor exited before bootstrap completed ({status}); last output: {last_line:?}")]
    ExitedEarly {
        status: String,
        last_line: Option<String>,
    },

    #[error("tor did not finish bootstrapping within {0}s")]
    Timeout(u64),

    #[error("tor control channel unavailable: {0:#}")]
    Control(anyhow::Error),

    #[error("anonymizing daemon is not supported on this platform")]
    Unsupported,
}

impl LaunchError {
    pub(crate) fn exited(status: Option<ExitStatus>, last_line: Option<String>) -> Self {
        let status = status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "stdout closed".to_string());
        Self::ExitedEarly { status, last_line }
    }
}

/// A single endpoint could not be created
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("data directory {0:?} is already used by another hidden service")]
    DuplicateDataDir(PathBuf),

    #[error("failed to prepare data directory {path:?}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to listen on {addr}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("hidden service request rejected: {0:#}")]
    Control(anyhow::Error),

    #[error("no hostname appeared in {dir:?} within {secs}s")]
    HostnameTimeout { dir: PathBuf, secs: u64 },
}

/// A release step failed during shutdown
#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error("failed to remove directory {path:?}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove pid file {path:?}")]
    PidFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to terminate tor process")]
    Daemon(#[source] io::Error),

    #[error("listener task on {addr} ended abnormally: {reason}")]
    Listener { addr: SocketAddr, reason: String },
}
