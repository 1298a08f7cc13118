//! Launching the Tor daemon
//!
//! Writes a torrc into the workspace, starts `tor -f <torrc>`, follows
//! bootstrap progress on stdout and connects to the control port once
//! bootstrap reaches 100%.

use super::control::TorController;
use super::daemon::DaemonHandle;
use super::progress::{self, ProgressSink};
use super::torrc::{self, DaemonConfig};
use crate::config::Config;
use crate::error::LaunchError;
use crate::workspace::Workspace;
use anyhow::Context;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{ChildStdout, Command};
use tracing::{debug, info, warn};

/// Whether this platform can run and control the daemon
pub const DAEMON_SUPPORTED: bool = cfg!(unix);

/// Grace period for collecting the exit status of a daemon that quit early
const EXIT_STATUS_WAIT: Duration = Duration::from_secs(2);

/// Starts an anonymizing daemon and yields a control handle
#[async_trait]
pub trait DaemonLauncher: Send + Sync {
    async fn launch(
        &self,
        config: &Config,
        workspace: &Workspace,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<DaemonHandle, LaunchError>;
}

/// Launches the system `tor` binary
#[derive(Debug, Default, Clone, Copy)]
pub struct TorLauncher;

#[async_trait]
impl DaemonLauncher for TorLauncher {
    async fn launch(
        &self,
        config: &Config,
        workspace: &Workspace,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<DaemonHandle, LaunchError> {
        if !DAEMON_SUPPORTED {
            return Err(LaunchError::Unsupported);
        }

        let data_dir = workspace.root();
        let torrc_path = data_dir.join(torrc::TORRC_FILE);
        DaemonConfig::for_launch(config, data_dir)
            .save(&torrc_path)
            .map_err(|source| LaunchError::Torrc {
                path: torrc_path.clone(),
                source,
            })?;

        // A stale file from a previous run would point at a dead port
        let port_file = torrc::control_port_file(data_dir);
        let _ = std::fs::remove_file(&port_file);

        let binary = config.tor_binary();
        info!(
            "Launching {} with data directory {}",
            binary.display(),
            data_dir.display()
        );

        let mut child = Command::new(&binary)
            .arg("-f")
            .arg(&torrc_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| match source.kind() {
                ErrorKind::NotFound => LaunchError::BinaryNotFound {
                    path: binary.clone(),
                    source,
                },
                _ => LaunchError::Spawn {
                    path: binary.clone(),
                    source,
                },
            })?;

        let stdout = child.stdout.take().ok_or_else(|| LaunchError::Spawn {
            path: binary.clone(),
            source: std::io::Error::other("stdout was not captured"),
        })?;
        let mut lines = BufReader::new(stdout).lines();

        let timeout = config.tor.launch_timeout_secs;
        match tokio::time::timeout(
            Duration::from_secs(timeout),
            wait_for_bootstrap(&mut lines, progress.as_ref()),
        )
        .await
        {
            Ok(Ok(())) => {},
            Ok(Err(last_line)) => {
                let status = tokio::time::timeout(EXIT_STATUS_WAIT, child.wait())
                    .await
                    .ok()
                    .and_then(Result::ok);
                return Err(LaunchError::exited(status, last_line));
            },
            Err(_) => return Err(LaunchError::Timeout(timeout)),
        }

        // Keep reading so tor never blocks on a full pipe
        tokio::spawn(drain_output(lines));

        let controller = connect_control(data_dir)
            .await
            .map_err(LaunchError::Control)?;

        info!("Tor is ready (pid {:?})", child.id());
        Ok(DaemonHandle::new(Box::new(controller), Some(child)))
    }
}

/// Read stdout until bootstrap hits 100%.
/// On EOF returns the last line seen, which usually explains the exit.
async fn wait_for_bootstrap(
    lines: &mut Lines<BufReader<ChildStdout>>,
    progress: &dyn ProgressSink,
) -> Result<(), Option<String>> {
    let mut last_line = None;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                debug!(target: "oonib::tor::output", "{}", line);
                if let Some(p) = progress::parse_log_line(&line) {
                    progress.update(&p);
                    if p.is_done() {
                        return Ok(());
                    }
                }
                last_line = Some(line);
            },
            Ok(None) => return Err(last_line),
            Err(e) => {
                warn!("Failed reading tor output: {}", e);
                return Err(last_line);
            },
        }
    }
}

async fn drain_output(mut lines: Lines<BufReader<ChildStdout>>) {
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "oonib::tor::output", "{}", line);
    }
}

/// Authenticate on the control port written to the data directory
async fn connect_control(data_dir: &std::path::Path) -> anyhow::Result<TorController> {
    let port_file = torrc::control_port_file(data_dir);
    let contents = tokio::fs::read_to_string(&port_file)
        .await
        .with_context(|| format!("Failed to read {}", port_file.display()))?;
    let addr = torrc::parse_control_port_file(&contents)
        .with_context(|| format!("No PORT= line in {}", port_file.display()))?;

    let cookie = data_dir.join(torrc::COOKIE_FILE);
    let mut controller = TorController::connect(&addr, &cookie).await?;
    controller.take_ownership().await?;
    Ok(controller)
}
