//! Shared fakes for orchestrator tests

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use oonib::config::Config;
use oonib::error::LaunchError;
use oonib::service::{ServiceHandle, Services, StatusService};
use oonib::tor::{BootstrapProgress, ControlChannel, DaemonHandle, DaemonLauncher, HiddenServiceConfig, ProgressSink};
use oonib::workspace::Workspace;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Behaves like Tor: writes a `hostname` file into every configured directory
pub struct FakeControl {
    pub reject: Option<&'static str>,
    pub delay: Option<Duration>,
    /// Every SETCONF, as the list of directories it carried
    pub requests: Arc<Mutex<Vec<Vec<PathBuf>>>>,
}

#[async_trait]
impl ControlChannel for FakeControl {
    async fn configure_hidden_services(&mut self, services: &[HiddenServiceConfig]) -> Result<()> {
        self.requests
            .lock()
            .unwrap()
            .push(services.iter().map(|s| s.dir.clone()).collect());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        for service in services {
            if let Some(name) = self.reject {
                if service.dir.ends_with(name) {
                    anyhow::bail!("552 Failed to configure rendezvous options");
                }
            }
            let name = service.dir.file_name().unwrap().to_string_lossy();
            std::fs::write(service.dir.join("hostname"), format!("{}xyz.onion\n", name))?;
        }
        Ok(())
    }
}

/// Launcher that never starts a process
#[derive(Default)]
pub struct FakeLauncher {
    pub calls: AtomicUsize,
    pub fail: bool,
    pub reject: Option<&'static str>,
    /// Bootstrap time before the launch resolves
    pub launch_delay: Option<Duration>,
    /// Time each SETCONF takes
    pub setconf_delay: Option<Duration>,
    pub workspaces: Mutex<Vec<PathBuf>>,
    pub requests: Arc<Mutex<Vec<Vec<PathBuf>>>>,
}

impl FakeLauncher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn rejecting(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            reject: Some(name),
            ..Self::default()
        })
    }

    pub fn slow_launch(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            launch_delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn slow_setconf(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            setconf_delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn requests(&self) -> Vec<Vec<PathBuf>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn workspaces(&self) -> Vec<PathBuf> {
        self.workspaces.lock().unwrap().clone()
    }
}

#[async_trait]
impl DaemonLauncher for FakeLauncher {
    async fn launch(
        &self,
        _config: &Config,
        workspace: &Workspace,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<DaemonHandle, LaunchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(workspace.root().is_dir(), "launched without a workspace");
        self.workspaces.lock().unwrap().push(workspace.root().to_path_buf());

        if let Some(delay) = self.launch_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(LaunchError::Timeout(1));
        }

        for (percent, summary) in [(5, "Connecting to directory server"), (100, "Done")] {
            progress.update(&BootstrapProgress {
                percent,
                tag: String::new(),
                summary: summary.to_string(),
            });
        }
        let control = FakeControl {
            reject: self.reject,
            delay: self.setconf_delay,
            requests: Arc::clone(&self.requests),
        };
        Ok(DaemonHandle::new(Box::new(control), None))
    }
}

/// Records every progress update
#[derive(Default)]
pub struct RecordingProgress {
    pub updates: Mutex<Vec<(u8, String)>>,
}

impl ProgressSink for RecordingProgress {
    fn update(&self, progress: &BootstrapProgress) {
        self.updates
            .lock()
            .unwrap()
            .push((progress.percent, progress.summary.clone()));
    }
}

pub fn services() -> Services {
    let collector: ServiceHandle = Arc::new(StatusService::new("collector"));
    let bouncer: ServiceHandle = Arc::new(StatusService::new("bouncer"));
    Services::new(collector, Some(bouncer))
}

/// Hidden service config rooted in `tmp`
pub fn hidden_service_config(tmp: &Path) -> Config {
    let mut config = Config::default();
    config.main.tmp_dir = tmp.join("tmp");
    config.main.pidfile = tmp.join("oonib.pid");
    config.tor.hostname_timeout_secs = 5;
    config
}

/// Fallback config on ephemeral ports
pub fn fallback_config(tmp: &Path) -> Config {
    let mut config = hidden_service_config(tmp);
    config.main.tor_hidden_service = false;
    config.listen.bouncer_port = 0;
    config.listen.collector_port = 0;
    config
}
