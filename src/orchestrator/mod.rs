//! Service orchestration
//!
//! Sequences workspace, daemon launch and service bindings for one run,
//! keeps every listener it creates, and tears all of it down again.
//!
//! Failures are scoped: a daemon that will not start only disables the
//! hidden service path, and a binding that fails only loses that one
//! endpoint. Nothing here ends the process.

mod state;

pub use state::OrchestratorState;

use crate::config::Config;
use crate::error::BindError;
use crate::hidden_service::{HiddenServiceBinder, HiddenServiceDescriptor};
use crate::lifecycle::PidFile;
use crate::listener::{self, ListenerHandle};
use crate::service::{ServiceHandle, ServiceRole, Services};
use crate::tor::{DaemonHandle, DaemonLauncher, LogProgress, ProgressSink, TorLauncher, DAEMON_SUPPORTED};
use crate::workspace::Workspace;
use anyhow::Result;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

type BindOutcome = (ServiceRole, Result<HiddenServiceDescriptor, BindError>);

/// Owns everything one run brings up
pub struct ServiceOrchestrator {
    config: Arc<Config>,
    services: Services,
    launcher: Arc<dyn DaemonLauncher>,
    progress: Arc<dyn ProgressSink>,
    binder: HiddenServiceBinder,
    state: OrchestratorState,
    // Field order is drop order: listeners go before the workspace they live in
    listeners: Vec<ListenerHandle>,
    hidden_services: Vec<HiddenServiceDescriptor>,
    pending: JoinSet<BindOutcome>,
    daemon: Option<Arc<DaemonHandle>>,
    daemon_launched: bool,
    workspace: Option<Workspace>,
    pidfile: Option<PidFile>,
    failed: Vec<ServiceRole>,
}

impl ServiceOrchestrator {
    /// Orchestrator using the system `tor` and logging bootstrap progress
    pub fn new(config: Config, services: Services) -> Self {
        let hostname_timeout = Duration::from_secs(config.tor.hostname_timeout_secs);
        Self {
            config: Arc::new(config),
            services,
            launcher: Arc::new(TorLauncher),
            progress: Arc::new(LogProgress),
            binder: HiddenServiceBinder::new(hostname_timeout),
            state: OrchestratorState::Idle,
            listeners: Vec::new(),
            hidden_services: Vec::new(),
            pending: JoinSet::new(),
            daemon: None,
            daemon_launched: false,
            workspace: None,
            pidfile: None,
            failed: Vec::new(),
        }
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn DaemonLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// PID file to remove on shutdown
    pub fn with_pidfile(mut self, pidfile: PidFile) -> Self {
        self.pidfile = Some(pidfile);
        self
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Hidden services that finished binding
    pub fn descriptors(&self) -> &[HiddenServiceDescriptor] {
        &self.hidden_services
    }

    /// Plain local listeners
    pub fn listeners(&self) -> &[ListenerHandle] {
        &self.listeners
    }

    /// Local addresses of every open listener, plain or hidden-service backed
    pub fn listener_addrs(&self) -> Vec<(String, SocketAddr)> {
        let plain = self
            .listeners
            .iter()
            .filter(|l| !l.is_closed())
            .map(|l| (l.service_name().to_string(), l.local_addr()));
        let hidden = self
            .hidden_services
            .iter()
            .filter(|d| !d.listener().is_closed())
            .map(|d| (d.service_name().to_string(), d.listener().local_addr()));
        plain.chain(hidden).collect()
    }

    /// Roles whose binding failed
    pub fn failed_bindings(&self) -> &[ServiceRole] {
        &self.failed
    }

    pub fn workspace(&self) -> Option<&Workspace> {
        self.workspace.as_ref()
    }

    pub fn workspace_path(&self) -> Option<&Path> {
        self.workspace.as_ref().map(Workspace::root)
    }

    /// Whether the launcher was invoked during this run
    pub fn daemon_launched(&self) -> bool {
        self.daemon_launched
    }

    fn transition(&mut self, next: OrchestratorState) {
        if !self.state.can_transition_to(next) {
            warn!("Unexpected state change {} -> {}", self.state, next);
        }
        debug!("Orchestrator {} -> {}", self.state, next);
        self.state = next;
    }

    fn bouncer(&self) -> Option<ServiceHandle> {
        if !self.config.main.bouncer_enabled {
            return None;
        }
        if self.services.bouncer.is_none() {
            warn!("Bouncer is enabled but no bouncer service was supplied");
        }
        self.services.bouncer.clone()
    }

    /// Bring everything up and enter `Running`.
    ///
    /// Hidden service bindings may still be in flight when this returns;
    /// [`run`](Self::run) and [`shutdown`](Self::shutdown) collect them.
    pub async fn start(&mut self) {
        if self.state != OrchestratorState::Idle {
            warn!("Orchestrator already started ({})", self.state);
            return;
        }

        let mut hidden = self.config.main.tor_hidden_service;
        if hidden && !DAEMON_SUPPORTED {
            warn!("Tor hidden services are not supported on this platform; using local listeners");
            hidden = false;
        }

        if !hidden {
            self.transition(OrchestratorState::WorkspaceReady);
            self.transition(OrchestratorState::BindingServices);
            self.bind_fallback().await;
            self.transition(OrchestratorState::Running);
            return;
        }

        let workspace = match self.prepare_workspace() {
            Ok(workspace) => workspace,
            Err(e) => {
                error!("Setup failed: {:#}", e);
                self.transition(OrchestratorState::BindingServices);
                self.after_launch_failure().await;
                self.transition(OrchestratorState::Running);
                return;
            },
        };
        self.transition(OrchestratorState::WorkspaceReady);
        self.transition(OrchestratorState::DaemonStarting);
        self.daemon_launched = true;

        // Held by self so an interrupted launch still gets released in shutdown
        let workspace = self.workspace.insert(workspace);
        let launch = self
            .launcher
            .launch(&self.config, workspace, Arc::clone(&self.progress))
            .await;

        match launch {
            Ok(daemon) => {
                self.daemon = Some(Arc::new(daemon));
                self.transition(OrchestratorState::DaemonReady);
                self.transition(OrchestratorState::BindingServices);
                self.bind_hidden_services().await;
            },
            Err(e) => {
                error!("Setup failed: {}", e);
                self.transition(OrchestratorState::BindingServices);
                self.after_launch_failure().await;
            },
        }

        self.transition(OrchestratorState::Running);
    }

    fn prepare_workspace(&self) -> Result<Workspace> {
        match &self.config.main.tor_datadir {
            Some(dir) => {
                debug!("Using configured tor data directory {}", dir.display());
                Workspace::external(dir)
            },
            None => {
                warn!("Option 'tor_datadir' is unspecified!");
                info!(
                    "Creating temporary directory under {} for datadir",
                    self.config.main.tmp_dir.display()
                );
                let workspace = Workspace::acquire(&self.config.main.tmp_dir)?;
                debug!("Using {}", workspace.root().display());
                Ok(workspace)
            },
        }
    }

    async fn after_launch_failure(&mut self) {
        if self.config.main.fallback_on_launch_failure {
            warn!("Falling back to local listeners");
            self.bind_fallback().await;
        } else {
            warn!("Hidden services unavailable; no services are exposed");
        }
    }

    /// Collector first, then the bouncer. Publishing runs in the background.
    async fn bind_hidden_services(&mut self) {
        let Some(daemon) = self.daemon.clone() else {
            return;
        };
        let Some(workspace) = self.workspace.as_ref() else {
            return;
        };
        let public_port = self.config.tor.hidden_service_port;

        let mut roles = vec![(ServiceRole::Collector, self.services.collector.clone())];
        if let Some(bouncer) = self.bouncer() {
            roles.push((ServiceRole::Bouncer, bouncer));
        }

        let dirs: Vec<_> = roles
            .iter()
            .map(|(role, _)| workspace.service_dir(role.as_str()))
            .collect();

        for ((role, service), dir) in roles.into_iter().zip(dirs) {
            match self.binder.prepare(public_port, &dir, service).await {
                Ok(pending) => {
                    let daemon = Arc::clone(&daemon);
                    self.pending
                        .spawn(async move { (role, pending.publish(&daemon).await) });
                },
                Err(e) => {
                    error!("Setup of {} hidden service failed: {}", role, e);
                    self.failed.push(role);
                },
            }
        }
    }

    /// Plain listeners: bouncer, then collector
    async fn bind_fallback(&mut self) {
        let interface = self.config.listen.interface;

        if let Some(bouncer) = self.bouncer() {
            self.bind_local(ServiceRole::Bouncer, self.config.listen.bouncer_port, interface, bouncer)
                .await;
        }

        let collector = self.services.collector.clone();
        self.bind_local(
            ServiceRole::Collector,
            self.config.listen.collector_port,
            interface,
            collector,
        )
        .await;
    }

    async fn bind_local(
        &mut self,
        role: ServiceRole,
        port: u16,
        interface: IpAddr,
        service: ServiceHandle,
    ) {
        match listener::bind_local(port, interface, service).await {
            Ok(handle) => {
                info!("Exposed {} on http://{}", role, handle.local_addr());
                self.listeners.push(handle);
            },
            Err(e) => {
                error!("Setup of {} listener failed: {}", role, e);
                self.failed.push(role);
            },
        }
    }

    fn record_binding(&mut self, joined: Result<BindOutcome, JoinError>) {
        match joined {
            Ok((role, Ok(descriptor))) => {
                match descriptor.onion_uri() {
                    Some(uri) => info!("Exposed {} Tor hidden service on {}", role, uri),
                    None => info!("Exposed {} Tor hidden service", role),
                }
                self.hidden_services.push(descriptor);
            },
            Ok((role, Err(e))) => {
                error!("Setup of {} hidden service failed: {}", role, e);
                self.failed.push(role);
            },
            Err(e) => error!("Hidden service binding task failed: {}", e),
        }
    }

    /// Wait until every in-flight binding has settled
    pub async fn settle_bindings(&mut self) {
        while let Some(joined) = self.pending.join_next().await {
            self.record_binding(joined);
        }
    }

    /// Start, serve until `stop` resolves, then shut down.
    ///
    /// `stop` is watched from the beginning: resolving it during startup
    /// abandons the rest of startup and goes straight to shutdown.
    pub async fn run<F>(&mut self, stop: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(stop);

        let interrupted = tokio::select! {
            _ = self.start() => false,
            _ = &mut stop => true,
        };
        if interrupted {
            warn!("Stop requested during startup ({})", self.state);
            self.shutdown().await;
            return;
        }
        info!("Running; waiting for stop signal");

        loop {
            tokio::select! {
                _ = &mut stop => break,
                Some(joined) = self.pending.join_next(), if !self.pending.is_empty() => {
                    self.record_binding(joined);
                }
            }
        }

        self.shutdown().await;
    }

    /// Tear everything down. Every step runs even if an earlier one failed.
    /// Calling this again after it finished does nothing.
    pub async fn shutdown(&mut self) {
        if self.state.is_stopping() {
            debug!("Shutdown already done ({})", self.state);
            return;
        }
        self.transition(OrchestratorState::ShuttingDown);

        // In-flight bindings finish first so no endpoint is left half-made
        if !self.pending.is_empty() {
            info!("Waiting for {} pending binding(s)", self.pending.len());
        }
        self.settle_bindings().await;

        for descriptor in &mut self.hidden_services {
            if let Err(e) = descriptor.close().await {
                warn!("{}", e);
            }
        }
        for listener in &mut self.listeners {
            if let Err(e) = listener.close().await {
                warn!("{}", e);
            }
        }

        if let Some(daemon) = self.daemon.take() {
            if let Err(e) = daemon.terminate().await {
                warn!("{}", e);
            }
        }

        if let Some(workspace) = self.workspace.as_mut() {
            if let Err(e) = workspace.release() {
                warn!("{}", e);
            }
        }

        if let Some(pidfile) = self.pidfile.as_mut() {
            if let Err(e) = pidfile.remove() {
                warn!("{}", e);
            }
        }

        self.transition(OrchestratorState::Stopped);
        info!("Shutdown complete");
    }
}

impl Drop for ServiceOrchestrator {
    fn drop(&mut self) {
        // Listeners, the daemon and an owned workspace clean up on drop;
        // the pid file does not
        if !self.state.is_stopping() {
            if let Some(pidfile) = self.pidfile.as_mut() {
                if let Err(e) = pidfile.remove() {
                    warn!("{}", e);
                }
            }
        }
    }
}

