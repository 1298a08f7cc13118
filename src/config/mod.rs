//! Configuration loading and validation
//!
//! Handles TOML configuration parsing with strict validation.
//! No runtime mutation - configuration is immutable after load.
//! Missing optional fields mean "use the default", never an error.

pub mod file;
mod validation;

pub use file::{load_config, load_from_path, parse};
pub use validation::validate;

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub main: MainConfig,
    #[serde(default)]
    pub tor: TorConfig,
    #[serde(default)]
    pub listen: ListenConfig,
}

/// Operational switches shared by every component
#[derive(Debug, Clone, Deserialize)]
pub struct MainConfig {
    /// SOCKS port handed to the launched Tor daemon
    #[serde(default = "default_socks_port")]
    pub socks_port: u16,
    /// Run Tor in tor2web mode (non-anonymous client side)
    #[serde(default)]
    pub tor2webmode: bool,
    /// Tor data directory. A temporary workspace is used when unset.
    pub tor_datadir: Option<PathBuf>,
    /// Tor binary. `tor` from PATH is used when unset.
    pub tor_binary: Option<PathBuf>,
    /// Expose services as Tor hidden services
    #[serde(default = "default_true")]
    pub tor_hidden_service: bool,
    /// Expose the bouncer next to the collector
    #[serde(default = "default_true")]
    pub bouncer_enabled: bool,
    #[serde(default = "default_pidfile")]
    pub pidfile: PathBuf,
    /// Base directory for temporary workspaces
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: PathBuf,
    /// Bind plain local listeners if Tor fails to launch
    #[serde(default)]
    pub fallback_on_launch_failure: bool,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            socks_port: default_socks_port(),
            tor2webmode: false,
            tor_datadir: None,
            tor_binary: None,
            tor_hidden_service: true,
            bouncer_enabled: true,
            pidfile: default_pidfile(),
            tmp_dir: default_tmp_dir(),
            fallback_on_launch_failure: false,
        }
    }
}

fn default_socks_port() -> u16 {
    9050
}
fn default_true() -> bool {
    true
}
fn default_pidfile() -> PathBuf {
    PathBuf::from("oonib.pid")
}
fn default_tmp_dir() -> PathBuf {
    PathBuf::from("tmp")
}

/// Tor daemon launch settings
#[derive(Debug, Clone, Deserialize)]
pub struct TorConfig {
    /// How long to wait for bootstrap to reach 100%
    #[serde(default = "default_launch_timeout")]
    pub launch_timeout_secs: u64,
    /// How long to wait for Tor to write a service hostname
    #[serde(default = "default_hostname_timeout")]
    pub hostname_timeout_secs: u64,
    /// CircuitBuildTimeout applied in tor2web mode
    #[serde(default = "default_circuit_build_timeout")]
    pub circuit_build_timeout_secs: u64,
    /// Virtual port clients connect to on each hidden service
    #[serde(default = "default_hs_port")]
    pub hidden_service_port: u16,
}

impl Default for TorConfig {
    fn default() -> Self {
        Self {
            launch_timeout_secs: default_launch_timeout(),
            hostname_timeout_secs: default_hostname_timeout(),
            circuit_build_timeout_secs: default_circuit_build_timeout(),
            hidden_service_port: default_hs_port(),
        }
    }
}

fn default_launch_timeout() -> u64 {
    120
}
fn default_hostname_timeout() -> u64 {
    30
}
fn default_circuit_build_timeout() -> u64 {
    60
}
fn default_hs_port() -> u16 {
    80
}

/// Plain listeners used when hidden services are disabled
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_interface")]
    pub interface: IpAddr,
    #[serde(default = "default_bouncer_port")]
    pub bouncer_port: u16,
    #[serde(default = "default_collector_port")]
    pub collector_port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            bouncer_port: default_bouncer_port(),
            collector_port: default_collector_port(),
        }
    }
}

fn default_interface() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}
fn default_bouncer_port() -> u16 {
    8888
}
fn default_collector_port() -> u16 {
    8889
}

impl Config {
    /// Tor binary to launch, falling back to `tor` on PATH
    pub fn tor_binary(&self) -> PathBuf {
        self.main
            .tor_binary
            .clone()
            .unwrap_or_else(|| PathBuf::from("tor"))
    }
}
