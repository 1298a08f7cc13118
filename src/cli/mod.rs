//! Command-line interface for oonib
//!
//! - `run` - Bring up the services and serve until stopped
//! - `check` - Validate the configuration and print what `run` would do

use crate::config::{self, Config};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// oonib - OONI backend service launcher
#[derive(Parser, Debug)]
#[command(name = "oonib")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration directory
    #[arg(short, long, default_value = "/etc/oonib")]
    pub config_dir: PathBuf,

    /// Verbose output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the collector and bouncer (typically called by systemd)
    Run(RunArgs),

    /// Validate configuration and show the startup plan
    Check(CheckArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to config file (overrides config_dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// PID file (overrides `main.pidfile`)
    #[arg(long)]
    pub pidfile: Option<PathBuf>,
}

/// Arguments for check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Path to config file (overrides config_dir)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Load the config named on the command line, or `<config_dir>/oonib.toml`
/// when it exists, or the default search path.
pub fn resolve_config(config_dir: &Path, explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return config::load_from_path(path);
    }
    let in_dir = config_dir.join("oonib.toml");
    if in_dir.exists() {
        return config::load_from_path(&in_dir);
    }
    config::load_config()
}

/// Human-readable summary of what `run` would bring up
pub fn describe_plan(config: &Config) -> Vec<String> {
    let mut lines = Vec::new();
    let main = &config.main;

    if main.tor_hidden_service {
        lines.push(format!("tor binary: {}", config.tor_binary().display()));
        match &main.tor_datadir {
            Some(dir) => lines.push(format!("tor data directory: {}", dir.display())),
            None => lines.push(format!(
                "tor data directory: temporary, under {}",
                main.tmp_dir.display()
            )),
        }
        lines.push(format!("socks port: {}", main.socks_port));
        if main.tor2webmode {
            lines.push("tor2web mode: on".to_string());
        }
        lines.push(format!(
            "collector: hidden service, port {}",
            config.tor.hidden_service_port
        ));
        if main.bouncer_enabled {
            lines.push(format!(
                "bouncer: hidden service, port {}",
                config.tor.hidden_service_port
            ));
        }
        if main.fallback_on_launch_failure {
            lines.push("on launch failure: local listeners".to_string());
        }
    } else {
        let iface = config.listen.interface;
        if main.bouncer_enabled {
            lines.push(format!("bouncer: http://{}:{}", iface, config.listen.bouncer_port));
        }
        lines.push(format!("collector: http://{}:{}", iface, config.listen.collector_port));
    }

    lines.push(format!("pid file: {}", main.pidfile.display()));
    lines
}

/// Parse command line arguments
pub fn parse() -> Cli {
    Cli::parse()
}
