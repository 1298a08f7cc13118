//! oonib - OONI backend launcher
//!
//! Brings up the collector and bouncer either as Tor hidden services
//! backed by a private Tor daemon, or as plain listeners on localhost.
//!
//! # Usage
//!
//! ```bash
//! # Validate configuration and show what would start
//! oonib check --config oonib.toml
//!
//! # Run until SIGINT or SIGTERM
//! oonib run --config oonib.toml --pidfile /run/oonib.pid
//! ```

use anyhow::Result;
use oonib::cli::{self, Cli, Commands};
use oonib::lifecycle::{PidFile, StopSignals};
use oonib::logging;
use oonib::orchestrator::ServiceOrchestrator;
use oonib::service::{ServiceHandle, Services, StatusService};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = cli::parse();

    if cli.verbose {
        logging::init_with_level(Level::DEBUG);
    } else {
        logging::init();
    }

    match &cli.command {
        Commands::Run(args) => {
            run(&cli, args).await?;
        },
        Commands::Check(args) => {
            check(&cli, args)?;
        },
    }

    Ok(())
}

/// Run until a stop signal arrives
async fn run(cli: &Cli, args: &cli::RunArgs) -> Result<()> {
    info!("oonib v{} starting", oonib::VERSION);

    let config = cli::resolve_config(&cli.config_dir, args.config.as_deref())?;

    // Before anything that needs cleaning up exists
    let signals = StopSignals::install()?;

    let pid_path = args.pidfile.clone().unwrap_or_else(|| config.main.pidfile.clone());
    let pidfile = PidFile::create(&pid_path)?;

    let bouncer: Option<ServiceHandle> = config
        .main
        .bouncer_enabled
        .then(|| Arc::new(StatusService::new("bouncer")) as ServiceHandle);
    let services = Services::new(Arc::new(StatusService::new("collector")), bouncer);

    let mut orchestrator = ServiceOrchestrator::new(config, services).with_pidfile(pidfile);

    let token = CancellationToken::new();
    orchestrator.run(signals.wait(token)).await;

    let failed = orchestrator.failed_bindings();
    if !failed.is_empty() {
        info!("Stopped with {} failed binding(s): {:?}", failed.len(), failed);
    }

    Ok(())
}

/// Print the effective startup plan
fn check(cli: &Cli, args: &cli::CheckArgs) -> Result<()> {
    let config = cli::resolve_config(&cli.config_dir, args.config.as_deref())?;

    println!("Configuration OK");
    for line in cli::describe_plan(&config) {
        println!("  {}", line);
    }

    Ok(())
}
