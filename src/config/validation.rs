//! Configuration validation
//!
//! Fail-fast validation of configuration invariants.

use super::Config;
use anyhow::{bail, Result};

/// Validate configuration invariants
pub fn validate(config: &Config) -> Result<()> {
    validate_main(config)?;
    validate_tor(config)?;
    validate_listen(config)?;
    Ok(())
}

fn validate_main(config: &Config) -> Result<()> {
    if config.main.socks_port == 0 {
        bail!("main.socks_port cannot be 0");
    }
    if config.main.pidfile.as_os_str().is_empty() {
        bail!("main.pidfile cannot be empty");
    }
    if config.main.tmp_dir.as_os_str().is_empty() {
        bail!("main.tmp_dir cannot be empty");
    }
    if let Some(dir) = &config.main.tor_datadir {
        if dir.as_os_str().is_empty() {
            bail!("main.tor_datadir cannot be an empty path (omit it instead)");
        }
    }
    Ok(())
}

fn validate_tor(config: &Config) -> Result<()> {
    if config.tor.launch_timeout_secs == 0 {
        bail!("tor.launch_timeout_secs must be greater than 0");
    }
    if config.tor.hostname_timeout_secs == 0 {
        bail!("tor.hostname_timeout_secs must be greater than 0");
    }
    if config.tor.hidden_service_port == 0 {
        bail!("tor.hidden_service_port cannot be 0");
    }
    Ok(())
}

fn validate_listen(config: &Config) -> Result<()> {
    // Port 0 asks the OS for an ephemeral port, so only explicit ports can clash
    let listen = &config.listen;
    if listen.bouncer_port != 0 && listen.bouncer_port == listen.collector_port {
        bail!(
            "listen.bouncer_port and listen.collector_port must differ (both {})",
            listen.collector_port
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_socks_port() {
        let mut config = Config::default();
        config.main.socks_port = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_port_clash() {
        let mut config = Config::default();
        config.listen.bouncer_port = 8889;
        assert!(validate(&config).is_err());

        config.listen.bouncer_port = 0;
        config.listen.collector_port = 0;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_timeouts() {
        let mut config = Config::default();
        config.tor.launch_timeout_secs = 0;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.tor.hostname_timeout_secs = 0;
        assert!(validate(&config).is_err());
    }
}
