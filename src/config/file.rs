//! Configuration file loading

use super::Config;
use anyhow::{Context, Result};
use std::path::Path;

/// Default config file locations
const CONFIG_PATHS: &[&str] = &["/etc/oonib/oonib.toml", "./oonib.toml"];

/// Load configuration from the first default location that exists
pub fn load_config() -> Result<Config> {
    let path = find_config_file()?;
    load_from_path(Path::new(path))
}

/// Find first existing config file
fn find_config_file() -> Result<&'static str> {
    for path in CONFIG_PATHS {
        if Path::new(path).exists() {
            return Ok(path);
        }
    }
    anyhow::bail!("No configuration file found. Tried: {:?}", CONFIG_PATHS)
}

/// Load and parse config from path
pub fn load_from_path(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse(&contents).with_context(|| format!("Invalid config file: {}", path.display()))
}

/// Parse and validate config from TOML text
pub fn parse(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents).context("Failed to parse TOML")?;

    super::validate(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.main.socks_port, 9050);
        assert!(config.main.tor_hidden_service);
        assert!(config.main.bouncer_enabled);
        assert!(config.main.tor_datadir.is_none());
        assert_eq!(config.tor_binary(), Path::new("tor"));
        assert_eq!(config.listen.bouncer_port, 8888);
        assert_eq!(config.listen.collector_port, 8889);
        assert_eq!(config.listen.interface, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.tor.hidden_service_port, 80);
    }

    #[test]
    fn test_explicit_fields() {
        let config = parse(
            r#"
            [main]
            socks_port = 9150
            tor2webmode = true
            tor_datadir = "/var/lib/oonib/tor"
            tor_binary = "/usr/local/bin/tor"
            tor_hidden_service = false
            bouncer_enabled = false

            [listen]
            interface = "0.0.0.0"
            "#,
        )
        .unwrap();

        assert_eq!(config.main.socks_port, 9150);
        assert!(config.main.tor2webmode);
        assert_eq!(
            config.main.tor_datadir.as_deref(),
            Some(Path::new("/var/lib/oonib/tor"))
        );
        assert_eq!(config.tor_binary(), Path::new("/usr/local/bin/tor"));
        assert!(!config.main.tor_hidden_service);
        assert!(!config.main.bouncer_enabled);
        assert!(config.listen.interface.is_unspecified());
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oonib.toml");
        std::fs::write(&path, "[main]\nsocks_port = 9999\n").unwrap();

        let config = load_from_path(&path).unwrap();
        assert_eq!(config.main.socks_port, 9999);

        assert!(load_from_path(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_bad_interface_rejected() {
        assert!(parse("[listen]\ninterface = \"localhost:80\"\n").is_err());
    }
}
