//! Generated torrc for the launched daemon

use super::control::quote;
use crate::config::Config;
use std::io;
use std::path::{Path, PathBuf};

/// File Tor writes its control address to (`ControlPortWriteToFile`)
pub const CONTROL_PORT_FILE: &str = "control_port";
/// Cookie Tor writes with `CookieAuthentication 1`
pub const COOKIE_FILE: &str = "control_auth_cookie";
/// Name of the generated torrc inside the data directory
pub const TORRC_FILE: &str = "torrc";

/// Ordered torrc options
#[derive(Debug, Clone, Default)]
pub struct DaemonConfig {
    entries: Vec<(String, String)>,
}

impl DaemonConfig {
    /// Options for a daemon owned by this process, with `data_dir` as its DataDirectory
    pub fn for_launch(config: &Config, data_dir: &Path) -> Self {
        let mut torrc = Self::default();
        torrc.set("SocksPort", config.main.socks_port.to_string());
        torrc.set("ControlPort", "auto");
        torrc.set(
            "ControlPortWriteToFile",
            data_dir.join(CONTROL_PORT_FILE).to_string_lossy(),
        );
        torrc.set("CookieAuthentication", "1");
        torrc.set("DataDirectory", data_dir.to_string_lossy());
        torrc.set("Log", "notice stdout");
        // Tor exits on its own if we die before taking ownership
        torrc.set("__OwningControllerProcess", std::process::id().to_string());

        if config.main.tor2webmode {
            torrc.set("Tor2webMode", "1");
            torrc.set(
                "CircuitBuildTimeout",
                config.tor.circuit_build_timeout_secs.to_string(),
            );
        }
        torrc
    }

    /// Set an option, replacing any earlier value
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            let needs_quotes =
                value.contains(['"', '#', '\\']) || (is_path_key(key) && value.contains(' '));
            let value = if needs_quotes { quote(value) } else { value.clone() };
            out.push_str(key);
            out.push(' ');
            out.push_str(&value);
            out.push('\n');
        }
        out
    }

    /// Write the torrc to `path`
    pub fn save(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, self.render())
    }
}

/// Values of these options are single paths, so spaces must be quoted
fn is_path_key(key: &str) -> bool {
    matches!(key, "DataDirectory" | "ControlPortWriteToFile")
}

/// Where the launched daemon writes its control address
pub fn control_port_file(data_dir: &Path) -> PathBuf {
    data_dir.join(CONTROL_PORT_FILE)
}

/// Parse `PORT=127.0.0.1:34567` from the control port file
pub fn parse_control_port_file(contents: &str) -> Option<String> {
    contents
        .lines()
        .find_map(|line| line.trim().strip_prefix("PORT="))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_launch_options() {
        let config = Config::default();
        let torrc = DaemonConfig::for_launch(&config, Path::new("/tmp/oonib-tor-x"));

        assert_eq!(torrc.get("SocksPort"), Some("9050"));
        assert_eq!(torrc.get("DataDirectory"), Some("/tmp/oonib-tor-x"));
        assert_eq!(torrc.get("ControlPort"), Some("auto"));
        assert_eq!(torrc.get("CookieAuthentication"), Some("1"));
        assert!(torrc.get("Tor2webMode").is_none());
        assert!(torrc.get("CircuitBuildTimeout").is_none());

        let rendered = torrc.render();
        assert!(rendered.contains("SocksPort 9050\n"));
        assert!(rendered.contains("ControlPortWriteToFile /tmp/oonib-tor-x/control_port\n"));
        assert!(rendered.contains("Log notice stdout\n"));
    }

    #[test]
    fn test_tor2web_options() {
        let mut config = Config::default();
        config.main.tor2webmode = true;
        config.main.socks_port = 9150;

        let torrc = DaemonConfig::for_launch(&config, Path::new("/data"));
        assert_eq!(torrc.get("SocksPort"), Some("9150"));
        assert_eq!(torrc.get("Tor2webMode"), Some("1"));
        assert_eq!(torrc.get("CircuitBuildTimeout"), Some("60"));
    }

    #[test]
    fn test_paths_with_spaces_are_quoted() {
        let torrc = DaemonConfig::for_launch(&Config::default(), Path::new("/my data"));
        assert!(torrc.render().contains("DataDirectory \"/my data\"\n"));
    }

    #[test]
    fn test_set_replaces() {
        let mut torrc = DaemonConfig::default();
        torrc.set("SocksPort", "1");
        torrc.set("SocksPort", "2");
        assert_eq!(torrc.render(), "SocksPort 2\n");
    }

    #[test]
    fn test_parse_control_port_file() {
        assert_eq!(
            parse_control_port_file("PORT=127.0.0.1:34567\n"),
            Some("127.0.0.1:34567".to_string())
        );
        assert_eq!(parse_control_port_file(""), None);
    }

    #[test]
    fn test_save() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(TORRC_FILE);
        let mut torrc = DaemonConfig::default();
        torrc.set("SocksPort", "9050");
        torrc.save(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "SocksPort 9050\n");
    }
}
