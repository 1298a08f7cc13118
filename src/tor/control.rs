//! Tor Control Port client
//!
//! Communicates with the Tor daemon via the control protocol.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Per-line read timeout for control replies
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Commands are logged truncated; SETCONF lines carry full paths
const PREVIEW_CHARS: usize = 100;

/// One `HiddenServiceDir`/`HiddenServicePort` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiddenServiceConfig {
    /// Directory where Tor keeps the service keys and `hostname`
    pub dir: PathBuf,
    /// Port clients connect to on the .onion address
    pub public_port: u16,
    /// Local address connections are forwarded to
    pub target: SocketAddr,
}

/// Control-channel operations the orchestrator needs
#[async_trait]
pub trait ControlChannel: Send {
    /// Replace the daemon's hidden service set with `services`
    async fn configure_hidden_services(&mut self, services: &[HiddenServiceConfig]) -> Result<()>;
}

/// How a single reply line affects the reply being read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineKind {
    /// `250 OK`, `550 ...`: last line of the reply
    Final { code: u16 },
    /// `250-key=value`
    Mid,
    /// `250+key=` followed by data lines and a lone `.`
    DataStart,
    /// `650 ...` asynchronous event, not part of any reply
    Event,
    /// Anything else (data lines)
    Other,
}

pub(crate) fn classify_line(line: &str) -> LineKind {
    let bytes = line.as_bytes();
    if bytes.len() < 4 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return LineKind::Other;
    }
    let code: u16 = match line[..3].parse() {
        Ok(code) => code,
        Err(_) => return LineKind::Other,
    };
    match bytes[3] {
        b' ' if code / 100 == 6 => LineKind::Event,
        b' ' => LineKind::Final { code },
        b'-' if code / 100 == 6 => LineKind::Event,
        b'-' => LineKind::Mid,
        b'+' => LineKind::DataStart,
        _ => LineKind::Other,
    }
}

/// Quote a value for SETCONF/torrc
pub(crate) fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// First line of a command, cut to at most `PREVIEW_CHARS` characters
fn log_preview(cmd: &str) -> &str {
    let line = cmd.lines().next().unwrap_or_default();
    line.char_indices()
        .nth(PREVIEW_CHARS)
        .map_or(line, |(i, _)| &line[..i])
}

/// Connection to Tor control port
pub struct TorController {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    authenticated: bool,
}

impl TorController {
    /// Connect to the control port and authenticate with the cookie Tor wrote
    pub async fn connect(addr: &str, cookie_path: &Path) -> Result<Self> {
        debug!("Connecting to Tor control port: {}", addr);

        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("Failed to connect to Tor at {}", addr))?;
        let (read, write) = stream.into_split();

        let mut controller = Self {
            reader: BufReader::new(read),
            writer: write,
            authenticated: false,
        };
        controller.authenticate_cookie(cookie_path).await?;

        Ok(controller)
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Authenticate with cookie file
    async fn authenticate_cookie(&mut self, path: &Path) -> Result<()> {
        let cookie = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read control cookie {}", path.display()))?;
        let cmd = format!("AUTHENTICATE {}\r\n", data_encoding::HEXLOWER.encode(&cookie));
        self.send_command(&cmd).await?;
        self.authenticated = true;
        debug!("Authenticated with cookie from {}", path.display());
        Ok(())
    }

    /// Send a command and read the full reply.
    ///
    /// Returns every reply line except the final `250 OK`. A `4xx`/`5xx`
    /// final line becomes an error.
    async fn send_command(&mut self, cmd: &str) -> Result<String> {
        let preview = log_preview(cmd);
        debug!("Sending Tor command: {}", preview);

        self.writer.write_all(cmd.as_bytes()).await?;
        self.writer.flush().await?;

        let mut response = String::new();
        let mut in_data_block = false;

        loop {
            let mut line = String::new();
            let bytes_read = match tokio::time::timeout(
                READ_TIMEOUT,
                self.reader.read_line(&mut line),
            )
            .await
            {
                Ok(result) => result?,
                Err(_) => {
                    warn!("Timeout waiting for Tor response to {}", preview);
                    bail!("Timeout waiting for Tor response");
                },
            };

            if bytes_read == 0 {
                bail!("Tor closed the control connection");
            }

            if in_data_block {
                if line.trim_end() == "." {
                    in_data_block = false;
                } else {
                    response.push_str(&line);
                }
                continue;
            }

            match classify_line(&line) {
                LineKind::Final { code } if code / 100 == 2 => break,
                LineKind::Final { .. } => {
                    response.push_str(&line);
                    bail!("Tor control error: {}", response.trim());
                },
                LineKind::DataStart => {
                    in_data_block = true;
                    response.push_str(&line);
                },
                LineKind::Event => {
                    debug!("Ignoring async event: {}", line.trim());
                },
                LineKind::Mid | LineKind::Other => response.push_str(&line),
            }
        }

        Ok(response)
    }

    /// Make the daemon exit when this control connection closes
    pub async fn take_ownership(&mut self) -> Result<()> {
        self.send_command("TAKEOWNERSHIP\r\n").await?;
        // Ownership now rests on the connection rather than our pid
        self.send_command("RESETCONF __OwningControllerProcess\r\n")
            .await?;
        Ok(())
    }

    /// Build the SETCONF line for a full hidden service set
    pub(crate) fn hidden_services_command(services: &[HiddenServiceConfig]) -> String {
        let mut cmd = String::from("SETCONF");
        for service in services {
            let dir = service.dir.to_string_lossy();
            let port = format!("{} {}", service.public_port, service.target);
            cmd.push_str(&format!(
                " HiddenServiceDir={} HiddenServicePort={}",
                quote(&dir),
                quote(&port)
            ));
        }
        if services.is_empty() {
            cmd.push_str(" HiddenServiceDir");
        }
        cmd.push_str("\r\n");
        cmd
    }
}

#[async_trait]
impl ControlChannel for TorController {
    async fn configure_hidden_services(&mut self, services: &[HiddenServiceConfig]) -> Result<()> {
        // SETCONF replaces every HiddenService* option, so the whole set goes out each time
        let cmd = Self::hidden_services_command(services);
        self.send_command(&cmd)
            .await
            .context("SETCONF HiddenServiceDir failed")?;
        Ok(())
    }
}
