//! Tor daemon interaction
//!
//! Launching the daemon, following its bootstrap, and talking to its
//! ControlPort. Tor itself is treated as a black box.

pub mod control;
pub mod daemon;
pub mod launcher;
pub mod progress;
pub mod torrc;

pub use control::{ControlChannel, HiddenServiceConfig, TorController};
pub use daemon::DaemonHandle;
pub use launcher::{DaemonLauncher, TorLauncher, DAEMON_SUPPORTED};
pub use progress::{BootstrapProgress, LogProgress, ProgressSink};
pub use torrc::DaemonConfig;
