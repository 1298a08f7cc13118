//! Process lifecycle: PID file and stop signals

pub mod pidfile;
pub mod signal;

pub use pidfile::PidFile;
pub use signal::StopSignals;
