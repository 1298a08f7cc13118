//! Tor hidden service bindings
//!
//! Each service gets its own key directory and a loopback listener; the
//! daemon is then told to forward a public port to that listener.

pub mod binder;
pub mod descriptor;

pub use binder::{HiddenServiceBinder, PendingBinding};
pub use descriptor::HiddenServiceDescriptor;
