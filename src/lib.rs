//! oonib library crate
//!
//! Bootstraps the network side of an oonib backend: an optional Tor
//! daemon, hidden services or plain listeners for the collector and
//! bouncer, and the cleanup that undoes all of it.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface (run, check)
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Launch, bind and cleanup errors
//! - [`hidden_service`] - Hidden service key directories and bindings
//! - [`lifecycle`] - PID file and stop signals
//! - [`listener`] - TCP accept loops, local fallback listeners
//! - [`orchestrator`] - Startup sequencing and ordered shutdown
//! - [`service`] - The service abstraction and a status responder
//! - [`tor`] - Daemon launch, bootstrap progress, control port
//! - [`workspace`] - Temporary daemon data directory

// Allow common stylistic patterns.
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::use_self)]
#![allow(clippy::significant_drop_tightening)] // Lock scope is intentional
#![allow(clippy::single_match_else)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_debug_formatting)]
#![allow(clippy::new_without_default)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::too_many_lines)]

pub mod cli;
pub mod config;
pub mod error;
pub mod hidden_service;
pub mod lifecycle;
pub mod listener;
pub mod logging;
pub mod orchestrator;
pub mod service;
pub mod tor;
pub mod workspace;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
