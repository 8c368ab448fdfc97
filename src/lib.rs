//! # ionic
//!
//! Command-line runtime for Ionic apps. Every invocation builds a
//! [`core::environment::CommandEnvironment`] (configuration, session, shell,
//! progress reporting) and dispatches a command against it. The `serve`
//! command drives a local dev server plus its satellites: browser launch and
//! UDP broadcast of the server address.

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;

/// Process-wide cancellation: the Ctrl+C hook cancels it, and long-running
/// work (subprocesses, the serve session) races against it.
pub use tokio_util::sync::CancellationToken;
