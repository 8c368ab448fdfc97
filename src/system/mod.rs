//! # System Interaction Layer
//!
//! Abstractions over the operating system: processes, terminals, sockets and
//! the desktop. Core logic reaches the outside world only through here.
//!
//! ## Modules
//!
//! - **`executor`**: spawns external programs in the project directory, with
//!   output capture and `Ctrl+C` cancellation.
//! - **`dev_server`**: runs a framework dev server as a child process and
//!   waits for it to accept connections.
//! - **`broadcast`**: announces the dev server over UDP broadcast.
//! - **`browser`**: opens URLs in the user's browser.
//! - **`prompt`**: interactive questions with non-interactive fallbacks.
//! - **`terminal`**: TTY and CI detection.
//! - **`logger`**: installs the `env_logger` backend at the right level.

pub mod broadcast;
pub mod browser;
pub mod dev_server;
pub mod executor;
pub mod logger;
pub mod prompt;
pub mod terminal;
