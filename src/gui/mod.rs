//! Web dashboard: HTTP API, live refresh over WebSocket, and server process tracking.
//!
//! The server and watcher need the `gui` feature; the PID file and wire types
//! are always available so `status` and `stop` work in any build.

pub mod pid_file;
pub mod protocol;
#[cfg(feature = "gui")]
pub mod server;
#[cfg(feature = "gui")]
pub mod watcher;
#[cfg(feature = "gui")]
mod websocket;

pub use pid_file::{ProcessStatus, ServerPidFile, ServerPidInfo, verify_process};
#[cfg(feature = "gui")]
pub use server::{AppState, DEFAULT_PORT, build_router, find_available_port, serve, start_server};
#[cfg(feature = "gui")]
pub use watcher::ChangeNotifier;
