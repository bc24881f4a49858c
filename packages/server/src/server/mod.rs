//! WebSocket relay server implementation.

mod connection;
mod handler;
mod runner;
mod signal;
mod state;

pub use runner::{app, run_server};
pub use state::{AppState, ConnectionTimeouts, DEFAULT_ROOM};
