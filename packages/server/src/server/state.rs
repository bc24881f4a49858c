//! Server state and connection configuration.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::registry::RoomRegistry;
use crate::router::MessageRouter;

/// Room key used when the upgrade request names none.
pub const DEFAULT_ROOM: &str = "default";

/// Query parameters for the WebSocket upgrade request.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    /// Target room key; connections without one land in [`DEFAULT_ROOM`].
    pub room: Option<String>,
}

/// Wall-clock bounds for a single connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionTimeouts {
    /// Deadline for a pending client to send `my_name_is`.
    pub handshake: Duration,
    /// Interval between liveness checks in the steady-state loop.
    pub ping_interval: Duration,
    /// Traffic silence after which a connected client is dropped. Checked
    /// only when a full ping interval elapses without traffic, so an idle
    /// client is detected somewhere between `idle` and
    /// `idle + ping_interval` after its last message.
    pub idle: Duration,
}

impl Default for ConnectionTimeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(5),
            ping_interval: Duration::from_secs(10),
            idle: Duration::from_secs(30),
        }
    }
}

/// Shared application state.
pub struct AppState {
    /// Per-room client collections.
    pub registry: Arc<RoomRegistry>,
    /// Envelope building and delivery.
    pub router: MessageRouter,
    /// Timeout policy applied to every connection.
    pub timeouts: ConnectionTimeouts,
}

impl AppState {
    pub fn new(timeouts: ConnectionTimeouts) -> Self {
        let registry = Arc::new(RoomRegistry::new());
        let router = MessageRouter::new(registry.clone());
        Self {
            registry,
            router,
            timeouts,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(ConnectionTimeouts::default())
    }
}
