//! Per-room client registry.
//!
//! Each room keeps two disjoint collections: *pending* clients that have
//! connected but not completed the handshake, and *connected* clients
//! that are eligible for broadcast and lookup. Every operation takes the
//! registry mutex for its whole duration, so membership changes are
//! atomic with respect to one another even though every connection task
//! in a room mutates the same maps.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

/// One outbound frame queued for a client's socket.
///
/// `Close` is only ever queued by the lifecycle task that owns the
/// connection; everything else goes out as `Text`.
#[derive(Debug)]
pub enum OutboundFrame {
    Text(String),
    Close { code: u16, reason: String },
}

/// Write handle for a client's outbound channel.
///
/// The channel is drained by a per-connection forwarding task that owns
/// the WebSocket sink, so concurrent senders never touch the socket
/// directly.
pub type ClientSender = mpsc::UnboundedSender<OutboundFrame>;

/// A client as stored in the registry.
///
/// The registry holds only this non-owning handle; the WebSocket itself
/// is owned by the connection task driving the client.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    /// Server-generated id, immutable for the connection's lifetime.
    pub id: String,
    /// Display name; empty until the handshake completes.
    pub name: String,
    /// Outbound channel for this client.
    pub sender: ClientSender,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("client '{client_id}' is already registered in room '{room}'")]
    DuplicateClient { room: String, client_id: String },
    #[error("client '{client_id}' is not pending in room '{room}'")]
    NotPending { room: String, client_id: String },
}

#[derive(Debug, Default)]
struct RoomState {
    pending: HashMap<String, ClientHandle>,
    connected: HashMap<String, ClientHandle>,
}

/// Registry of all rooms and their client collections.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, RoomState>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotently create empty collections for a room key.
    pub async fn ensure_room(&self, room: &str) {
        let mut rooms = self.rooms.lock().await;
        rooms.entry(room.to_owned()).or_default();
    }

    /// Register a freshly accepted client as pending.
    ///
    /// Fails with [`RegistryError::DuplicateClient`] if the id already
    /// exists in either collection of the room. Ids are server-generated,
    /// so a duplicate indicates a server-internal bug, but it is checked
    /// regardless.
    pub async fn add_pending(&self, room: &str, handle: ClientHandle) -> Result<(), RegistryError> {
        let mut rooms = self.rooms.lock().await;
        let state = rooms.entry(room.to_owned()).or_default();
        if state.pending.contains_key(&handle.id) || state.connected.contains_key(&handle.id) {
            return Err(RegistryError::DuplicateClient {
                room: room.to_owned(),
                client_id: handle.id,
            });
        }
        state.pending.insert(handle.id.clone(), handle);
        Ok(())
    }

    /// Atomically move a client from pending to connected.
    ///
    /// The passed handle carries the display name learned during the
    /// handshake and replaces the pending entry. Fails with
    /// [`RegistryError::NotPending`] if the id is absent from pending.
    pub async fn promote(&self, room: &str, handle: ClientHandle) -> Result<(), RegistryError> {
        let mut rooms = self.rooms.lock().await;
        let state = rooms
            .get_mut(room)
            .ok_or_else(|| RegistryError::NotPending {
                room: room.to_owned(),
                client_id: handle.id.clone(),
            })?;
        if state.pending.remove(&handle.id).is_none() {
            return Err(RegistryError::NotPending {
                room: room.to_owned(),
                client_id: handle.id,
            });
        }
        state.connected.insert(handle.id.clone(), handle);
        Ok(())
    }

    /// Remove a client from whichever collection contains it.
    ///
    /// Removal of an absent id (or an unknown room) is a no-op: the
    /// timeout path and the disconnect path may race to clean up the
    /// same client, and whoever loses must not fail.
    pub async fn remove(&self, room: &str, client_id: &str) {
        let mut rooms = self.rooms.lock().await;
        if let Some(state) = rooms.get_mut(room) {
            state.pending.remove(client_id);
            state.connected.remove(client_id);
        }
    }

    /// Snapshot of the connected clients whose outbound channel is still
    /// open. Empty for unknown rooms.
    ///
    /// Callers iterate while sending, which may race with removals from
    /// other connection tasks, so this hands back an isolated copy
    /// rather than a live view.
    pub async fn list_connected(&self, room: &str) -> Vec<ClientHandle> {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room)
            .map(|state| {
                state
                    .connected
                    .values()
                    .filter(|handle| !handle.sender.is_closed())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Look up a connected client by id. Pending clients are not
    /// queryable.
    pub async fn lookup(&self, room: &str, client_id: &str) -> Option<ClientHandle> {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room)
            .and_then(|state| state.connected.get(client_id))
            .cloned()
    }
}
