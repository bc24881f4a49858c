//! Message routing: directed sends and room broadcasts.
//!
//! The router owns JSON serialization of outbound envelopes and the
//! delivery policy. Delivery failures are reported as booleans and never
//! propagated: a single dead peer must not abort a broadcast to the rest
//! of the room.

use std::sync::Arc;

use serde::Serialize;

use crate::protocol::{MessageType, Player, WelcomeMessage};
use crate::registry::{ClientSender, OutboundFrame, RoomRegistry};

/// Builds outbound envelopes and delivers them via registry lookups.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    registry: Arc<RoomRegistry>,
}

impl MessageRouter {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// Serialize and queue one envelope for one client.
    ///
    /// Returns `false` on serialization failure or if the client's
    /// channel is closed.
    pub fn send<T: Serialize>(&self, sender: &ClientSender, envelope: &T) -> bool {
        match serde_json::to_string(envelope) {
            Ok(json) => self.send_raw(sender, json),
            Err(e) => {
                tracing::error!("Failed to serialize outbound envelope: {}", e);
                false
            }
        }
    }

    /// Queue an already-serialized frame for one client.
    pub fn send_raw(&self, sender: &ClientSender, text: String) -> bool {
        sender.send(OutboundFrame::Text(text)).is_ok()
    }

    /// Send the `welcome` envelope to a newly accepted client.
    ///
    /// The roster is the room's connected set at this moment; the new
    /// client itself is still pending and therefore not listed.
    pub async fn send_welcome(&self, room: &str, sender: &ClientSender, client_id: &str) -> bool {
        let users: Vec<Player> = self
            .registry
            .list_connected(room)
            .await
            .into_iter()
            .map(|handle| Player {
                id: handle.id,
                name: handle.name,
            })
            .collect();

        let welcome = WelcomeMessage {
            r#type: MessageType::Welcome,
            client_id: client_id.to_owned(),
            users,
        };
        self.send(sender, &welcome)
    }

    /// Broadcast an envelope to every connected member of a room,
    /// optionally excluding one client id.
    pub async fn broadcast<T: Serialize>(&self, room: &str, envelope: &T, exclude: Option<&str>) {
        match serde_json::to_string(envelope) {
            Ok(json) => self.broadcast_raw(room, &json, exclude).await,
            Err(e) => tracing::error!("Failed to serialize broadcast envelope: {}", e),
        }
    }

    /// Broadcast an already-serialized frame to a room.
    ///
    /// Works off a registry snapshot; each recipient is attempted
    /// independently, so one failed delivery never skips the rest.
    pub async fn broadcast_raw(&self, room: &str, text: &str, exclude: Option<&str>) {
        for handle in self.registry.list_connected(room).await {
            if exclude == Some(handle.id.as_str()) {
                continue;
            }
            if !self.send_raw(&handle.sender, text.to_owned()) {
                tracing::warn!(
                    "Failed to deliver message to client '{}' in room '{}'",
                    handle.id,
                    room
                );
            }
        }
    }
}
