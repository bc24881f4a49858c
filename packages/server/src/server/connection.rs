//! Per-connection lifecycle: handshake, steady-state relay, teardown.
//!
//! Each accepted socket is driven by one task through the states
//! Accepted -> Handshaking -> Connected -> Closing -> Closed. A second
//! task owns the WebSocket sink and drains the client's outbound
//! channel, so broadcasts from other connections never write to the
//! socket directly.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::protocol::{
    Incoming, MessageType, Player, PlayerJoinedMessage, PlayerLeftMessage, decode,
};
use crate::registry::{ClientHandle, ClientSender, OutboundFrame};

use super::state::AppState;

/// WebSocket close code for a policy violation (RFC 6455, section 7.4.1).
const POLICY_VIOLATION: u16 = 1008;
/// WebSocket close code for a normal closure.
const NORMAL_CLOSURE: u16 = 1000;

const HANDSHAKE_TIMEOUT_REASON: &str = "Timeout waiting for player-info";

/// Drive one client connection from accept to teardown.
pub(super) async fn handle_socket(socket: WebSocket, state: Arc<AppState>, room_key: String) {
    // Hyphenless uuid, the same shape clients already parse.
    let client_id = Uuid::new_v4().simple().to_string();
    let (ws_tx, mut ws_rx) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();

    state.registry.ensure_room(&room_key).await;
    let pending = ClientHandle {
        id: client_id.clone(),
        name: String::new(),
        sender: tx.clone(),
    };
    if let Err(e) = state.registry.add_pending(&room_key, pending).await {
        // Server-generated ids colliding means an internal bug; drop this
        // connection and leave the rest of the room alone.
        tracing::error!("[{}] refusing connection: {}", room_key, e);
        return;
    }

    let send_task = tokio::spawn(forward_outbound(ws_tx, rx));

    state.router.send_welcome(&room_key, &tx, &client_id).await;
    tracing::info!("[{}] pending client {} connecting", room_key, client_id);

    // Handshaking: the client must name itself before the deadline. A
    // client that fails here was never announced, so it leaves silently.
    let Some(name) = await_handshake(&mut ws_rx, &state, &room_key, &client_id, &tx).await else {
        state.registry.remove(&room_key, &client_id).await;
        drop(tx);
        let _ = send_task.await;
        return;
    };

    let connected = ClientHandle {
        id: client_id.clone(),
        name: name.clone(),
        sender: tx.clone(),
    };
    if let Err(e) = state.registry.promote(&room_key, connected).await {
        tracing::error!("[{}] failed to promote client {}: {}", room_key, client_id, e);
        state.registry.remove(&room_key, &client_id).await;
        drop(tx);
        let _ = send_task.await;
        return;
    }

    let joined = PlayerJoinedMessage {
        r#type: MessageType::PlayerJoined,
        client_id: client_id.clone(),
        player: Player {
            id: client_id.clone(),
            name: name.clone(),
        },
    };
    state.router.broadcast(&room_key, &joined, Some(&client_id)).await;
    tracing::info!("[{}] {} joined as '{}'", room_key, client_id, name);

    relay_messages(&mut ws_rx, &state, &room_key, &client_id, &tx).await;

    // Closing: remove first so the departing client is excluded from the
    // player_left broadcast, then let the forwarding task drain out.
    state.registry.remove(&room_key, &client_id).await;
    let _ = tx.send(OutboundFrame::Close {
        code: NORMAL_CLOSURE,
        reason: "Closed".to_owned(),
    });
    drop(tx);

    let left = PlayerLeftMessage {
        r#type: MessageType::PlayerLeft,
        client_id: client_id.clone(),
    };
    state.router.broadcast(&room_key, &left, None).await;
    tracing::info!("[{}] client {} disconnected", room_key, client_id);

    let _ = send_task.await;
}

/// Forward queued outbound frames to the WebSocket sink.
///
/// Ends when the channel closes (all handles dropped) or a `Close` frame
/// goes out; dropping the sink finishes the close handshake.
async fn forward_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<OutboundFrame>,
) {
    while let Some(frame) = rx.recv().await {
        match frame {
            OutboundFrame::Text(text) => {
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            OutboundFrame::Close { code, reason } => {
                let _ = sink
                    .send(Message::Close(Some(CloseFrame {
                        code,
                        reason: reason.into(),
                    })))
                    .await;
                break;
            }
        }
    }
}

/// Wait for a valid `my_name_is` within the handshake deadline.
///
/// Returns the announced display name, or `None` if the connection is
/// over (timeout, peer close, or read error). Anything other than a
/// valid `my_name_is` during this window is ignored without re-arming
/// the deadline.
async fn await_handshake(
    ws_rx: &mut SplitStream<WebSocket>,
    state: &Arc<AppState>,
    room_key: &str,
    client_id: &str,
    tx: &ClientSender,
) -> Option<String> {
    let deadline = Instant::now() + state.timeouts.handshake;
    loop {
        let frame = match tokio::time::timeout_at(deadline, ws_rx.next()).await {
            Err(_) => {
                tracing::info!("[{}] client {} handshake timed out", room_key, client_id);
                let _ = tx.send(OutboundFrame::Close {
                    code: POLICY_VIOLATION,
                    reason: HANDSHAKE_TIMEOUT_REASON.to_owned(),
                });
                return None;
            }
            Ok(None) => return None,
            Ok(Some(Err(e))) => {
                tracing::warn!(
                    "[{}] socket error for pending client {}: {}",
                    room_key,
                    client_id,
                    e
                );
                return None;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => return None,
            _ => continue,
        };

        match decode(text.as_str()) {
            Ok(Incoming::MyNameIs { name }) => return Some(name),
            // Everything else is ignored until the deadline.
            Ok(_) | Err(_) => continue,
        }
    }
}

/// Steady-state loop: race each read against the ping interval, relay
/// messages, and drop the connection when the idle threshold is crossed.
async fn relay_messages(
    ws_rx: &mut SplitStream<WebSocket>,
    state: &Arc<AppState>,
    room_key: &str,
    client_id: &str,
    tx: &ClientSender,
) {
    let mut last_activity = Instant::now();
    loop {
        let frame = match tokio::time::timeout(state.timeouts.ping_interval, ws_rx.next()).await {
            Err(_) => {
                // No traffic this interval; only now is the idle
                // threshold consulted.
                if last_activity.elapsed() > state.timeouts.idle {
                    tracing::info!("[{}] client {} timed out", room_key, client_id);
                    return;
                }
                continue;
            }
            Ok(None) => return,
            Ok(Some(Err(e))) => {
                tracing::warn!("[{}] socket error for client {}: {}", room_key, client_id, e);
                return;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        // Any inbound frame counts as liveness, not just text.
        last_activity = Instant::now();

        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => {
                tracing::info!("[{}] client {} requested close", room_key, client_id);
                return;
            }
            _ => continue,
        };

        tracing::debug!("[{}] {}: {}", room_key, client_id, text.as_str());

        match decode(text.as_str()) {
            Ok(Incoming::WhoIs { query_client_id }) => {
                // Directed reply to the requester only; unknown ids are
                // dropped without a reply.
                if let Some(target) = state.registry.lookup(room_key, &query_client_id).await {
                    let reply = PlayerJoinedMessage {
                        r#type: MessageType::PlayerJoined,
                        client_id: query_client_id,
                        player: Player {
                            id: target.id,
                            name: target.name,
                        },
                    };
                    state.router.send(tx, &reply);
                }
            }
            Ok(Incoming::MyNameIs { .. }) | Ok(Incoming::Opaque) => {
                // Relay the original frame verbatim so unrecognized
                // fields survive.
                state
                    .router
                    .broadcast_raw(room_key, text.as_str(), Some(client_id))
                    .await;
            }
            Err(e) => {
                tracing::debug!(
                    "[{}] ignoring malformed frame from {}: {}",
                    room_key,
                    client_id,
                    e
                );
            }
        }
    }
}
