//! WebSocket upgrade and HTTP handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State, ws::WebSocketUpgrade},
    response::IntoResponse,
};

use super::connection::handle_socket;
use super::state::{AppState, ConnectQuery, DEFAULT_ROOM};

/// Accept a WebSocket upgrade and hand the socket to the connection
/// lifecycle. The room key comes from the `room` query parameter.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> impl IntoResponse {
    let room_key = query.room.unwrap_or_else(|| DEFAULT_ROOM.to_owned());
    ws.on_upgrade(move |socket| handle_socket(socket, state, room_key))
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}
