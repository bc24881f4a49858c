//! Wire-level message schema for the relay protocol.
//!
//! Every frame is a single JSON object with a string `type` field.
//! Outbound envelopes are built server-side from the structs below.
//! Inbound text is decoded into the closed set of recognized variants
//! plus an opaque catch-all; opaque frames are rebroadcast verbatim so
//! that fields the server does not understand survive the relay.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message type discriminant carried in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Welcome,
    MyNameIs,
    WhoIs,
    PlayerJoined,
    PlayerLeft,
}

/// Roster entry: a connected client as seen by its peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
}

/// `welcome` (server -> new client): the roster of currently connected
/// clients, plus the id the server assigned to the recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeMessage {
    pub r#type: MessageType,
    pub client_id: String,
    pub users: Vec<Player>,
}

/// `player_joined` (server -> room): a client completed the handshake.
/// The same shape is used for the directed reply to a `who_is` query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoinedMessage {
    pub r#type: MessageType,
    pub client_id: String,
    pub player: Player,
}

/// `player_left` (server -> room): a client disconnected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLeftMessage {
    pub r#type: MessageType,
    pub client_id: String,
}

#[derive(Debug, Deserialize)]
struct MyNameIsPayload {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WhoIsPayload {
    query_client_id: String,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// Handshake: the client announces its display name.
    MyNameIs { name: String },
    /// Directed query for another client's display name.
    WhoIs { query_client_id: String },
    /// Well-formed JSON with a `type` the server does not handle itself;
    /// relayed to the room without interpretation.
    Opaque,
}

/// Errors produced while decoding an inbound frame.
///
/// These are always recovered locally by ignoring the frame; they are
/// never surfaced to the peer.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame is not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error("frame has no string `type` field")]
    MissingType,
}

/// Decode one inbound text frame.
///
/// Recognized `type` values map to their typed variant; any other value
/// is [`Incoming::Opaque`]. A recognized type with a missing required
/// field is malformed, not opaque.
pub fn decode(text: &str) -> Result<Incoming, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(ProtocolError::MissingType)?
        .to_owned();

    match kind.as_str() {
        "my_name_is" => {
            let payload: MyNameIsPayload = serde_json::from_value(value)?;
            Ok(Incoming::MyNameIs { name: payload.name })
        }
        "who_is" => {
            let payload: WhoIsPayload = serde_json::from_value(value)?;
            Ok(Incoming::WhoIs {
                query_client_id: payload.query_client_id,
            })
        }
        _ => Ok(Incoming::Opaque),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_my_name_is() {
        // given (前提条件):
        let text = r#"{"type":"my_name_is","name":"Alice"}"#;

        // when (操作):
        let result = decode(text).unwrap();

        // then (期待する結果):
        assert_eq!(
            result,
            Incoming::MyNameIs {
                name: "Alice".to_string()
            }
        );
    }

    #[test]
    fn test_decode_my_name_is_ignores_extra_fields() {
        // given (前提条件):
        let text = r#"{"type":"my_name_is","name":"Alice","clientId":"abc","color":"red"}"#;

        // when (操作):
        let result = decode(text).unwrap();

        // then (期待する結果):
        assert_eq!(
            result,
            Incoming::MyNameIs {
                name: "Alice".to_string()
            }
        );
    }

    #[test]
    fn test_decode_who_is() {
        // given (前提条件):
        let text = r#"{"type":"who_is","queryClientId":"abc123"}"#;

        // when (操作):
        let result = decode(text).unwrap();

        // then (期待する結果):
        assert_eq!(
            result,
            Incoming::WhoIs {
                query_client_id: "abc123".to_string()
            }
        );
    }

    #[test]
    fn test_decode_unrecognized_type_is_opaque() {
        // given (前提条件):
        let text = r#"{"type":"game_state","clientId":"abc","position":{"x":1,"y":2}}"#;

        // when (操作):
        let result = decode(text).unwrap();

        // then (期待する結果):
        assert_eq!(result, Incoming::Opaque);
    }

    #[test]
    fn test_decode_server_only_type_is_opaque() {
        // Clients echoing server envelopes are relayed, not interpreted.
        // given (前提条件):
        let text = r#"{"type":"player_joined","clientId":"abc","player":{"id":"abc","name":"x"}}"#;

        // when (操作):
        let result = decode(text).unwrap();

        // then (期待する結果):
        assert_eq!(result, Incoming::Opaque);
    }

    #[test]
    fn test_decode_invalid_json_is_malformed() {
        // given (前提条件):
        let text = "{not json at all";

        // when (操作):
        let result = decode(text);

        // then (期待する結果):
        assert!(matches!(result, Err(ProtocolError::MalformedJson(_))));
    }

    #[test]
    fn test_decode_missing_type_field() {
        // given (前提条件):
        let text = r#"{"name":"Alice"}"#;

        // when (操作):
        let result = decode(text);

        // then (期待する結果):
        assert!(matches!(result, Err(ProtocolError::MissingType)));
    }

    #[test]
    fn test_decode_non_string_type_field() {
        // given (前提条件):
        let text = r#"{"type":42,"name":"Alice"}"#;

        // when (操作):
        let result = decode(text);

        // then (期待する結果):
        assert!(matches!(result, Err(ProtocolError::MissingType)));
    }

    #[test]
    fn test_decode_my_name_is_without_name_is_malformed() {
        // given (前提条件):
        let text = r#"{"type":"my_name_is"}"#;

        // when (操作):
        let result = decode(text);

        // then (期待する結果):
        assert!(matches!(result, Err(ProtocolError::MalformedJson(_))));
    }

    #[test]
    fn test_message_type_wire_names() {
        // The decode table above matches on raw strings; keep them in
        // sync with the serde representation of MessageType.
        assert_eq!(
            serde_json::to_value(MessageType::MyNameIs).unwrap(),
            "my_name_is"
        );
        assert_eq!(serde_json::to_value(MessageType::WhoIs).unwrap(), "who_is");
        assert_eq!(
            serde_json::to_value(MessageType::Welcome).unwrap(),
            "welcome"
        );
        assert_eq!(
            serde_json::to_value(MessageType::PlayerJoined).unwrap(),
            "player_joined"
        );
        assert_eq!(
            serde_json::to_value(MessageType::PlayerLeft).unwrap(),
            "player_left"
        );
    }

    #[test]
    fn test_welcome_serializes_with_camel_case_fields() {
        // given (前提条件):
        let msg = WelcomeMessage {
            r#type: MessageType::Welcome,
            client_id: "abc".to_string(),
            users: vec![Player {
                id: "def".to_string(),
                name: "Alice".to_string(),
            }],
        };

        // when (操作):
        let value = serde_json::to_value(&msg).unwrap();

        // then (期待する結果):
        assert_eq!(value["type"], "welcome");
        assert_eq!(value["clientId"], "abc");
        assert_eq!(value["users"][0]["id"], "def");
        assert_eq!(value["users"][0]["name"], "Alice");
    }

    #[test]
    fn test_player_joined_serializes_with_nested_player() {
        // given (前提条件):
        let msg = PlayerJoinedMessage {
            r#type: MessageType::PlayerJoined,
            client_id: "abc".to_string(),
            player: Player {
                id: "abc".to_string(),
                name: "Bob".to_string(),
            },
        };

        // when (操作):
        let value = serde_json::to_value(&msg).unwrap();

        // then (期待する結果):
        assert_eq!(value["type"], "player_joined");
        assert_eq!(value["clientId"], "abc");
        assert_eq!(value["player"]["id"], "abc");
        assert_eq!(value["player"]["name"], "Bob");
    }
}
