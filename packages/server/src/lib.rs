//! Zashiki: a WebSocket relay that groups clients into named rooms.
//!
//! Clients connect to `/ws?room=<key>`, announce a display name within a
//! short handshake window, receive the room roster, and exchange typed
//! JSON messages with the rest of the room until they disconnect.

pub mod protocol;
pub mod registry;
pub mod router;
pub mod server;
