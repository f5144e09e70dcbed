//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for live consultations. Every frame is a JSON text frame of the form
//! `{"event": "<name>", "data": <payload>}`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vet_consult_core::view::{ChatView, MessageView};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Subscribes the connection to a chat's room.
    JoinChat(Uuid),

    /// Appends a message and relays it to the rest of the room.
    SendMessage(SendMessagePayload),
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct SendMessagePayload {
    #[serde(rename = "chatID")]
    pub chat_id: Uuid,
    #[serde(rename = "messageText")]
    pub message_text: String,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// A new message in a joined chat. `chat` is present when the chat's
    /// metadata changed along with it (assignment, closure).
    ReceiveMessage(ReceivedMessage),

    /// A non-fatal failure of one client event. The connection stays open.
    ErrorEvent(String),
}

#[derive(Serialize, Debug, Clone)]
pub struct ReceivedMessage {
    pub message: MessageView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<ChatView>,
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::ErrorEvent(message.into())
    }

    pub fn to_json(&self) -> String {
        // Serializing these plain structs cannot fail; fall back to a bare error frame anyway.
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"event":"errorEvent","data":"Internal error"}"#.to_string())
    }
}
