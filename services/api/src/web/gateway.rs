//! services/api/src/web/gateway.rs
//!
//! Event handling for one authenticated live connection, kept apart from the
//! socket plumbing in `ws_handler` so it can be driven directly in tests.
//! Per-event failures become `errorEvent` frames; nothing here closes the
//! connection.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use vet_consult_core::domain::SessionUser;
use vet_consult_core::ports::{Broadcaster, ChatRepository, PortError};
use vet_consult_core::view::message_view;
use vet_consult_core::MessageStore;

use crate::web::protocol::{ClientMessage, SendMessagePayload, ServerMessage};
use crate::web::rooms::RoomHub;

const CHAT_NOT_FOUND: &str = "Chat not found";
const NOT_A_PARTICIPANT: &str = "User not part of the chat";
const CHAT_CLOSED: &str = "Chat is closed, you cannot send messages";

pub struct GatewaySession {
    connection_id: Uuid,
    user: SessionUser,
    hub: Arc<RoomHub>,
    chats: Arc<dyn ChatRepository>,
    messages: Arc<MessageStore>,
}

impl GatewaySession {
    pub fn new(
        connection_id: Uuid,
        user: SessionUser,
        hub: Arc<RoomHub>,
        chats: Arc<dyn ChatRepository>,
        messages: Arc<MessageStore>,
    ) -> Self {
        Self {
            connection_id,
            user,
            hub,
            chats,
            messages,
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Handles one text frame from the client.
    pub async fn handle_text(&self, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::JoinChat(chat_id)) => self.join_chat(chat_id).await,
            Ok(ClientMessage::SendMessage(payload)) => self.send_message(payload).await,
            Err(e) => {
                warn!(connection_id = %self.connection_id, "Failed to deserialize client message: {}", e);
                self.reply_error("Malformed event");
            }
        }
    }

    async fn join_chat(&self, chat_id: Uuid) {
        let chat = match self.chats.get_chat(chat_id).await {
            Ok(chat) => chat,
            Err(PortError::NotFound(_)) => return self.reply_error(CHAT_NOT_FOUND),
            Err(e) => {
                warn!(chat_id = %chat_id, "Failed to load chat for join: {}", e);
                return self.reply_error("Failed to join chat");
            }
        };
        if !chat.has_participant(self.user.user_id) {
            return self.reply_error(NOT_A_PARTICIPANT);
        }
        self.hub.join(chat_id, self.connection_id);
        info!(chat_id = %chat_id, user_id = %self.user.user_id, "User joined chat room.");
    }

    async fn send_message(&self, payload: SendMessagePayload) {
        let chat_id = payload.chat_id;
        let appended = self
            .messages
            .append_message(chat_id, self.user.user_id, &payload.message_text)
            .await;

        let message = match appended {
            Ok(message) => message,
            Err(e) => {
                let reply = match e {
                    PortError::NotFound(_) => CHAT_NOT_FOUND,
                    PortError::Forbidden(_) => NOT_A_PARTICIPANT,
                    PortError::InvalidState(_) => CHAT_CLOSED,
                    other => {
                        warn!(chat_id = %chat_id, "Failed to append message: {}", other);
                        "Failed to send message"
                    }
                };
                return self.reply_error(reply);
            }
        };

        // The sender already shows its own message.
        self.hub
            .broadcast_message(chat_id, message_view(&message), None, Some(self.connection_id))
            .await;
    }

    fn reply_error(&self, message: &str) {
        self.hub.send_to(self.connection_id, &ServerMessage::error(message));
    }
}
