//! crates/vet_consult_core/src/messages.rs
//!
//! The message store: appends to a chat's ordered log and relays system
//! messages to the chat's room. Appends go through the repository's guarded
//! append, so the participant/status checks and the write are one step.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::advisory::AdvisoryBridge;
use crate::background::BackgroundTasks;
use crate::domain::{Chat, Message};
use crate::ports::{AppendGuard, Broadcaster, ChatRepository, PortResult, ProfileDirectory};
use crate::view::{chat_view_without_messages, message_view, ParticipantNames};

pub struct MessageStore {
    chats: Arc<dyn ChatRepository>,
    profiles: Arc<dyn ProfileDirectory>,
    broadcaster: Arc<dyn Broadcaster>,
    advisory: AdvisoryBridge,
    tasks: BackgroundTasks,
}

impl MessageStore {
    pub fn new(
        chats: Arc<dyn ChatRepository>,
        profiles: Arc<dyn ProfileDirectory>,
        broadcaster: Arc<dyn Broadcaster>,
        advisory: AdvisoryBridge,
        tasks: BackgroundTasks,
    ) -> Self {
        Self {
            chats,
            profiles,
            broadcaster,
            advisory,
            tasks,
        }
    }

    /// Appends a participant-authored message.
    ///
    /// Fails with `NotFound` for an unknown chat, `Forbidden` when the author is
    /// not a participant and `InvalidState` when the chat is closed. The first
    /// participant message of a chat still waiting for a responder schedules a
    /// summary so the open-chat list shows a topic early.
    pub async fn append_message(&self, chat_id: Uuid, author_id: Uuid, text: &str) -> PortResult<Message> {
        let message = Message::from_participant(author_id, text);
        let receipt = self
            .chats
            .append_message(chat_id, message.clone(), AppendGuard::Participant(author_id))
            .await?;

        if receipt.chat.participants.len() == 1 && receipt.participant_message_count == 1 {
            info!(chat_id = %chat_id, "First message in an unassigned chat; scheduling summary.");
            self.schedule_summary(chat_id);
        }
        Ok(message)
    }

    /// Appends a system message and relays it, with the refreshed chat
    /// metadata, to everyone joined to the chat's room. Only the chat must exist.
    /// The returned chat carries metadata only, not the message log.
    pub async fn append_system_message(&self, chat_id: Uuid, text: &str) -> PortResult<Chat> {
        let message = Message::system(text);
        let chat = self
            .chats
            .append_message(chat_id, message.clone(), AppendGuard::System)
            .await?
            .chat;

        let names = ParticipantNames::resolve(self.profiles.as_ref(), &chat.participants).await;
        self.broadcaster
            .broadcast_message(
                chat_id,
                message_view(&message),
                Some(chat_view_without_messages(&chat, &names)),
                None,
            )
            .await;
        Ok(chat)
    }

    /// Regenerates the chat's summary in the background. Failure leaves the
    /// summary fields untouched.
    pub fn schedule_summary(&self, chat_id: Uuid) {
        let chats = self.chats.clone();
        let advisory = self.advisory.clone();
        self.tasks.spawn("chat-summary", async move {
            let chat = chats.get_chat(chat_id).await?;
            let summary = advisory.summarize(&chat).await?;
            chats.set_summary(chat_id, &summary).await?;
            info!(chat_id = %chat_id, "Chat summary updated.");
            Ok(())
        });
    }
}
