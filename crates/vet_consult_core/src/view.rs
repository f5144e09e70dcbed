//! crates/vet_consult_core/src/view.rs
//!
//! Pure projections of a `Chat` into the shapes clients and the AI bridge see.
//! Nothing here touches storage; participant names are resolved once per chat
//! and handed in as a `ParticipantNames` value.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{Chat, ChatStatus, Message, SYSTEM_AUTHOR, UNKNOWN_PARTICIPANT};
use crate::ports::ProfileDirectory;

//=========================================================================================
// Client Views
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantView {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub message_text: String,
    /// The author's user id, or `"system"`.
    pub send_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    pub id: Uuid,
    pub participants: Vec<ParticipantView>,
    pub chat_status: ChatStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_messages: Option<Vec<MessageView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_summary_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_summary_text: Option<String>,
    pub created_date: DateTime<Utc>,
}

//=========================================================================================
// Participant Name Resolution
//=========================================================================================

/// Display names of one chat's participants, resolved once and reused.
#[derive(Debug, Clone, Default)]
pub struct ParticipantNames {
    names: HashMap<Uuid, String>,
}

impl ParticipantNames {
    pub fn new(names: HashMap<Uuid, String>) -> Self {
        Self { names }
    }

    /// Looks up every participant in the directory. A failed lookup degrades
    /// to placeholder names instead of failing the caller.
    pub async fn resolve(directory: &dyn ProfileDirectory, participants: &[Uuid]) -> Self {
        match directory.display_names(participants).await {
            Ok(names) => Self { names },
            Err(e) => {
                warn!("Failed to resolve participant names: {}", e);
                Self::default()
            }
        }
    }

    pub fn name_of(&self, user_id: Uuid) -> &str {
        self.names
            .get(&user_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_PARTICIPANT)
    }
}

//=========================================================================================
// Projections
//=========================================================================================

pub fn message_view(message: &Message) -> MessageView {
    let send_by = match (message.is_system_message, message.author_id) {
        (false, Some(author)) => author.to_string(),
        _ => SYSTEM_AUTHOR.to_string(),
    };
    MessageView {
        message_text: message.text.clone(),
        send_by,
    }
}

/// Renders the chat's metadata without message bodies.
pub fn chat_view_without_messages(chat: &Chat, names: &ParticipantNames) -> ChatView {
    ChatView {
        id: chat.id,
        participants: chat
            .participants
            .iter()
            .map(|&id| ParticipantView {
                id,
                name: names.name_of(id).to_string(),
            })
            .collect(),
        chat_status: chat.status,
        chat_messages: None,
        chat_summary_title: chat.summary_title.clone(),
        chat_summary_text: chat.summary_text.clone(),
        created_date: chat.created_at,
    }
}

pub fn chat_view(chat: &Chat, names: &ParticipantNames) -> ChatView {
    ChatView {
        chat_messages: Some(chat.messages.iter().map(message_view).collect()),
        ..chat_view_without_messages(chat, names)
    }
}

//=========================================================================================
// Transcript
//=========================================================================================

/// A human-readable rendering of a chat, one line per message, used as
/// prompt input for the advisory bridge. Iterating is lazy and can be
/// restarted by calling `lines` again.
#[derive(Debug, Clone, Copy)]
pub struct Transcript<'a> {
    chat: &'a Chat,
    names: &'a ParticipantNames,
}

pub fn render_transcript<'a>(chat: &'a Chat, names: &'a ParticipantNames) -> Transcript<'a> {
    Transcript { chat, names }
}

impl<'a> Transcript<'a> {
    pub fn lines(&self) -> impl Iterator<Item = String> + 'a {
        let names = self.names;
        self.chat.messages.iter().map(move |message| {
            let sender = match (message.is_system_message, message.author_id) {
                (false, Some(author)) => names.name_of(author),
                _ => SYSTEM_AUTHOR,
            };
            format!("{}: \"{}\"", sender, message.text)
        })
    }

    pub fn to_text(&self) -> String {
        if self.chat.messages.is_empty() {
            return format!("Chat {} has no messages.", self.chat.id);
        }
        self.lines().collect::<Vec<_>>().join("\n")
    }
}
