//! crates/vet_consult_core/src/memory.rs
//!
//! An in-process implementation of every storage and collaborator port.
//! Each map sits behind one async mutex, so the conditional transitions are
//! atomic in the same way the database's single-statement updates are.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Chat, ChatStatus, ChatSummary, Message, Presence, Profile, SessionUser};
use crate::ports::{
    AppendGuard, AppendReceipt, ChatRepository, IdentityService, PortError, PortResult,
    PresenceRepository, ProfileDirectory,
};

#[derive(Default)]
pub struct InMemoryStore {
    chats: Mutex<HashMap<Uuid, Chat>>,
    presence: Mutex<HashMap<Uuid, Presence>>,
    profiles: Mutex<HashMap<Uuid, Profile>>,
    sessions: Mutex<HashMap<String, SessionUser>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a profile for `user_id` and returns it.
    pub async fn add_profile(&self, user_id: Uuid, first_name: &str, last_name: &str) -> Profile {
        let profile = Profile {
            id: Uuid::new_v4(),
            user_id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        };
        self.profiles.lock().await.insert(user_id, profile.clone());
        profile
    }

    /// Makes `credential` resolve to `user`.
    pub async fn add_session(&self, credential: &str, user: SessionUser) {
        self.sessions.lock().await.insert(credential.to_string(), user);
    }
}

fn chat_not_found(chat_id: Uuid) -> PortError {
    PortError::NotFound(format!("Chat {} not found", chat_id))
}

//=========================================================================================
// `ChatRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatRepository for InMemoryStore {
    async fn insert_chat(&self, chat: &Chat) -> PortResult<()> {
        let mut chats = self.chats.lock().await;
        if chats.contains_key(&chat.id) {
            return Err(PortError::Unexpected(format!("Chat {} already exists", chat.id)));
        }
        chats.insert(chat.id, chat.clone());
        Ok(())
    }

    async fn get_chat(&self, chat_id: Uuid) -> PortResult<Chat> {
        self.chats
            .lock()
            .await
            .get(&chat_id)
            .cloned()
            .ok_or_else(|| chat_not_found(chat_id))
    }

    async fn find_chats_by_status(&self, status: ChatStatus) -> PortResult<Vec<Chat>> {
        let mut found: Vec<Chat> = self
            .chats
            .lock()
            .await
            .values()
            .filter(|c| c.status == status)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn find_chats_for_participant(
        &self,
        user_id: Uuid,
        status: Option<ChatStatus>,
    ) -> PortResult<Vec<Chat>> {
        let mut found: Vec<Chat> = self
            .chats
            .lock()
            .await
            .values()
            .filter(|c| c.has_participant(user_id))
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn assign_if_open(&self, chat_id: Uuid, responder_id: Uuid) -> PortResult<Chat> {
        let mut chats = self.chats.lock().await;
        let chat = chats.get_mut(&chat_id).ok_or_else(|| chat_not_found(chat_id))?;
        if chat.status != ChatStatus::Open {
            return Err(PortError::InvalidState("Chat is not open".to_string()));
        }
        chat.status = ChatStatus::Ongoing;
        chat.participants.push(responder_id);
        Ok(chat.clone())
    }

    async fn close_if_active(&self, chat_id: Uuid, caller_id: Uuid) -> PortResult<Chat> {
        let mut chats = self.chats.lock().await;
        let chat = chats.get_mut(&chat_id).ok_or_else(|| chat_not_found(chat_id))?;
        if chat.status == ChatStatus::Closed {
            return Err(PortError::InvalidState("Chat is already closed".to_string()));
        }
        if !chat.has_participant(caller_id) {
            return Err(PortError::Forbidden(
                "User does not have access to this chat".to_string(),
            ));
        }
        chat.status = ChatStatus::Closed;
        Ok(chat.clone())
    }

    async fn append_message(
        &self,
        chat_id: Uuid,
        message: Message,
        guard: AppendGuard,
    ) -> PortResult<AppendReceipt> {
        let mut chats = self.chats.lock().await;
        let chat = chats.get_mut(&chat_id).ok_or_else(|| chat_not_found(chat_id))?;
        if let AppendGuard::Participant(author_id) = guard {
            if !chat.has_participant(author_id) {
                return Err(PortError::Forbidden("User not part of the chat".to_string()));
            }
            if chat.status == ChatStatus::Closed {
                return Err(PortError::InvalidState(
                    "Chat is closed, you cannot send messages".to_string(),
                ));
            }
        }
        chat.messages.push(message);
        Ok(AppendReceipt {
            participant_message_count: chat.participant_message_count(),
            chat: Chat {
                messages: Vec::new(),
                ..chat.clone()
            },
        })
    }

    async fn set_summary(&self, chat_id: Uuid, summary: &ChatSummary) -> PortResult<()> {
        let mut chats = self.chats.lock().await;
        let chat = chats.get_mut(&chat_id).ok_or_else(|| chat_not_found(chat_id))?;
        chat.summary_title = Some(summary.title.clone());
        chat.summary_text = Some(summary.text.clone());
        Ok(())
    }
}

//=========================================================================================
// `PresenceRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl PresenceRepository for InMemoryStore {
    async fn reset_all(&self) -> PortResult<()> {
        for presence in self.presence.lock().await.values_mut() {
            presence.online_device_count = 0;
        }
        Ok(())
    }

    async fn increment(&self, user_id: Uuid) -> PortResult<Presence> {
        let mut presence = self.presence.lock().await;
        let record = presence
            .entry(user_id)
            .or_insert_with(|| Presence::offline(user_id));
        record.online_device_count += 1;
        Ok(record.clone())
    }

    async fn decrement(&self, user_id: Uuid, now: DateTime<Utc>) -> PortResult<Presence> {
        let mut presence = self.presence.lock().await;
        let record = presence
            .entry(user_id)
            .or_insert_with(|| Presence::offline(user_id));
        record.online_device_count = record.online_device_count.saturating_sub(1);
        if record.online_device_count == 0 {
            record.last_seen_at = Some(now);
        }
        Ok(record.clone())
    }

    async fn get_presence(&self, user_id: Uuid) -> PortResult<Option<Presence>> {
        Ok(self.presence.lock().await.get(&user_id).cloned())
    }
}

//=========================================================================================
// Collaborator Trait Implementations
//=========================================================================================

#[async_trait]
impl ProfileDirectory for InMemoryStore {
    async fn resolve_profile_by_user_id(&self, user_id: Uuid) -> PortResult<Option<Profile>> {
        Ok(self.profiles.lock().await.get(&user_id).cloned())
    }

    async fn display_names(&self, user_ids: &[Uuid]) -> PortResult<HashMap<Uuid, String>> {
        let profiles = self.profiles.lock().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| profiles.get(id).map(|p| (*id, p.display_name())))
            .collect())
    }
}

#[async_trait]
impl IdentityService for InMemoryStore {
    async fn resolve_session_user(&self, credential: &str) -> PortResult<Option<SessionUser>> {
        Ok(self.sessions.lock().await.get(credential).cloned())
    }
}
