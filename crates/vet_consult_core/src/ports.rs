//! crates/vet_consult_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the consultation core.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the backing store, the AI provider and the live transport.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{Chat, ChatStatus, ChatSummary, Message, Presence, Profile, SessionUser};
use crate::view::{ChatView, MessageView};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port and core operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Ports (Traits)
//=========================================================================================

/// Who may append a message, checked atomically with the append itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendGuard {
    /// The author must be a participant and the chat must not be closed.
    Participant(Uuid),
    /// No participant or state precondition.
    System,
}

/// The chat as it stands right after an append.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendReceipt {
    /// Chat metadata. `messages` is left empty; the log is not reloaded.
    pub chat: Chat,
    /// Participant-authored messages in the log, the new one included.
    pub participant_message_count: usize,
}

#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn insert_chat(&self, chat: &Chat) -> PortResult<()>;

    /// Fails with `NotFound` when no chat has this id.
    async fn get_chat(&self, chat_id: Uuid) -> PortResult<Chat>;

    async fn find_chats_by_status(&self, status: ChatStatus) -> PortResult<Vec<Chat>>;

    /// Chats the user participates in, most recent first.
    async fn find_chats_for_participant(
        &self,
        user_id: Uuid,
        status: Option<ChatStatus>,
    ) -> PortResult<Vec<Chat>>;

    /// Moves an OPEN chat to ONGOING and appends the responder, as one
    /// conditional update. Fails with `InvalidState` when the chat is not OPEN.
    async fn assign_if_open(&self, chat_id: Uuid, responder_id: Uuid) -> PortResult<Chat>;

    /// Closes a chat the caller participates in, as one conditional update.
    /// Fails with `InvalidState` if already closed, `Forbidden` if the caller
    /// is not a participant.
    async fn close_if_active(&self, chat_id: Uuid, caller_id: Uuid) -> PortResult<Chat>;

    /// Appends a message. The receipt is read in the same step as the write,
    /// so concurrent appends each see their own count.
    async fn append_message(
        &self,
        chat_id: Uuid,
        message: Message,
        guard: AppendGuard,
    ) -> PortResult<AppendReceipt>;

    async fn set_summary(&self, chat_id: Uuid, summary: &ChatSummary) -> PortResult<()>;
}

#[async_trait]
pub trait PresenceRepository: Send + Sync {
    /// Forces every presence record's device count to zero.
    async fn reset_all(&self) -> PortResult<()>;

    /// Increments the device count, creating the record if absent.
    async fn increment(&self, user_id: Uuid) -> PortResult<Presence>;

    /// Decrements the device count clamped at zero. Stamps `last_seen_at = now`
    /// when the resulting count is zero.
    async fn decrement(&self, user_id: Uuid, now: DateTime<Utc>) -> PortResult<Presence>;

    async fn get_presence(&self, user_id: Uuid) -> PortResult<Option<Presence>>;
}

//=========================================================================================
// Collaborator Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Resolves a session credential. `None` when the credential is unknown or expired.
    async fn resolve_session_user(&self, credential: &str) -> PortResult<Option<SessionUser>>;
}

#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn resolve_profile_by_user_id(&self, user_id: Uuid) -> PortResult<Option<Profile>>;

    /// Display names for every resolvable user in `user_ids`. Misses are absent from the map.
    async fn display_names(&self, user_ids: &[Uuid]) -> PortResult<HashMap<Uuid, String>>;

    async fn get_display_name(&self, user_id: Uuid) -> PortResult<Option<String>> {
        Ok(self.display_names(&[user_id]).await?.remove(&user_id))
    }
}

/// Which configured model a request is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Summary,
    Suggestion,
    MedicalRecord,
}

#[async_trait]
pub trait LanguageModelService: Send + Sync {
    /// Sends a system instruction and one user-role message, returning the raw
    /// completion text. With `expect_json` the provider is asked for a JSON object.
    async fn ask(
        &self,
        kind: ModelKind,
        system_instruction: &str,
        user_message: &str,
        expect_json: bool,
    ) -> PortResult<String>;
}

/// Delivers new messages to the live connections joined to a chat room.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Relays `message` to every connection in the room except the connection
    /// `except`. `chat` is attached when the chat's metadata changed.
    async fn broadcast_message(
        &self,
        chat_id: Uuid,
        message: MessageView,
        chat: Option<ChatView>,
        except: Option<Uuid>,
    );
}
