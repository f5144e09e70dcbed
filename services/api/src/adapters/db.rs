//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! storage, identity and profile ports from the `core` crate. It handles all
//! interactions with the PostgreSQL database using `sqlx`.
//!
//! Every state transition is a single conditional statement. When it touches no
//! row, the chat is re-read only to pick the right error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;
use vet_consult_core::domain::{
    Chat, ChatStatus, ChatSummary, Message, Presence, Profile, Role, SessionUser,
};
use vet_consult_core::ports::{
    AppendGuard, AppendReceipt, ChatRepository, IdentityService, PortError, PortResult,
    PresenceRepository, ProfileDirectory,
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn load_messages(&self, chat_ids: &[Uuid]) -> PortResult<HashMap<Uuid, Vec<Message>>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT chat_id, text, is_system, author_id, sent_at FROM chat_messages \
             WHERE chat_id = ANY($1) ORDER BY seq ASC",
        )
        .bind(chat_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut grouped: HashMap<Uuid, Vec<Message>> = HashMap::new();
        for record in records {
            let chat_id = record.chat_id;
            grouped.entry(chat_id).or_default().push(record.to_domain());
        }
        Ok(grouped)
    }

    async fn hydrate(&self, records: Vec<ChatRecord>) -> PortResult<Vec<Chat>> {
        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let mut messages = self.load_messages(&ids).await?;
        records
            .into_iter()
            .map(|r| {
                let log = messages.remove(&r.id).unwrap_or_default();
                r.to_domain(log)
            })
            .collect()
    }

    async fn find_chat_record(&self, chat_id: Uuid) -> PortResult<Option<ChatRecord>> {
        sqlx::query_as::<_, ChatRecord>(&format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = $1"))
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)
    }
}

const CHAT_COLUMNS: &str = "id, participants, status, summary_title, summary_text, created_at";

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn chat_not_found(chat_id: Uuid) -> PortError {
    PortError::NotFound(format!("Chat {} not found", chat_id))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ChatRecord {
    id: Uuid,
    participants: Vec<Uuid>,
    status: String,
    summary_title: Option<String>,
    summary_text: Option<String>,
    created_at: DateTime<Utc>,
}
impl ChatRecord {
    fn to_domain(self, messages: Vec<Message>) -> PortResult<Chat> {
        let status = ChatStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!("Chat {} has unknown status '{}'", self.id, self.status))
        })?;
        Ok(Chat {
            id: self.id,
            participants: self.participants,
            status,
            messages,
            summary_title: self.summary_title,
            summary_text: self.summary_text,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct AppendRecord {
    #[sqlx(flatten)]
    chat: ChatRecord,
    participant_message_count: i32,
}
impl AppendRecord {
    fn to_domain(self) -> PortResult<AppendReceipt> {
        Ok(AppendReceipt {
            chat: self.chat.to_domain(Vec::new())?,
            participant_message_count: usize::try_from(self.participant_message_count)
                .unwrap_or_default(),
        })
    }
}

#[derive(FromRow)]
struct MessageRecord {
    chat_id: Uuid,
    text: String,
    is_system: bool,
    author_id: Option<Uuid>,
    sent_at: DateTime<Utc>,
}
impl MessageRecord {
    fn to_domain(self) -> Message {
        Message {
            text: self.text,
            is_system_message: self.is_system,
            author_id: self.author_id,
            timestamp: self.sent_at,
        }
    }
}

#[derive(FromRow)]
struct PresenceRecord {
    user_id: Uuid,
    online_device_count: i32,
    last_seen_at: Option<DateTime<Utc>>,
}
impl PresenceRecord {
    fn to_domain(self) -> Presence {
        Presence {
            user_id: self.user_id,
            online_device_count: self.online_device_count.max(0) as u32,
            last_seen_at: self.last_seen_at,
        }
    }
}

#[derive(FromRow)]
struct ProfileRecord {
    id: Uuid,
    user_id: Uuid,
    first_name: String,
    last_name: String,
}
impl ProfileRecord {
    fn to_domain(self) -> Profile {
        Profile {
            id: self.id,
            user_id: self.user_id,
            first_name: self.first_name,
            last_name: self.last_name,
        }
    }
}

#[derive(FromRow)]
struct SessionUserRecord {
    user_id: Uuid,
    role: String,
    is_verified: bool,
}
impl SessionUserRecord {
    fn to_domain(self) -> PortResult<SessionUser> {
        let role = Role::parse(&self.role).ok_or_else(|| {
            PortError::Unexpected(format!("User {} has unknown role '{}'", self.user_id, self.role))
        })?;
        Ok(SessionUser {
            user_id: self.user_id,
            role,
            is_verified: self.is_verified,
        })
    }
}

//=========================================================================================
// `ChatRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatRepository for DbAdapter {
    async fn insert_chat(&self, chat: &Chat) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query(
            "INSERT INTO chats (id, participants, status, summary_title, summary_text, created_at, \
                                participant_message_count) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(chat.id)
        .bind(&chat.participants)
        .bind(chat.status.as_str())
        .bind(&chat.summary_title)
        .bind(&chat.summary_text)
        .bind(chat.created_at)
        .bind(i32::try_from(chat.participant_message_count()).unwrap_or(i32::MAX))
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        for message in &chat.messages {
            sqlx::query(
                "INSERT INTO chat_messages (chat_id, text, is_system, author_id, sent_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(chat.id)
            .bind(&message.text)
            .bind(message.is_system_message)
            .bind(message.author_id)
            .bind(message.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)
    }

    async fn get_chat(&self, chat_id: Uuid) -> PortResult<Chat> {
        let record = self
            .find_chat_record(chat_id)
            .await?
            .ok_or_else(|| chat_not_found(chat_id))?;
        let mut chats = self.hydrate(vec![record]).await?;
        chats.pop().ok_or_else(|| chat_not_found(chat_id))
    }

    async fn find_chats_by_status(&self, status: ChatStatus) -> PortResult<Vec<Chat>> {
        let records = sqlx::query_as::<_, ChatRecord>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE status = $1 ORDER BY created_at DESC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        self.hydrate(records).await
    }

    async fn find_chats_for_participant(
        &self,
        user_id: Uuid,
        status: Option<ChatStatus>,
    ) -> PortResult<Vec<Chat>> {
        let records = sqlx::query_as::<_, ChatRecord>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats \
             WHERE $1 = ANY(participants) AND ($2::TEXT IS NULL OR status = $2) \
             ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        self.hydrate(records).await
    }

    async fn assign_if_open(&self, chat_id: Uuid, responder_id: Uuid) -> PortResult<Chat> {
        let updated = sqlx::query_as::<_, ChatRecord>(&format!(
            "UPDATE chats SET status = 'ONGOING', participants = array_append(participants, $2) \
             WHERE id = $1 AND status = 'OPEN' RETURNING {CHAT_COLUMNS}"
        ))
        .bind(chat_id)
        .bind(responder_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        match updated {
            Some(record) => {
                let mut chats = self.hydrate(vec![record]).await?;
                chats.pop().ok_or_else(|| chat_not_found(chat_id))
            }
            None => match self.find_chat_record(chat_id).await? {
                None => Err(chat_not_found(chat_id)),
                Some(_) => Err(PortError::InvalidState("Chat is not open".to_string())),
            },
        }
    }

    async fn close_if_active(&self, chat_id: Uuid, caller_id: Uuid) -> PortResult<Chat> {
        let updated = sqlx::query_as::<_, ChatRecord>(&format!(
            "UPDATE chats SET status = 'CLOSED' \
             WHERE id = $1 AND status <> 'CLOSED' AND $2 = ANY(participants) \
             RETURNING {CHAT_COLUMNS}"
        ))
        .bind(chat_id)
        .bind(caller_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        match updated {
            Some(record) => {
                let mut chats = self.hydrate(vec![record]).await?;
                chats.pop().ok_or_else(|| chat_not_found(chat_id))
            }
            None => match self.find_chat_record(chat_id).await? {
                None => Err(chat_not_found(chat_id)),
                Some(r) if r.status == ChatStatus::Closed.as_str() => {
                    Err(PortError::InvalidState("Chat is already closed".to_string()))
                }
                Some(_) => Err(PortError::Forbidden(
                    "User does not have access to this chat".to_string(),
                )),
            },
        }
    }

    async fn append_message(
        &self,
        chat_id: Uuid,
        message: Message,
        guard: AppendGuard,
    ) -> PortResult<AppendReceipt> {
        // The counter bump takes the chat's row lock, so the count returned is
        // exact under concurrent sends. System appends only read the row.
        let target = match guard {
            AppendGuard::Participant(_) => format!(
                "UPDATE chats SET participant_message_count = participant_message_count + 1 \
                 WHERE id = $1 AND status <> 'CLOSED' AND $6 = ANY(participants) \
                 RETURNING {CHAT_COLUMNS}, participant_message_count"
            ),
            AppendGuard::System => format!(
                "SELECT {CHAT_COLUMNS}, participant_message_count FROM chats WHERE id = $1"
            ),
        };
        let sql = format!(
            "WITH target AS ({target}), inserted AS ( \
                 INSERT INTO chat_messages (chat_id, text, is_system, author_id, sent_at) \
                 SELECT id, $2, $3, $4, $5 FROM target \
             ) \
             SELECT {CHAT_COLUMNS}, participant_message_count FROM target"
        );
        let mut query = sqlx::query_as::<_, AppendRecord>(&sql)
            .bind(chat_id)
            .bind(&message.text)
            .bind(message.is_system_message)
            .bind(message.author_id)
            .bind(message.timestamp);
        if let AppendGuard::Participant(author_id) = guard {
            query = query.bind(author_id);
        }
        let appended = query
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;

        match appended {
            Some(record) => record.to_domain(),
            None => {
                let record = self
                    .find_chat_record(chat_id)
                    .await?
                    .ok_or_else(|| chat_not_found(chat_id))?;
                if let AppendGuard::Participant(author_id) = guard {
                    if !record.participants.contains(&author_id) {
                        return Err(PortError::Forbidden("User not part of the chat".to_string()));
                    }
                }
                Err(PortError::InvalidState(
                    "Chat is closed, you cannot send messages".to_string(),
                ))
            }
        }
    }

    async fn set_summary(&self, chat_id: Uuid, summary: &ChatSummary) -> PortResult<()> {
        let updated = sqlx::query("UPDATE chats SET summary_title = $2, summary_text = $3 WHERE id = $1")
            .bind(chat_id)
            .bind(&summary.title)
            .bind(&summary.text)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?
            .rows_affected();
        if updated == 0 {
            return Err(chat_not_found(chat_id));
        }
        Ok(())
    }
}

//=========================================================================================
// `PresenceRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl PresenceRepository for DbAdapter {
    async fn reset_all(&self) -> PortResult<()> {
        sqlx::query("UPDATE presence SET online_device_count = 0")
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn increment(&self, user_id: Uuid) -> PortResult<Presence> {
        let record = sqlx::query_as::<_, PresenceRecord>(
            "INSERT INTO presence (user_id, online_device_count) VALUES ($1, 1) \
             ON CONFLICT (user_id) DO UPDATE SET online_device_count = presence.online_device_count + 1 \
             RETURNING user_id, online_device_count, last_seen_at",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn decrement(&self, user_id: Uuid, now: DateTime<Utc>) -> PortResult<Presence> {
        let record = sqlx::query_as::<_, PresenceRecord>(
            "INSERT INTO presence (user_id, online_device_count, last_seen_at) VALUES ($1, 0, $2) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 online_device_count = GREATEST(presence.online_device_count - 1, 0), \
                 last_seen_at = CASE WHEN GREATEST(presence.online_device_count - 1, 0) = 0 \
                                     THEN $2 ELSE presence.last_seen_at END \
             RETURNING user_id, online_device_count, last_seen_at",
        )
        .bind(user_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_presence(&self, user_id: Uuid) -> PortResult<Option<Presence>> {
        let record = sqlx::query_as::<_, PresenceRecord>(
            "SELECT user_id, online_device_count, last_seen_at FROM presence WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(PresenceRecord::to_domain))
    }
}

//=========================================================================================
// Collaborator Trait Implementations
//=========================================================================================

#[async_trait]
impl ProfileDirectory for DbAdapter {
    async fn resolve_profile_by_user_id(&self, user_id: Uuid) -> PortResult<Option<Profile>> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "SELECT id, user_id, first_name, last_name FROM profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(ProfileRecord::to_domain))
    }

    async fn display_names(&self, user_ids: &[Uuid]) -> PortResult<HashMap<Uuid, String>> {
        let records = sqlx::query_as::<_, ProfileRecord>(
            "SELECT id, user_id, first_name, last_name FROM profiles WHERE user_id = ANY($1)",
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records
            .into_iter()
            .map(|r| {
                let profile = r.to_domain();
                (profile.user_id, profile.display_name())
            })
            .collect())
    }
}

#[async_trait]
impl IdentityService for DbAdapter {
    async fn resolve_session_user(&self, credential: &str) -> PortResult<Option<SessionUser>> {
        let record = sqlx::query_as::<_, SessionUserRecord>(
            "SELECT u.id AS user_id, u.role, u.is_verified FROM auth_sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > NOW()",
        )
        .bind(credential)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(SessionUserRecord::to_domain).transpose()
    }
}
