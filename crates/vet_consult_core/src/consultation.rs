//! crates/vet_consult_core/src/consultation.rs
//!
//! The consultation state machine. Owns the `Chat` lifecycle
//! (`OPEN -> ONGOING -> CLOSED`), the role checks in front of each transition,
//! and the read-side listings. Transitions rely on the repository's
//! conditional updates, never on read-then-write.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::advisory::AdvisoryBridge;
use crate::domain::{
    assignment_message, Chat, ChatStatus, MedicalRecordForm, Role, SessionUser, CLOSED_MESSAGE,
    UNKNOWN_PARTICIPANT,
};
use crate::messages::MessageStore;
use crate::ports::{ChatRepository, PortError, PortResult, ProfileDirectory};
use crate::view::{chat_view, chat_view_without_messages, ChatView, ParticipantNames};

pub struct ConsultationService {
    chats: Arc<dyn ChatRepository>,
    profiles: Arc<dyn ProfileDirectory>,
    messages: Arc<MessageStore>,
    advisory: AdvisoryBridge,
}

impl ConsultationService {
    pub fn new(
        chats: Arc<dyn ChatRepository>,
        profiles: Arc<dyn ProfileDirectory>,
        messages: Arc<MessageStore>,
        advisory: AdvisoryBridge,
    ) -> Self {
        Self {
            chats,
            profiles,
            messages,
            advisory,
        }
    }

    pub fn messages(&self) -> &Arc<MessageStore> {
        &self.messages
    }

    //=====================================================================================
    // Transitions
    //=====================================================================================

    /// Opens a new consultation for the caller and returns its id.
    pub async fn create_chat(&self, caller: &SessionUser) -> PortResult<Uuid> {
        if !caller.role.can_initiate() {
            return Err(PortError::Forbidden(
                "Only authenticated farmers can create chats".to_string(),
            ));
        }
        let chat = Chat::open(caller.user_id);
        self.chats.insert_chat(&chat).await?;
        info!(chat_id = %chat.id, initiator = %caller.user_id, "Chat created.");
        Ok(chat.id)
    }

    /// Assigns the caller as responder of an OPEN chat. Exactly one of any set
    /// of concurrent assignments to the same chat succeeds.
    pub async fn assign_responder(&self, chat_id: Uuid, caller: &SessionUser) -> PortResult<ChatView> {
        if !caller.role.can_respond() {
            return Err(PortError::Forbidden(
                "Only authenticated veterinarians can be assigned to chats".to_string(),
            ));
        }
        let assigned = self.chats.assign_if_open(chat_id, caller.user_id).await?;
        info!(chat_id = %chat_id, responder = %caller.user_id, "Responder assigned.");

        let responder_name = match self.profiles.get_display_name(caller.user_id).await {
            Ok(Some(name)) => name,
            Ok(None) => UNKNOWN_PARTICIPANT.to_string(),
            Err(e) => {
                error!(user_id = %caller.user_id, "Failed to look up responder name: {}", e);
                UNKNOWN_PARTICIPANT.to_string()
            }
        };
        // The assignment is committed; a missing notice does not undo it.
        let chat = match self
            .messages
            .append_system_message(chat_id, &assignment_message(&responder_name))
            .await
        {
            Ok(chat) => chat,
            Err(e) => {
                error!(chat_id = %chat_id, "Failed to append assignment notice: {}", e);
                assigned
            }
        };
        self.view_without_messages(&chat).await
    }

    /// Closes a chat the caller participates in. The closure notice and the
    /// summary are best-effort and never undo the close.
    pub async fn close_chat(&self, chat_id: Uuid, caller: &SessionUser) -> PortResult<()> {
        if !caller.role.can_respond() {
            return Err(PortError::Forbidden(
                "Only authenticated veterinarians can close chats".to_string(),
            ));
        }
        self.chats.close_if_active(chat_id, caller.user_id).await?;
        info!(chat_id = %chat_id, closed_by = %caller.user_id, "Chat closed.");

        if let Err(e) = self.messages.append_system_message(chat_id, CLOSED_MESSAGE).await {
            error!(chat_id = %chat_id, "Failed to append closure notice: {}", e);
        }
        self.messages.schedule_summary(chat_id);
        Ok(())
    }

    //=====================================================================================
    // Listings
    //=====================================================================================

    /// Every OPEN chat, without message bodies. Responders must be verified.
    pub async fn list_open_chats(&self, caller: &SessionUser) -> PortResult<Vec<ChatView>> {
        if caller.role == Role::Farmer {
            return Err(PortError::Forbidden(
                "Only authenticated veterinarians can access chats".to_string(),
            ));
        }
        if !caller.is_verified_responder() {
            return Err(PortError::Forbidden(
                "Only verified veterinarians can access chats".to_string(),
            ));
        }
        let chats = self.chats.find_chats_by_status(ChatStatus::Open).await?;
        Ok(self.views_without_messages(&chats).await)
    }

    /// Every chat the user takes part in, most recent first. An empty result
    /// is reported as `NotFound`.
    pub async fn list_chats_for_user(&self, user_id: Uuid) -> PortResult<Vec<ChatView>> {
        let chats = self.chats.find_chats_for_participant(user_id, None).await?;
        if chats.is_empty() {
            return Err(PortError::NotFound("No chats found".to_string()));
        }
        Ok(self.views_without_messages(&chats).await)
    }

    pub async fn list_ongoing_chats_for_user(&self, user_id: Uuid) -> PortResult<Vec<ChatView>> {
        let chats = self
            .chats
            .find_chats_for_participant(user_id, Some(ChatStatus::Ongoing))
            .await?;
        Ok(self.views_without_messages(&chats).await)
    }

    /// The full chat, messages included, for one of its participants.
    pub async fn get_chat_by_id(&self, chat_id: Uuid, caller_id: Uuid) -> PortResult<ChatView> {
        let chat = self.chats.get_chat(chat_id).await?;
        if !chat.has_participant(caller_id) {
            return Err(PortError::Forbidden(
                "User does not have access to this chat".to_string(),
            ));
        }
        let names = ParticipantNames::resolve(self.profiles.as_ref(), &chat.participants).await;
        Ok(chat_view(&chat, &names))
    }

    /// The farmer's chats that already carry a summary.
    pub async fn consultation_summaries(&self, farmer_id: Uuid) -> PortResult<Vec<ChatView>> {
        let chats = self.chats.find_chats_for_participant(farmer_id, None).await?;
        if chats.is_empty() {
            return Err(PortError::NotFound("No chats found".to_string()));
        }
        let summarized: Vec<Chat> = chats
            .into_iter()
            .filter(|c| c.summary_text.is_some())
            .collect();
        Ok(self.views_without_messages(&summarized).await)
    }

    //=====================================================================================
    // AI Assistance
    //=====================================================================================

    /// Reply suggestions for the responder of an ONGOING chat.
    pub async fn suggest_replies(&self, chat_id: Uuid, caller: &SessionUser) -> PortResult<Vec<String>> {
        if !caller.is_verified_responder() {
            return Err(PortError::Forbidden(
                "Only verified veterinarians have access to this feature".to_string(),
            ));
        }
        let chat = self.chats.get_chat(chat_id).await?;
        if !chat.has_participant(caller.user_id) {
            return Err(PortError::Forbidden(
                "User does not have access to this chat".to_string(),
            ));
        }
        if chat.status != ChatStatus::Ongoing {
            return Err(PortError::InvalidState(
                "AI assistants are not available. This chat is not ongoing.".to_string(),
            ));
        }
        self.advisory.suggest_replies(&chat).await
    }

    /// A medical-record form pre-filled from the transcript. When drafting
    /// fails every field is blank.
    pub async fn generate_medical_record(
        &self,
        chat_id: Uuid,
        caller: &SessionUser,
    ) -> PortResult<MedicalRecordForm> {
        if caller.role == Role::Farmer {
            return Err(PortError::Forbidden(
                "You do not have permission to perform this action".to_string(),
            ));
        }
        let chat = self.chats.get_chat(chat_id).await?;
        if !chat.has_participant(caller.user_id) {
            return Err(PortError::Forbidden(
                "Only the assigned veterinarian can generate the medical record".to_string(),
            ));
        }
        let farmer_id = chat
            .participants
            .iter()
            .copied()
            .find(|&p| p != caller.user_id)
            .ok_or_else(|| {
                PortError::NotFound("Cannot find the farmer associated with the chat".to_string())
            })?;
        let farmer_profile = self
            .profiles
            .resolve_profile_by_user_id(farmer_id)
            .await?
            .ok_or_else(|| PortError::NotFound("Farmer profile not found".to_string()))?;
        let caller_profile = self.profiles.resolve_profile_by_user_id(caller.user_id).await?;

        let draft = self.advisory.draft_medical_record(&chat).await.unwrap_or_default();
        Ok(MedicalRecordForm {
            farmer_profile_id: farmer_profile.id,
            created_by_profile_id: caller_profile.map(|p| p.id),
            draft,
        })
    }

    //=====================================================================================
    // Helpers
    //=====================================================================================

    async fn view_without_messages(&self, chat: &Chat) -> PortResult<ChatView> {
        let names = ParticipantNames::resolve(self.profiles.as_ref(), &chat.participants).await;
        Ok(chat_view_without_messages(chat, &names))
    }

    async fn views_without_messages(&self, chats: &[Chat]) -> Vec<ChatView> {
        join_all(chats.iter().map(|chat| async move {
            let names = ParticipantNames::resolve(self.profiles.as_ref(), &chat.participants).await;
            chat_view_without_messages(chat, &names)
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::BackgroundTasks;
    use crate::domain::{MedicalRecordDraft, SYSTEM_AUTHOR, WELCOME_MESSAGE};
    use crate::memory::InMemoryStore;
    use crate::ports::{AppendGuard, AppendReceipt};
    use crate::test_support::{RecordingBroadcaster, ScriptedModel};

    const SUMMARY_REPLY: &str = r#"{"title": "Lame heifer", "summary": "Heifer lame on hind leg."}"#;

    struct Fixture {
        store: Arc<InMemoryStore>,
        broadcaster: Arc<RecordingBroadcaster>,
        model: Arc<ScriptedModel>,
        tasks: BackgroundTasks,
        service: Arc<ConsultationService>,
    }

    fn fixture(model: ScriptedModel) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let model = Arc::new(model);
        let tasks = BackgroundTasks::new();
        let advisory = AdvisoryBridge::new(model.clone(), store.clone());
        let messages = Arc::new(MessageStore::new(
            store.clone(),
            store.clone(),
            broadcaster.clone(),
            advisory.clone(),
            tasks.clone(),
        ));
        let service = Arc::new(ConsultationService::new(
            store.clone(),
            store.clone(),
            messages,
            advisory,
        ));
        Fixture {
            store,
            broadcaster,
            model,
            tasks,
            service,
        }
    }

    fn user(role: Role) -> SessionUser {
        SessionUser {
            user_id: Uuid::new_v4(),
            role,
            is_verified: true,
        }
    }

    #[tokio::test]
    async fn full_consultation_lifecycle() {
        let f = fixture(ScriptedModel::replying(SUMMARY_REPLY));
        let farmer = user(Role::Farmer);
        let vet = user(Role::Vet);
        let other_vet = user(Role::Vet);
        f.store.add_profile(vet.user_id, "Lars", "Olsen").await;

        // Creation.
        let chat_id = f.service.create_chat(&farmer).await.unwrap();
        let chat = f.store.get_chat(chat_id).await.unwrap();
        assert_eq!(chat.status, ChatStatus::Open);
        assert_eq!(chat.participants, vec![farmer.user_id]);
        assert_eq!(chat.messages.len(), 1);
        assert_eq!(chat.messages[0].text, WELCOME_MESSAGE);

        // Assignment.
        let view = f.service.assign_responder(chat_id, &vet).await.unwrap();
        assert_eq!(view.chat_status, ChatStatus::Ongoing);
        assert!(view.chat_messages.is_none());
        let chat = f.store.get_chat(chat_id).await.unwrap();
        assert_eq!(chat.participants, vec![farmer.user_id, vet.user_id]);
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[1].text, assignment_message("Lars Olsen"));

        // A second responder is too late.
        assert!(matches!(
            f.service.assign_responder(chat_id, &other_vet).await,
            Err(PortError::InvalidState(_))
        ));

        // Closing.
        f.service.close_chat(chat_id, &vet).await.unwrap();
        let chat = f.store.get_chat(chat_id).await.unwrap();
        assert_eq!(chat.status, ChatStatus::Closed);
        assert_eq!(chat.messages.last().unwrap().text, CLOSED_MESSAGE);
        assert!(matches!(
            f.service
                .messages()
                .append_message(chat_id, farmer.user_id, "One more thing")
                .await,
            Err(PortError::InvalidState(_))
        ));

        f.tasks.drain().await;
        let calls = f.model.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].kind, crate::ports::ModelKind::Summary);
        let chat = f.store.get_chat(chat_id).await.unwrap();
        assert_eq!(chat.summary_title.as_deref(), Some("Lame heifer"));

        // Closing twice is a state error.
        assert!(matches!(
            f.service.close_chat(chat_id, &vet).await,
            Err(PortError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn system_notices_are_broadcast_with_chat_metadata() {
        let f = fixture(ScriptedModel::failing());
        let farmer = user(Role::Farmer);
        let vet = user(Role::Vet);
        let chat_id = f.service.create_chat(&farmer).await.unwrap();

        f.service.assign_responder(chat_id, &vet).await.unwrap();
        f.service.close_chat(chat_id, &vet).await.unwrap();

        let sent = f.broadcaster.sent().await;
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|b| b.message.send_by == SYSTEM_AUTHOR));
        assert_eq!(sent[0].chat.as_ref().unwrap().chat_status, ChatStatus::Ongoing);
        assert_eq!(sent[1].chat.as_ref().unwrap().chat_status, ChatStatus::Closed);
        assert_eq!(sent[1].message.message_text, CLOSED_MESSAGE);
    }

    #[tokio::test]
    async fn close_survives_summary_failure() {
        let f = fixture(ScriptedModel::failing());
        let farmer = user(Role::Farmer);
        let vet = user(Role::Vet);
        let chat_id = f.service.create_chat(&farmer).await.unwrap();
        f.service.assign_responder(chat_id, &vet).await.unwrap();

        f.service.close_chat(chat_id, &vet).await.unwrap();
        f.tasks.drain().await;

        let chat = f.store.get_chat(chat_id).await.unwrap();
        assert_eq!(chat.status, ChatStatus::Closed);
        assert!(chat.summary_title.is_none());
        assert_eq!(f.model.calls().await.len(), 1);
    }

    /// Chat storage whose system appends always fail.
    struct BrokenSystemAppends(Arc<InMemoryStore>);

    #[async_trait::async_trait]
    impl ChatRepository for BrokenSystemAppends {
        async fn insert_chat(&self, chat: &Chat) -> PortResult<()> {
            self.0.insert_chat(chat).await
        }
        async fn get_chat(&self, chat_id: Uuid) -> PortResult<Chat> {
            self.0.get_chat(chat_id).await
        }
        async fn find_chats_by_status(&self, status: ChatStatus) -> PortResult<Vec<Chat>> {
            self.0.find_chats_by_status(status).await
        }
        async fn find_chats_for_participant(
            &self,
            user_id: Uuid,
            status: Option<ChatStatus>,
        ) -> PortResult<Vec<Chat>> {
            self.0.find_chats_for_participant(user_id, status).await
        }
        async fn assign_if_open(&self, chat_id: Uuid, responder_id: Uuid) -> PortResult<Chat> {
            self.0.assign_if_open(chat_id, responder_id).await
        }
        async fn close_if_active(&self, chat_id: Uuid, caller_id: Uuid) -> PortResult<Chat> {
            self.0.close_if_active(chat_id, caller_id).await
        }
        async fn append_message(
            &self,
            chat_id: Uuid,
            message: crate::domain::Message,
            guard: AppendGuard,
        ) -> PortResult<AppendReceipt> {
            match guard {
                AppendGuard::System => Err(PortError::Unexpected("store unavailable".to_string())),
                AppendGuard::Participant(_) => self.0.append_message(chat_id, message, guard).await,
            }
        }
        async fn set_summary(
            &self,
            chat_id: Uuid,
            summary: &crate::domain::ChatSummary,
        ) -> PortResult<()> {
            self.0.set_summary(chat_id, summary).await
        }
    }

    #[tokio::test]
    async fn assignment_stands_when_its_notice_cannot_be_written() {
        let store = Arc::new(InMemoryStore::new());
        let chats: Arc<dyn ChatRepository> = Arc::new(BrokenSystemAppends(store.clone()));
        let advisory = AdvisoryBridge::new(Arc::new(ScriptedModel::failing()), store.clone());
        let messages = Arc::new(MessageStore::new(
            chats.clone(),
            store.clone(),
            Arc::new(RecordingBroadcaster::default()),
            advisory.clone(),
            BackgroundTasks::new(),
        ));
        let service = ConsultationService::new(chats, store.clone(), messages, advisory);
        let farmer = user(Role::Farmer);
        let vet = user(Role::Vet);
        let late_vet = user(Role::Vet);
        let chat_id = service.create_chat(&farmer).await.unwrap();

        let view = service.assign_responder(chat_id, &vet).await.unwrap();
        assert_eq!(view.chat_status, ChatStatus::Ongoing);
        assert_eq!(view.participants.len(), 2);

        let chat = store.get_chat(chat_id).await.unwrap();
        assert_eq!(chat.participants, vec![farmer.user_id, vet.user_id]);
        assert_eq!(chat.messages.len(), 1);
        assert!(matches!(
            service.assign_responder(chat_id, &late_vet).await,
            Err(PortError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn role_checks() {
        let f = fixture(ScriptedModel::failing());
        let farmer = user(Role::Farmer);
        let vet = user(Role::Vet);
        let admin = user(Role::Admin);

        assert!(matches!(
            f.service.create_chat(&vet).await,
            Err(PortError::Forbidden(_))
        ));
        let chat_id = f.service.create_chat(&admin).await.unwrap();
        assert!(matches!(
            f.service.assign_responder(chat_id, &farmer).await,
            Err(PortError::Forbidden(_))
        ));
        assert!(matches!(
            f.service.close_chat(chat_id, &farmer).await,
            Err(PortError::Forbidden(_))
        ));
        assert!(matches!(
            f.service.list_open_chats(&farmer).await,
            Err(PortError::Forbidden(_))
        ));
        let unverified = SessionUser {
            is_verified: false,
            ..user(Role::Vet)
        };
        assert!(matches!(
            f.service.list_open_chats(&unverified).await,
            Err(PortError::Forbidden(_))
        ));
        assert_eq!(f.service.list_open_chats(&vet).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn close_requires_participation_and_existing_chat() {
        let f = fixture(ScriptedModel::failing());
        let farmer = user(Role::Farmer);
        let vet = user(Role::Vet);
        let outsider = user(Role::Vet);
        let chat_id = f.service.create_chat(&farmer).await.unwrap();
        f.service.assign_responder(chat_id, &vet).await.unwrap();

        assert!(matches!(
            f.service.close_chat(chat_id, &outsider).await,
            Err(PortError::Forbidden(_))
        ));
        assert!(matches!(
            f.service.close_chat(Uuid::new_v4(), &vet).await,
            Err(PortError::NotFound(_))
        ));
        assert!(matches!(
            f.service.assign_responder(Uuid::new_v4(), &vet).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_assignments_have_exactly_one_winner() {
        let f = fixture(ScriptedModel::failing());
        let farmer = user(Role::Farmer);
        let chat_id = f.service.create_chat(&farmer).await.unwrap();

        let attempts: Vec<_> = (0..16)
            .map(|_| {
                let service = f.service.clone();
                let vet = user(Role::Vet);
                tokio::spawn(async move { service.assign_responder(chat_id, &vet).await })
            })
            .collect();

        let mut won = 0;
        let mut lost = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => won += 1,
                Err(PortError::InvalidState(_)) => lost += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(won, 1);
        assert_eq!(lost, 15);

        let chat = f.store.get_chat(chat_id).await.unwrap();
        assert_eq!(chat.participants.len(), 2);
        assert_eq!(chat.messages.len(), 2);
    }

    #[tokio::test]
    async fn listings() {
        let f = fixture(ScriptedModel::failing());
        let farmer = user(Role::Farmer);
        let vet = user(Role::Vet);
        f.store.add_profile(farmer.user_id, "Anna", "Berg").await;

        assert!(matches!(
            f.service.list_chats_for_user(farmer.user_id).await,
            Err(PortError::NotFound(_))
        ));

        let first = f.service.create_chat(&farmer).await.unwrap();
        let second = f.service.create_chat(&farmer).await.unwrap();
        f.service.assign_responder(first, &vet).await.unwrap();

        let mine = f.service.list_chats_for_user(farmer.user_id).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine[0].created_date >= mine[1].created_date);
        assert!(mine.iter().all(|c| c.chat_messages.is_none()));
        assert_eq!(mine[0].participants[0].name, "Anna Berg");

        let open = f.service.list_open_chats(&vet).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, second);

        let ongoing = f.service.list_ongoing_chats_for_user(vet.user_id).await.unwrap();
        assert_eq!(ongoing.len(), 1);
        assert_eq!(ongoing[0].id, first);
        assert!(f
            .service
            .list_ongoing_chats_for_user(Uuid::new_v4())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn get_chat_by_id_checks_access_and_includes_messages() {
        let f = fixture(ScriptedModel::failing());
        let farmer = user(Role::Farmer);
        let chat_id = f.service.create_chat(&farmer).await.unwrap();
        f.service
            .messages()
            .append_message(chat_id, farmer.user_id, "Hello doctor")
            .await
            .unwrap();

        let view = f.service.get_chat_by_id(chat_id, farmer.user_id).await.unwrap();
        let messages = view.chat_messages.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].message_text, "Hello doctor");
        assert_eq!(messages[1].send_by, farmer.user_id.to_string());
        assert_eq!(view.participants[0].name, UNKNOWN_PARTICIPANT);

        assert!(matches!(
            f.service.get_chat_by_id(chat_id, Uuid::new_v4()).await,
            Err(PortError::Forbidden(_))
        ));
        assert!(matches!(
            f.service.get_chat_by_id(Uuid::new_v4(), farmer.user_id).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn consultation_summaries_only_lists_summarized_chats() {
        let f = fixture(ScriptedModel::replying(SUMMARY_REPLY));
        let farmer = user(Role::Farmer);
        let vet = user(Role::Vet);

        assert!(matches!(
            f.service.consultation_summaries(farmer.user_id).await,
            Err(PortError::NotFound(_))
        ));

        let summarized = f.service.create_chat(&farmer).await.unwrap();
        f.service.create_chat(&farmer).await.unwrap();
        f.service.assign_responder(summarized, &vet).await.unwrap();
        f.service.close_chat(summarized, &vet).await.unwrap();
        f.tasks.drain().await;

        let summaries = f.service.consultation_summaries(farmer.user_id).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, summarized);
        assert_eq!(
            summaries[0].chat_summary_text.as_deref(),
            Some("Heifer lame on hind leg.")
        );
    }

    #[tokio::test]
    async fn suggestions_guard_role_participation_and_state() {
        let f = fixture(ScriptedModel::replying(r#"{"answers": ["How long has it been limping?"]}"#));
        let farmer = user(Role::Farmer);
        let vet = user(Role::Vet);
        let outsider = user(Role::Vet);
        let chat_id = f.service.create_chat(&farmer).await.unwrap();

        assert!(matches!(
            f.service.suggest_replies(chat_id, &farmer).await,
            Err(PortError::Forbidden(_))
        ));
        let unverified = SessionUser {
            is_verified: false,
            ..vet.clone()
        };
        assert!(matches!(
            f.service.suggest_replies(chat_id, &unverified).await,
            Err(PortError::Forbidden(_))
        ));
        assert!(matches!(
            f.service.suggest_replies(Uuid::new_v4(), &vet).await,
            Err(PortError::NotFound(_))
        ));
        assert!(matches!(
            f.service.suggest_replies(chat_id, &vet).await,
            Err(PortError::Forbidden(_))
        ));

        f.service.assign_responder(chat_id, &vet).await.unwrap();
        assert!(matches!(
            f.service.suggest_replies(chat_id, &outsider).await,
            Err(PortError::Forbidden(_))
        ));
        assert_eq!(
            f.service.suggest_replies(chat_id, &vet).await.unwrap(),
            vec!["How long has it been limping?"]
        );

        f.service.close_chat(chat_id, &vet).await.unwrap();
        assert!(matches!(
            f.service.suggest_replies(chat_id, &vet).await,
            Err(PortError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn medical_record_falls_back_to_blank_form() {
        let f = fixture(ScriptedModel::failing());
        let farmer = user(Role::Farmer);
        let vet = user(Role::Vet);
        let farmer_profile = f.store.add_profile(farmer.user_id, "Anna", "Berg").await;
        let vet_profile = f.store.add_profile(vet.user_id, "Lars", "Olsen").await;
        let chat_id = f.service.create_chat(&farmer).await.unwrap();
        f.service.assign_responder(chat_id, &vet).await.unwrap();
        f.service.close_chat(chat_id, &vet).await.unwrap();

        let form = f.service.generate_medical_record(chat_id, &vet).await.unwrap();

        assert_eq!(form.farmer_profile_id, farmer_profile.id);
        assert_eq!(form.created_by_profile_id, Some(vet_profile.id));
        assert_eq!(form.draft, MedicalRecordDraft::default());
    }

    #[tokio::test]
    async fn medical_record_guards() {
        let f = fixture(ScriptedModel::failing());
        let farmer = user(Role::Farmer);
        let vet = user(Role::Vet);
        let chat_id = f.service.create_chat(&farmer).await.unwrap();
        f.service.assign_responder(chat_id, &vet).await.unwrap();

        assert!(matches!(
            f.service.generate_medical_record(chat_id, &farmer).await,
            Err(PortError::Forbidden(_))
        ));
        assert!(matches!(
            f.service.generate_medical_record(chat_id, &user(Role::Vet)).await,
            Err(PortError::Forbidden(_))
        ));
        assert!(matches!(
            f.service.generate_medical_record(Uuid::new_v4(), &vet).await,
            Err(PortError::NotFound(_))
        ));
        // No farmer profile registered.
        assert!(matches!(
            f.service.generate_medical_record(chat_id, &vet).await,
            Err(PortError::NotFound(_))
        ));
    }
}
