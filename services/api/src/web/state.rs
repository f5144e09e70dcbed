//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and how the core services are wired
//! onto the adapters.

use std::sync::Arc;
use vet_consult_core::ports::{
    ChatRepository, IdentityService, LanguageModelService, PresenceRepository, ProfileDirectory,
};
use vet_consult_core::{AdvisoryBridge, BackgroundTasks, ConsultationService, MessageStore, PresenceTracker};

use crate::web::rooms::RoomHub;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub consultations: Arc<ConsultationService>,
    pub messages: Arc<MessageStore>,
    pub presence: PresenceTracker,
    pub identity: Arc<dyn IdentityService>,
    pub chats: Arc<dyn ChatRepository>,
    pub hub: Arc<RoomHub>,
    pub tasks: BackgroundTasks,
}

/// The adapters behind every port.
pub struct Adapters {
    pub chats: Arc<dyn ChatRepository>,
    pub presence: Arc<dyn PresenceRepository>,
    pub profiles: Arc<dyn ProfileDirectory>,
    pub identity: Arc<dyn IdentityService>,
    pub llm: Arc<dyn LanguageModelService>,
}

impl AppState {
    pub fn new(adapters: Adapters) -> Self {
        let hub = Arc::new(RoomHub::new());
        let tasks = BackgroundTasks::new();
        let advisory = AdvisoryBridge::new(adapters.llm, adapters.profiles.clone());
        let messages = Arc::new(MessageStore::new(
            adapters.chats.clone(),
            adapters.profiles.clone(),
            hub.clone(),
            advisory.clone(),
            tasks.clone(),
        ));
        let consultations = Arc::new(ConsultationService::new(
            adapters.chats.clone(),
            adapters.profiles,
            messages.clone(),
            advisory,
        ));

        Self {
            consultations,
            messages,
            presence: PresenceTracker::new(adapters.presence),
            identity: adapters.identity,
            chats: adapters.chats,
            hub,
            tasks,
        }
    }
}
