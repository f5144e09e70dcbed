pub mod advisory;
pub mod background;
pub mod consultation;
pub mod domain;
pub mod memory;
pub mod messages;
pub mod ports;
pub mod presence;
pub mod view;

#[cfg(test)]
mod test_support;

pub use advisory::AdvisoryBridge;
pub use background::BackgroundTasks;
pub use consultation::ConsultationService;
pub use domain::{
    Chat, ChatStatus, ChatSummary, MedicalRecordDraft, MedicalRecordForm, Message, Presence,
    Profile, Role, SessionUser,
};
pub use messages::MessageStore;
pub use ports::{
    AppendGuard, Broadcaster, ChatRepository, IdentityService, LanguageModelService, ModelKind,
    PortError, PortResult, PresenceRepository, ProfileDirectory,
};
pub use presence::PresenceTracker;
pub use view::{ChatView, MessageView, ParticipantView};
